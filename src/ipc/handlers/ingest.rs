use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::json;

use crate::ingest;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::str_param;
use crate::ipc::types::{AppState, Request};

/// Inline rows arrive as JSON objects; numeric cells are stringified
/// the same way a spreadsheet read would produce them.
fn json_cell_text(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn rows_from_json(
    items: &[serde_json::Value],
) -> (Vec<String>, Vec<HashMap<String, String>>) {
    let mut headers: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let Some(obj) = item.as_object() else {
            continue;
        };
        let mut row = HashMap::with_capacity(obj.len());
        for (k, v) in obj {
            if !headers.iter().any(|h| h == k) {
                headers.push(k.clone());
            }
            row.insert(k.clone(), json_cell_text(v));
        }
        rows.push(row);
    }
    (headers, rows)
}

fn handle_bulk_upload(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let inline = req.params.get("rows").and_then(|v| v.as_array());
    let csv_path = str_param(req, "csvPath");

    let (headers, rows) = match (inline, &csv_path) {
        (Some(_), Some(_)) => {
            return err(
                &req.id,
                "bad_params",
                "provide either rows or csvPath, not both",
                None,
            )
        }
        (None, None) => {
            return err(&req.id, "bad_params", "missing rows or csvPath", None)
        }
        (Some(items), None) => rows_from_json(items),
        (None, Some(path)) => match ingest::read_csv_sheet(&PathBuf::from(path)) {
            Ok(v) => v,
            Err(e) => {
                return err(
                    &req.id,
                    "io_failed",
                    e.to_string(),
                    Some(json!({ "path": path })),
                )
            }
        },
    };

    let summary = match ingest::ingest_rows(store, &headers, &rows) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_insert_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({
            "inserted": summary.inserted,
            "updated": summary.updated,
            "message": format!(
                "All files processed successfully! Updated: {}, Inserted: {}",
                summary.updated, summary.inserted
            )
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "records.bulkUpload" => Some(handle_bulk_upload(state, req)),
        _ => None,
    }
}
