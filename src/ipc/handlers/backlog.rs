use std::collections::BTreeMap;

use serde_json::json;

use crate::filters::{self, SearchMode};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::str_param;
use crate::ipc::types::{AppState, Request};
use crate::regcode;

fn handle_search(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let registration = str_param(req, "registration").unwrap_or_default();
    let subject_code = str_param(req, "subjectCode").unwrap_or_default();
    let branch = str_param(req, "branch").unwrap_or_default();
    let year = str_param(req, "year").unwrap_or_default();

    let query = match filters::build_backlog_query(&registration, &subject_code, &branch, &year) {
        Ok(q) => q,
        Err(message) => return err(&req.id, "bad_params", message, None),
    };

    let rows = match store.find_grades(&query.predicate, &[]) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut branch_stats: BTreeMap<String, usize> = BTreeMap::new();
    let mut year_stats: BTreeMap<String, usize> = BTreeMap::new();
    let mut rows_json = Vec::with_capacity(rows.len());
    for r in &rows {
        let branch_name = regcode::branch_name(&r.reg_no);
        let branch_short = regcode::branch_short(&r.reg_no);
        let year = regcode::admission_year(&r.reg_no);
        *branch_stats.entry(branch_short.clone()).or_insert(0) += 1;
        *year_stats.entry(year.clone()).or_insert(0) += 1;
        rows_json.push(json!({
            "regNo": r.reg_no,
            "name": r.name,
            "sem": r.sem,
            "subjectCode": r.subject_code,
            "subjectName": r.subject_name,
            "grade": r.grade,
            "branch": branch_name,
            "branchShort": branch_short,
            "year": year
        }));
    }

    let message = if rows.is_empty() {
        let criteria_text = query.criteria.join(", ");
        let text = match query.mode {
            SearchMode::Registration => format!(
                "No backlog found for registration number {}.",
                query.registration.as_deref().unwrap_or_default()
            ),
            SearchMode::SubjectCode => {
                format!("No students found with backlog for: {}.", criteria_text)
            }
            SearchMode::Advanced => format!("No backlog found for criteria: {}.", criteria_text),
        };
        json!(text)
    } else {
        serde_json::Value::Null
    };

    ok(
        &req.id,
        json!({
            "count": rows.len(),
            "searchType": query.mode.as_str(),
            "criteria": query.criteria,
            "branchStats": branch_stats,
            "yearStats": year_stats,
            "message": message,
            "rows": rows_json
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backlog.search" => Some(handle_search(state, req)),
        _ => None,
    }
}
