use std::path::PathBuf;

use serde_json::json;
use uuid::Uuid;

use crate::ingest;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::str_param;
use crate::ipc::types::{AppState, Request};
use crate::store::{Field, NewCatalogueSubject, Predicate, RecordStore};

const PER_PAGE: i64 = 20;

struct SubjectInput {
    branch: String,
    basket: String,
    subject_code: String,
    subject_name: String,
    credits: String,
}

fn subject_input(req: &Request) -> SubjectInput {
    SubjectInput {
        branch: str_param(req, "branch").unwrap_or_default(),
        basket: str_param(req, "basket").unwrap_or_default(),
        subject_code: str_param(req, "subjectCode")
            .map(|v| v.to_uppercase())
            .unwrap_or_default(),
        subject_name: str_param(req, "subjectName").unwrap_or_default(),
        credits: str_param(req, "credits").unwrap_or_default(),
    }
}

fn duplicate_code(
    store: &RecordStore,
    code: &str,
    exclude_id: Option<&str>,
) -> rusqlite::Result<bool> {
    let matches = store.find_subjects(&Predicate::Eq(Field::SubjectCode, code.to_string()), &[])?;
    Ok(matches
        .iter()
        .any(|s| exclude_id.map(|id| s.id != id).unwrap_or(true)))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let branch = str_param(req, "branch").unwrap_or_default();
    let basket = str_param(req, "basket").unwrap_or_default();
    let search = str_param(req, "search").unwrap_or_default();
    let page = req
        .params
        .get("page")
        .and_then(|v| v.as_i64())
        .unwrap_or(1)
        .max(1);

    let mut clauses = Vec::new();
    if !branch.is_empty() && branch != "All" {
        clauses.push(Predicate::Eq(Field::Branch, branch.clone()));
    }
    if !basket.is_empty() {
        clauses.push(Predicate::Eq(Field::Basket, basket.clone()));
    }
    if !search.is_empty() {
        clauses.push(Predicate::Or(vec![
            Predicate::ContainsNoCase(Field::SubjectName, search.clone()),
            Predicate::ContainsNoCase(Field::SubjectCode, search.clone()),
        ]));
    }
    let pred = Predicate::And(clauses);

    let total = match store.count_subjects(&pred) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let subjects = match store.find_subjects_page(&pred, PER_PAGE, (page - 1) * PER_PAGE) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let branches = match store.distinct_subject_values(Field::Branch, &Predicate::All) {
        Ok(v) => v.into_iter().filter(|b| !b.is_empty()).collect::<Vec<_>>(),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let baskets = match store.distinct_subject_values(Field::Basket, &Predicate::All) {
        Ok(v) => v.into_iter().filter(|b| !b.is_empty()).collect::<Vec<_>>(),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({
            "subjects": subjects,
            "totalSubjects": total,
            "page": page,
            "perPage": PER_PAGE,
            "totalPages": (total + PER_PAGE - 1) / PER_PAGE,
            "branches": branches,
            "baskets": baskets
        }),
    )
}

fn handle_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let input = subject_input(req);
    if input.branch.is_empty() || input.subject_code.is_empty() || input.subject_name.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "Branch, Subject Code, and Subject Name are required",
            None,
        );
    }
    match duplicate_code(store, &input.subject_code, None) {
        Ok(true) => return err(&req.id, "bad_params", "Subject Code already exists", None),
        Ok(false) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let subject = NewCatalogueSubject {
        branch: input.branch,
        basket: input.basket,
        subject_code: input.subject_code,
        subject_name: input.subject_name,
        credits: input.credits,
    };
    match store.insert_subject(&subject) {
        Ok(id) => ok(
            &req.id,
            json!({ "subjectId": id, "message": "Subject added successfully" }),
        ),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let subject_id = str_param(req, "subjectId").unwrap_or_default();
    if Uuid::parse_str(&subject_id).is_err() {
        return err(&req.id, "bad_params", "Invalid subject ID", None);
    }
    let input = subject_input(req);
    if input.branch.is_empty() || input.subject_code.is_empty() || input.subject_name.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "Branch, Subject Code, and Subject Name are required",
            None,
        );
    }
    match duplicate_code(store, &input.subject_code, Some(&subject_id)) {
        Ok(true) => return err(&req.id, "bad_params", "Subject Code already exists", None),
        Ok(false) => {}
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let subject = NewCatalogueSubject {
        branch: input.branch,
        basket: input.basket,
        subject_code: input.subject_code,
        subject_name: input.subject_name,
        credits: input.credits,
    };
    match store.update_subject(&subject_id, &subject) {
        Ok(0) => err(&req.id, "not_found", "Subject not found", None),
        Ok(_) => ok(&req.id, json!({ "message": "Subject updated successfully" })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let subject_id = str_param(req, "subjectId").unwrap_or_default();
    if Uuid::parse_str(&subject_id).is_err() {
        return err(&req.id, "bad_params", "Invalid subject ID", None);
    }
    match store.delete_subject(&subject_id) {
        Ok(0) => err(&req.id, "not_found", "Subject not found", None),
        Ok(_) => ok(&req.id, json!({ "message": "Subject deleted successfully" })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_import_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(csv_path) = str_param(req, "csvPath") else {
        return err(&req.id, "bad_params", "missing csvPath", None);
    };

    let (_, rows) = match ingest::read_csv_sheet(&PathBuf::from(&csv_path)) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": csv_path })),
            )
        }
    };

    // The CBCS sheet carries these exact headers; no synonym fallback.
    let cell = |row: &std::collections::HashMap<String, String>, key: &str| {
        row.get(key).map(|v| v.trim().to_string()).unwrap_or_default()
    };
    let mut records = Vec::new();
    for row in &rows {
        let code = cell(row, "Subject Code").to_uppercase();
        if code.is_empty() {
            continue;
        }
        records.push(NewCatalogueSubject {
            branch: cell(row, "Branch"),
            basket: cell(row, "Basket"),
            subject_code: code,
            subject_name: cell(row, "Subject_name"),
            credits: cell(row, "Credits"),
        });
    }

    if records.is_empty() {
        return ok(
            &req.id,
            json!({ "imported": 0, "message": "No valid records found in CSV file." }),
        );
    }
    match store.replace_subjects(&records) {
        Ok(n) => ok(
            &req.id,
            json!({
                "imported": n,
                "message": format!("Successfully imported {} CBCS subjects!", n)
            }),
        ),
        Err(e) => err(&req.id, "db_tx_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "catalogue.list" => Some(handle_list(state, req)),
        "catalogue.add" => Some(handle_add(state, req)),
        "catalogue.update" => Some(handle_update(state, req)),
        "catalogue.delete" => Some(handle_delete(state, req)),
        "catalogue.importCsv" => Some(handle_import_csv(state, req)),
        _ => None,
    }
}
