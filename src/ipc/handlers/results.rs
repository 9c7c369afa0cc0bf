use chrono::Utc;
use serde_json::json;

use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{str_list_param, str_param};
use crate::ipc::types::{AppState, Request};
use crate::store::{Field, GradeRecord, Predicate};

fn gpa_rows(rows: &[GradeRecord]) -> Vec<(&str, &str)> {
    rows.iter()
        .map(|r| (r.credits.as_str(), r.grade.as_str()))
        .collect()
}

fn handle_semesters(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let semesters = match store.distinct_grade_values(Field::Sem, &Predicate::All) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let semesters: Vec<String> = semesters.into_iter().filter(|s| !s.is_empty()).collect();
    ok(&req.id, json!({ "semesters": semesters }))
}

fn handle_student_semesters(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let registration = str_param(req, "registration")
        .map(|r| r.to_uppercase())
        .unwrap_or_default();
    if registration.is_empty() {
        return ok(&req.id, json!({ "semesters": [] }));
    }
    let semesters =
        match store.distinct_grade_values(Field::Sem, &Predicate::Eq(Field::RegNo, registration)) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
    let semesters: Vec<String> = semesters.into_iter().filter(|s| !s.is_empty()).collect();
    ok(&req.id, json!({ "semesters": semesters }))
}

fn handle_search(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let registration = str_param(req, "registration")
        .map(|r| r.to_uppercase())
        .unwrap_or_default();
    let name = str_param(req, "name").unwrap_or_default();
    let semesters: Vec<String> = str_list_param(req, "semesters")
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if registration.is_empty() && name.is_empty() {
        return err(&req.id, "bad_params", "Please enter registration or name.", None);
    }
    if semesters.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "Please select at least one semester.",
            None,
        );
    }

    let mut identity = Vec::new();
    if !registration.is_empty() {
        identity.push(Predicate::Eq(Field::RegNo, registration.clone()));
    }
    if !name.is_empty() {
        identity.push(Predicate::EqNoCase(Field::Name, name.clone()));
    }
    let identity = Predicate::Or(identity);

    let mut blocks = serde_json::Map::new();
    let mut total_count = 0usize;
    for sem in &semesters {
        let pred = Predicate::And(vec![identity.clone(), Predicate::Eq(Field::Sem, sem.clone())]);
        let rows = match store.find_grades(&pred, &[]) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        if rows.is_empty() {
            continue;
        }
        let summary = calc::credit_weighted_average(gpa_rows(&rows));
        total_count += rows.len();
        blocks.insert(
            sem.clone(),
            json!({
                "rows": rows,
                "count": rows.len(),
                "sgpa": summary.average,
                "totalCredits": summary.total_credits
            }),
        );
    }

    let mut cgpa = serde_json::Value::Null;
    let mut total_all_semester_credits = serde_json::Value::Null;
    if !registration.is_empty() {
        let all_rows = match store.find_grades(&identity, &[]) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        cgpa = json!(calc::credit_weighted_average(gpa_rows(&all_rows)).average);

        let reg_rows =
            match store.find_grades(&Predicate::Eq(Field::RegNo, registration.clone()), &[]) {
                Ok(v) => v,
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            };
        let credit_sum: f64 = reg_rows.iter().map(|r| calc::credit_total(&r.credits)).sum();
        total_all_semester_credits = json!(credit_sum);
    }

    let message = if total_count == 0 {
        json!("No records found for the selected criteria.")
    } else {
        serde_json::Value::Null
    };

    ok(
        &req.id,
        json!({
            "semesters": blocks,
            "count": total_count,
            "cgpa": cgpa,
            "totalAllSemesterCredits": total_all_semester_credits,
            "message": message,
            "asOfDate": Utc::now().format("%d-%b-%Y").to_string()
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "results.semesters" => Some(handle_semesters(state, req)),
        "results.studentSemesters" => Some(handle_student_semesters(state, req)),
        "results.search" => Some(handle_search(state, req)),
        _ => None,
    }
}
