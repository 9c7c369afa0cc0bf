use serde_json::json;

use crate::baskets::{self, BASKET_NAMES};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{str_list_param, str_param};
use crate::ipc::types::{AppState, Request};

fn requirements_json() -> serde_json::Value {
    let entries: Vec<serde_json::Value> = BASKET_NAMES
        .iter()
        .map(|name| json!({ "name": name, "credits": baskets::required_credits(name) }))
        .collect();
    json!(entries)
}

fn handle_track(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let registration = str_param(req, "registration")
        .map(|r| r.to_uppercase())
        .unwrap_or_default();
    if registration.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "Please enter a registration number.",
            None,
        );
    }
    let semesters = str_list_param(req, "semesters");
    let basket = str_param(req, "basket").unwrap_or_default();

    match baskets::compute_basket_progress(store, &registration, &semesters, &basket) {
        Ok(model) => ok(
            &req.id,
            json!({
                "student": model,
                "requirements": requirements_json()
            }),
        ),
        Err(e) => err(&req.id, e.code, e.message, None),
    }
}

fn handle_requirements(_state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "requirements": requirements_json(),
            "totalRequiredCredits": baskets::total_required_credits()
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "baskets.track" => Some(handle_track(state, req)),
        "baskets.requirements" => Some(handle_requirements(state, req)),
        _ => None,
    }
}
