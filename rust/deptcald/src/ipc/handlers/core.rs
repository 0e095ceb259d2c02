use crate::calendar::Day;
use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use crate::validation::{DEPARTMENTS, DESIGNATIONS, EXAM_GROUPS, SUBJECT_TYPES};
use serde_json::json;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "seed": state.config.seed.as_str(),
            "adminActive": state.admin.is_some()
        }),
    )
}

fn handle_lookups_get(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let exam_groups: Vec<_> = EXAM_GROUPS
        .iter()
        .map(|(id, name, description)| {
            json!({ "id": id, "name": name, "description": description })
        })
        .collect();
    ok(
        &req.id,
        json!({
            "departments": DEPARTMENTS,
            "designations": DESIGNATIONS,
            "subjectTypes": SUBJECT_TYPES,
            "days": Day::ALL.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
            "examGroups": exam_groups
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "lookups.get" => Some(handle_lookups_get(state, req)),
        _ => None,
    }
}
