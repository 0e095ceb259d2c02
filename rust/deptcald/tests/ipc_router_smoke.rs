mod test_support;

use serde_json::json;
use test_support::{spawn_sidecar, spawn_sidecar_with_env};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let mut s = spawn_sidecar();

    let health = s.request_ok("health", json!({}));
    assert_eq!(health["seed"], "mock");
    assert_eq!(health["adminActive"], false);

    let lookups = s.request_ok("lookups.get", json!({}));
    assert_eq!(lookups["subjectTypes"], json!(["Theory", "Lab", "Elective", "Combined"]));
    assert_eq!(lookups["days"].as_array().map(|a| a.len()), Some(6));
    assert_eq!(lookups["examGroups"][0]["id"], "cat1");

    for (method, params) in [
        ("students.list", json!({})),
        ("faculty.list", json!({})),
        ("subjects.list", json!({})),
        ("timetable.list", json!({})),
        ("timetable.dayView", json!({ "day": "Monday" })),
        ("periods.times", json!({ "day": "Tuesday" })),
        ("exams.list", json!({})),
        ("examRooms.list", json!({ "examId": 1 })),
        ("settings.get", json!({})),
        ("dashboard.summary", json!({ "today": "2025-06-01" })),
        ("admin.session", json!({})),
    ] {
        let _ = s.request_ok(method, params);
    }
}

#[test]
fn malformed_lines_and_unknown_methods_get_error_envelopes() {
    let mut s = spawn_sidecar();

    let resp = s.send_line("{not json");
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["error"]["code"], "bad_json");

    assert_eq!(s.request_err("timetable.explode", json!({})), "not_implemented");

    // The sidecar keeps serving after a bad line.
    let _ = s.request_ok("health", json!({}));
}

#[test]
fn empty_seed_starts_with_settings_only() {
    let mut s = spawn_sidecar_with_env(&[("DEPTCALD_SEED", "empty")]);

    let health = s.request_ok("health", json!({}));
    assert_eq!(health["seed"], "empty");

    let students = s.request_ok("students.list", json!({}));
    assert_eq!(students["students"], json!([]));
    let entries = s.request_ok("timetable.list", json!({}));
    assert_eq!(entries["entries"], json!([]));

    let settings = s.request_ok("settings.get", json!({}));
    assert_eq!(settings["settings"]["defaultPeriodDuration"], 50);
    assert_eq!(
        settings["settings"]["daySchedules"]["Monday"]["periods"]
            .as_array()
            .map(|a| a.len()),
        Some(8)
    );
}
