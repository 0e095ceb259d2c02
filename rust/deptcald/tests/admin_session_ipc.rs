mod test_support;

use serde_json::json;
use test_support::{spawn_sidecar, spawn_sidecar_with_env};

#[test]
fn mutations_require_an_admin_session() {
    let mut s = spawn_sidecar();

    assert_eq!(
        s.request_err("students.delete", json!({ "studentId": 1 })),
        "unauthorized"
    );
    assert_eq!(
        s.request_err("settings.holidays.add", json!({ "date": "2025-07-01" })),
        "unauthorized"
    );
    // Reads stay open.
    let _ = s.request_ok("students.get", json!({ "studentId": 1 }));

    s.login();
    let _ = s.request_ok("students.delete", json!({ "studentId": 1 }));

    let _ = s.request_ok("admin.logout", json!({}));
    assert_eq!(
        s.request_err("students.delete", json!({ "studentId": 2 })),
        "unauthorized"
    );
}

#[test]
fn login_rejects_bad_credentials_and_reports_session() {
    let mut s = spawn_sidecar();

    assert_eq!(
        s.request_err("admin.login", json!({ "username": "admin", "password": "wrong" })),
        "unauthorized"
    );
    assert_eq!(
        s.request_err("admin.login", json!({ "username": "", "password": "admin" })),
        "bad_params"
    );
    let session = s.request_ok("admin.session", json!({}));
    assert_eq!(session["active"], false);

    let login = s.request_ok(
        "admin.login",
        json!({ "username": "admin", "password": "admin" }),
    );
    assert_eq!(login["username"], "admin");
    assert_eq!(login["token"].as_str().map(|t| t.len()), Some(36));

    let session = s.request_ok("admin.session", json!({}));
    assert_eq!(session["active"], true);
    assert_eq!(session["username"], "admin");

    let out = s.request_ok("admin.logout", json!({}));
    assert_eq!(out["wasActive"], true);
    let out = s.request_ok("admin.logout", json!({}));
    assert_eq!(out["wasActive"], false);
}

#[test]
fn credentials_come_from_the_environment() {
    // sha256("s3cret")
    let digest = "1ec1c26b50d5d3c58d9583181af8076655fe00756bf7285940ba3670f99fcba0";
    let mut s = spawn_sidecar_with_env(&[
        ("DEPTCALD_ADMIN_USER", "hod"),
        ("DEPTCALD_ADMIN_PASSWORD_SHA256", digest),
    ]);

    assert_eq!(
        s.request_err("admin.login", json!({ "username": "admin", "password": "admin" })),
        "unauthorized"
    );
    let login = s.request_ok(
        "admin.login",
        json!({ "username": "hod", "password": "s3cret" }),
    );
    assert_eq!(login["username"], "hod");
}
