mod test_support;

use serde_json::json;
use test_support::spawn_sidecar;

#[test]
fn mock_roster_lists_and_filters() {
    let mut s = spawn_sidecar();

    let all = s.request_ok("students.list", json!({}));
    let students = all["students"].as_array().expect("students");
    assert_eq!(students.len(), 67);
    assert_eq!(students[0]["registerNo"], "230601001");
    assert!(students.iter().all(|st| st["registerNo"] != "230601031"));

    let hit = s.request_ok("students.list", json!({ "query": "230601069" }));
    assert_eq!(hit["students"].as_array().map(|a| a.len()), Some(1));

    let none = s.request_ok("students.list", json!({ "year": 2 }));
    assert_eq!(none["students"], json!([]));

    let by_reg = s.request_ok("students.get", json!({ "registerNo": "230601044" }));
    assert_eq!(by_reg["student"]["fullName"], "Student 44");
    assert_eq!(
        s.request_err("students.get", json!({ "registerNo": "230601045" })),
        "not_found"
    );
    assert_eq!(s.request_err("students.get", json!({})), "bad_params");
}

#[test]
fn create_validates_and_defaults_email() {
    let mut s = spawn_sidecar();
    s.login();

    let created = s.request_ok(
        "students.create",
        json!({ "input": {
            "registerNo": "230601071",
            "fullName": "New Student",
            "department": "computer science",
            "year": 2
        }}),
    );
    assert_eq!(created["student"]["email"], "230601071@college.edu");
    assert_eq!(created["student"]["department"], "Computer Science");

    let dup = s.request(
        "students.create",
        json!({ "input": {
            "registerNo": "230601071",
            "fullName": "Again",
            "department": "Civil",
            "year": 1
        }}),
    );
    assert_eq!(dup["error"]["code"], "duplicate");
    assert_eq!(dup["error"]["details"]["field"], "registerNo");

    for input in [
        json!({ "registerNo": "23060107", "fullName": "Short", "department": "Civil", "year": 1 }),
        json!({ "registerNo": "230601072", "fullName": "Year", "department": "Civil", "year": 6 }),
        json!({ "registerNo": "230601072", "fullName": "Dept", "department": "Biology", "year": 1 }),
        json!({ "registerNo": "230601072", "fullName": "Mail", "department": "Civil", "year": 1, "email": "nope" }),
        json!({ "registerNo": "230601072", "fullName": "Extra", "department": "Civil", "year": 1, "gpa": 4 }),
    ] {
        assert_eq!(
            s.request_err("students.create", json!({ "input": input })),
            "bad_params"
        );
    }
}

#[test]
fn update_and_delete_round_out_crud() {
    let mut s = spawn_sidecar();
    s.login();

    let updated = s.request_ok(
        "students.update",
        json!({ "studentId": 5, "patch": { "fullName": "Renamed", "year": 3 } }),
    );
    assert_eq!(updated["student"]["fullName"], "Renamed");
    assert_eq!(updated["student"]["registerNo"], "230601005");

    // Taking another student's register number is a collision; keeping one's own is not.
    assert_eq!(
        s.request_err(
            "students.update",
            json!({ "studentId": 5, "patch": { "registerNo": "230601006" } })
        ),
        "duplicate"
    );
    let _ = s.request_ok(
        "students.update",
        json!({ "studentId": 5, "patch": { "registerNo": "230601005" } }),
    );

    let _ = s.request_ok("students.delete", json!({ "studentId": 5 }));
    assert_eq!(
        s.request_err("students.delete", json!({ "studentId": 5 })),
        "not_found"
    );
    let all = s.request_ok("students.list", json!({}));
    assert_eq!(all["students"].as_array().map(|a| a.len()), Some(66));
}
