mod test_support;

use serde_json::json;
use test_support::spawn_sidecar;

#[test]
fn faculty_validation_and_unique_email() {
    let mut s = spawn_sidecar();
    s.login();

    let created = s.request_ok(
        "faculty.create",
        json!({ "input": {
            "name": "Dr. Asha Rao",
            "department": "Electronics",
            "designation": "senior lecturer",
            "email": "asha.rao@college.edu",
            "phone": "+919876543210"
        }}),
    );
    assert_eq!(created["faculty"]["designation"], "Senior Lecturer");

    let base = json!({
        "name": "X",
        "department": "Electronics",
        "designation": "Lecturer",
        "email": "x@college.edu",
        "phone": "9876543210"
    });
    let mut short_phone = base.clone();
    short_phone["phone"] = json!("12345");
    assert_eq!(
        s.request_err("faculty.create", json!({ "input": short_phone })),
        "bad_params"
    );
    let mut dean = base.clone();
    dean["designation"] = json!("Dean");
    assert_eq!(
        s.request_err("faculty.create", json!({ "input": dean })),
        "bad_params"
    );
    let mut taken = base.clone();
    taken["email"] = json!("john.smith@college.edu");
    assert_eq!(
        s.request_err("faculty.create", json!({ "input": taken })),
        "duplicate"
    );
}

#[test]
fn deleting_faculty_clears_references() {
    let mut s = spawn_sidecar();
    s.login();

    let detail = s.request_ok("faculty.get", json!({ "facultyId": 1 }));
    assert_eq!(detail["subjects"].as_array().map(|a| a.len()), Some(2));

    let out = s.request_ok("faculty.delete", json!({ "facultyId": 1 }));
    assert_eq!(out["referencesCleared"], 4);

    let subject = s.request_ok("subjects.get", json!({ "subjectId": 1 }));
    assert_eq!(subject["subject"]["facultyId"], json!(null));
    let entry = s.request_ok("timetable.get", json!({ "entryId": 4 }));
    assert_eq!(entry["entry"]["facultyId"], json!(null));
    assert_eq!(entry["entry"]["subjectCode"], "CS103");
}

#[test]
fn subject_rules_and_in_use_guard() {
    let mut s = spawn_sidecar();
    s.login();

    let by_code = s.request_ok("subjects.get", json!({ "subjectCode": "cs104" }));
    assert_eq!(by_code["subject"]["subjectType"], "Lab");
    assert_eq!(by_code["subject"]["facultyName"], "Dr. John Smith");

    let labs = s.request_ok("subjects.list", json!({ "type": "Lab" }));
    assert_eq!(labs["subjects"].as_array().map(|a| a.len()), Some(2));
    let sem3 = s.request_ok("subjects.list", json!({ "semester": 3 }));
    assert_eq!(sem3["subjects"].as_array().map(|a| a.len()), Some(2));

    for (code, semester, credits) in [("C101", 1, 3), ("CS201", 9, 3), ("CS201", 1, 5)] {
        assert_eq!(
            s.request_err(
                "subjects.create",
                json!({ "input": {
                    "subjectCode": code,
                    "subjectName": "Bad",
                    "subjectType": "Theory",
                    "semester": semester,
                    "credits": credits
                }})
            ),
            "bad_params"
        );
    }
    assert_eq!(
        s.request_err(
            "subjects.create",
            json!({ "input": {
                "subjectCode": "CS201",
                "subjectName": "Ghost Taught",
                "subjectType": "Theory",
                "semester": 4,
                "facultyId": 99
            }})
        ),
        "not_found"
    );
    assert_eq!(
        s.request_err(
            "subjects.create",
            json!({ "input": {
                "subjectCode": "CS101",
                "subjectName": "Dup",
                "subjectType": "Theory",
                "semester": 1
            }})
        ),
        "duplicate"
    );

    let created = s.request_ok(
        "subjects.create",
        json!({ "input": {
            "subjectCode": "CS201",
            "subjectName": "Compilers",
            "subjectType": "theory",
            "facultyId": 2,
            "semester": 5,
            "credits": 4
        }}),
    );
    let id = created["subject"]["id"].as_i64().expect("id");
    assert_eq!(created["subject"]["facultyName"], "Dr. Sarah Johnson");

    let updated = s.request_ok(
        "subjects.update",
        json!({ "subjectId": id, "patch": { "facultyId": null } }),
    );
    assert_eq!(updated["subject"]["facultyId"], json!(null));

    let busy = s.request("subjects.delete", json!({ "subjectId": 1 }));
    assert_eq!(busy["error"]["code"], "in_use");
    assert_eq!(busy["error"]["details"]["timetableEntries"], 1);
    assert_eq!(busy["error"]["details"]["exams"], 1);

    let _ = s.request_ok("subjects.delete", json!({ "subjectId": id }));
}
