mod test_support;

use serde_json::json;
use test_support::spawn_sidecar;

#[test]
fn room_lookup_by_register_number() {
    let mut s = spawn_sidecar();

    // Exam 1 seats 001-030 in A101 and 032-070 in A102.
    let hit = s.request_ok(
        "exams.roomForStudent",
        json!({ "examId": 1, "registerNo": "230601030" }),
    );
    assert_eq!(hit["room"]["roomName"], "A101");
    let hit = s.request_ok(
        "exams.roomForStudent",
        json!({ "examId": 1, "registerNo": "230601032" }),
    );
    assert_eq!(hit["room"]["roomName"], "A102");
    let gap = s.request_ok(
        "exams.roomForStudent",
        json!({ "examId": 1, "registerNo": "230601031" }),
    );
    assert_eq!(gap["room"], json!(null));

    assert_eq!(
        s.request_err(
            "exams.roomForStudent",
            json!({ "examId": 1, "registerNo": "12345" })
        ),
        "bad_params"
    );
    assert_eq!(
        s.request_err(
            "exams.roomForStudent",
            json!({ "examId": 99, "registerNo": "230601001" })
        ),
        "not_found"
    );

    let lookup = s.request_ok("exams.lookupStudent", json!({ "registerNo": "230601045" }));
    assert_eq!(lookup["student"], json!(null));
    let exams = lookup["exams"].as_array().expect("exams");
    let ids: Vec<i64> = exams.iter().filter_map(|e| e["id"].as_i64()).collect();
    assert_eq!(ids, vec![1, 3, 4, 5, 7, 8]);
    assert_eq!(exams[0]["room"]["roomName"], "A102");
    assert_eq!(exams[5]["onHoliday"], true);

    let known = s.request_ok("exams.lookupStudent", json!({ "registerNo": "230601001" }));
    assert_eq!(known["student"]["fullName"], "Student 1");
}

#[test]
fn listings_by_group_month_and_date() {
    let mut s = spawn_sidecar();

    let cat1 = s.request_ok("exams.list", json!({ "group": "cat1" }));
    assert_eq!(cat1["exams"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(cat1["exams"][0]["groupName"], "CAT 1");
    assert_eq!(cat1["exams"][1]["timeLabel"], "2:00 PM");
    assert_eq!(
        s.request_err("exams.list", json!({ "group": "midterm" })),
        "bad_params"
    );

    let june = s.request_ok("exams.forMonth", json!({ "year": 2025, "month": 6 }));
    assert_eq!(june["exams"].as_array().map(|a| a.len()), Some(8));
    assert_eq!(june["holidays"], json!(["2025-06-15"]));
    let may = s.request_ok("exams.forMonth", json!({ "year": 2025, "month": 5 }));
    assert_eq!(may["exams"], json!([]));
    assert_eq!(may["holidays"], json!(["2025-05-01", "2025-05-15"]));
    assert_eq!(
        s.request_err("exams.forMonth", json!({ "year": 2025, "month": 13 })),
        "bad_params"
    );

    let day = s.request_ok("exams.forDate", json!({ "date": "2025-06-12" }));
    let times: Vec<&str> = day["exams"]
        .as_array()
        .expect("exams")
        .iter()
        .filter_map(|e| e["time"].as_str())
        .collect();
    assert_eq!(times, vec!["09:00", "14:00"]);
}

#[test]
fn exam_crud_and_room_cleanup() {
    let mut s = spawn_sidecar();
    s.login();

    let created = s.request_ok(
        "exams.create",
        json!({ "subjectId": 2, "date": "2025-05-15", "time": "09:30", "group": "CAT2" }),
    );
    let exam_id = created["exam"]["id"].as_i64().expect("exam id");
    assert_eq!(created["exam"]["group"], "cat2");
    assert_eq!(created["exam"]["onHoliday"], true);
    assert_eq!(created["exam"]["timeLabel"], "9:30 AM");

    assert_eq!(
        s.request_err(
            "exams.create",
            json!({ "subjectId": 77, "date": "2025-07-01", "time": "09:00" })
        ),
        "not_found"
    );

    let moved = s.request_ok(
        "exams.update",
        json!({ "examId": exam_id, "patch": { "date": "2025-05-16", "group": null } }),
    );
    assert_eq!(moved["exam"]["date"], "2025-05-16");
    assert_eq!(moved["exam"]["group"], json!(null));
    assert_eq!(moved["exam"]["onHoliday"], false);

    for (room, range) in [("B1", "230601001-230601035"), ("B2", "230601036-230601070")] {
        let _ = s.request_ok(
            "examRooms.create",
            json!({ "examId": exam_id, "roomName": room, "registerRange": range }),
        );
    }
    let detail = s.request_ok("exams.get", json!({ "examId": exam_id }));
    assert_eq!(detail["rooms"].as_array().map(|a| a.len()), Some(2));

    let deleted = s.request_ok("exams.delete", json!({ "examId": exam_id }));
    assert_eq!(deleted["roomsRemoved"], 2);
    assert_eq!(
        s.request_err("examRooms.list", json!({ "examId": exam_id })),
        "not_found"
    );
}

#[test]
fn room_ranges_are_validated_and_coverage_reported() {
    let mut s = spawn_sidecar();
    s.login();

    for bad in ["230601010-230601001", "abc", "230601001,,230601005", "2306010-230601009"] {
        assert_eq!(
            s.request_err(
                "examRooms.create",
                json!({ "examId": 1, "roomName": "Z1", "registerRange": bad })
            ),
            "invalid_range"
        );
    }

    let full = s.request_ok("examRooms.coverage", json!({ "examId": 1 }));
    assert_eq!(full["students"], 67);
    assert_eq!(full["unassigned"], json!([]));
    assert_eq!(full["multiplyAssigned"], json!([]));

    let extra = s.request_ok(
        "examRooms.create",
        json!({ "examId": 1, "roomName": "A999", "registerRange": " 230601025 - 230601035 " }),
    );
    assert_eq!(extra["room"]["registerRange"], "230601025-230601035");
    assert_eq!(extra["overlapsWith"], json!([1, 2]));

    let doubled = s.request_ok("examRooms.coverage", json!({ "examId": 1 }));
    assert_eq!(doubled["multiplyAssigned"].as_array().map(|a| a.len()), Some(10));
    assert_eq!(
        doubled["multiplyAssigned"][0],
        json!({ "registerNo": "230601025", "rooms": ["A101", "A999"] })
    );

    let _ = s.request_ok("examRooms.delete", json!({ "roomId": 1 }));
    let gaps = s.request_ok("examRooms.coverage", json!({ "examId": 1 }));
    assert_eq!(gaps["unassigned"].as_array().map(|a| a.len()), Some(24));

    let renamed = s.request_ok(
        "examRooms.update",
        json!({ "roomId": 2, "patch": { "roomName": "A102-East", "registerRange": "230601001-230601070" } }),
    );
    assert_eq!(renamed["room"]["roomName"], "A102-East");
    assert_eq!(renamed["overlapsWith"], json!([12]));
}
