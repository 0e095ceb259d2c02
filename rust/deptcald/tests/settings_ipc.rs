mod test_support;

use serde_json::json;
use test_support::spawn_sidecar;

#[test]
fn general_settings_patch() {
    let mut s = spawn_sidecar();
    s.login();

    assert_eq!(
        s.request_err("settings.update", json!({ "patch": { "defaultPeriodDuration": 3 } })),
        "bad_params"
    );
    assert_eq!(
        s.request_err("settings.update", json!({ "patch": { "theme": "dark" } })),
        "bad_params"
    );
    let updated = s.request_ok(
        "settings.update",
        json!({ "patch": { "defaultPeriodDuration": 45, "showMonday": false } }),
    );
    assert_eq!(updated["settings"]["defaultPeriodDuration"], 45);
    assert_eq!(updated["settings"]["showMonday"], false);

    // New periods take the default duration.
    let added = s.request_ok("settings.periods.add", json!({ "day": "Saturday" }));
    assert_eq!(added["periodNumber"], 6);
    assert_eq!(
        added["settings"]["daySchedules"]["Saturday"]["periods"][5]["duration"],
        45
    );
    let _ = s.request_ok(
        "timetable.create",
        json!({ "input": { "day": "Saturday", "periodNumber": 6, "subjectId": 1 } }),
    );
}

#[test]
fn holidays_and_working_mondays_drive_date_resolution() {
    let mut s = spawn_sidecar();
    s.login();

    let _ = s.request_ok("settings.holidays.add", json!({ "date": "2025-07-04" }));
    assert_eq!(
        s.request_err("settings.holidays.add", json!({ "date": "2025-07-04" })),
        "duplicate"
    );
    let day = s.request_ok("timetable.forDate", json!({ "date": "2025-07-04" }));
    assert_eq!(day["status"], "holiday");
    let _ = s.request_ok("settings.holidays.remove", json!({ "date": "2025-07-04" }));
    assert_eq!(
        s.request_err("settings.holidays.remove", json!({ "date": "2025-07-04" })),
        "not_found"
    );

    let _ = s.request_ok("settings.update", json!({ "patch": { "showMonday": false } }));
    let monday = s.request_ok("timetable.forDate", json!({ "date": "2025-06-16" }));
    assert_eq!(monday["status"], "noClasses");

    assert_eq!(
        s.request_err("settings.workingMondays.add", json!({ "date": "2025-06-03" })),
        "bad_params"
    );
    assert_eq!(
        s.request_err(
            "settings.workingMondays.add",
            json!({ "date": "2025-06-09", "followsDay": "Monday" })
        ),
        "bad_params"
    );
    let _ = s.request_ok(
        "settings.workingMondays.add",
        json!({ "date": "2025-06-09", "followsDay": "Wednesday" }),
    );
    let working = s.request_ok("timetable.forDate", json!({ "date": "2025-06-09" }));
    assert_eq!(working["status"], "classes");
    assert_eq!(working["day"], "Wednesday");
    assert_eq!(working["followed"], true);

    let _ = s.request_ok(
        "settings.workingMondays.setSchedule",
        json!({ "date": "2025-06-09", "followsDay": "Friday" }),
    );
    let working = s.request_ok("timetable.forDate", json!({ "date": "2025-06-09" }));
    assert_eq!(working["day"], "Friday");

    // A holiday beats a working Monday.
    let _ = s.request_ok("settings.holidays.add", json!({ "date": "2025-06-09" }));
    let working = s.request_ok("timetable.forDate", json!({ "date": "2025-06-09" }));
    assert_eq!(working["status"], "holiday");

    let _ = s.request_ok("settings.workingMondays.remove", json!({ "date": "2025-06-09" }));
    assert_eq!(
        s.request_err("settings.workingMondays.remove", json!({ "date": "2025-06-09" })),
        "not_found"
    );

    // Default schedule is Tuesday's.
    let _ = s.request_ok("settings.workingMondays.add", json!({ "date": "2025-06-23" }));
    let settings = s.request_ok("settings.get", json!({}));
    assert_eq!(settings["settings"]["workingMondays"]["2025-06-23"], "Tuesday");
}

#[test]
fn period_durations_cannot_run_past_midnight() {
    let mut s = spawn_sidecar();
    s.login();

    let _ = s.request_ok(
        "settings.periods.update",
        json!({ "day": "Monday", "periodNumber": 1, "duration": 60 }),
    );
    let times = s.request_ok("periods.times", json!({ "day": "Monday" }));
    assert_eq!(times["periods"][1]["start"], "10:00");

    assert_eq!(
        s.request_err(
            "settings.periods.update",
            json!({ "day": "Monday", "periodNumber": 9, "duration": 50 })
        ),
        "period_out_of_range"
    );
    assert_eq!(
        s.request_err(
            "settings.periods.update",
            json!({ "day": "Monday", "periodNumber": 1, "duration": 500 })
        ),
        "bad_params"
    );

    // 09:00 start, 380 minutes of periods: stretching three of them to four hours
    // runs the day past midnight.
    let _ = s.request_ok(
        "settings.periods.update",
        json!({ "day": "Tuesday", "periodNumber": 1, "duration": 240 }),
    );
    let _ = s.request_ok(
        "settings.periods.update",
        json!({ "day": "Tuesday", "periodNumber": 2, "duration": 240 }),
    );
    assert_eq!(
        s.request_err(
            "settings.periods.update",
            json!({ "day": "Tuesday", "periodNumber": 3, "duration": 240 })
        ),
        "bad_params"
    );

    assert_eq!(
        s.request_err(
            "settings.daySchedule.update",
            json!({ "day": "Wednesday", "firstPeriodStartTime": "23:00" })
        ),
        "bad_params"
    );
    let _ = s.request_ok(
        "settings.daySchedule.update",
        json!({ "day": "Wednesday", "firstPeriodStartTime": "08:30" }),
    );
    let times = s.request_ok("periods.times", json!({ "day": "Wednesday" }));
    assert_eq!(times["periods"][0]["start"], "08:30");
}

#[test]
fn removing_a_period_shifts_later_entries() {
    let mut s = spawn_sidecar();
    s.login();

    let busy = s.request(
        "settings.periods.remove",
        json!({ "day": "Monday", "periodNumber": 3 }),
    );
    assert_eq!(busy["error"]["code"], "in_use");
    assert_eq!(busy["error"]["details"]["entryIds"], json!([3]));

    let _ = s.request_ok("timetable.delete", json!({ "entryId": 3 }));
    let removed = s.request_ok(
        "settings.periods.remove",
        json!({ "day": "Monday", "periodNumber": 3 }),
    );
    assert_eq!(removed["entriesShifted"], 3);

    let lab = s.request_ok("timetable.get", json!({ "entryId": 4 }));
    assert_eq!(lab["entry"]["periodNumber"], 3);
    let lunch = s.request_ok("timetable.get", json!({ "entryId": 5 }));
    assert_eq!(lunch["entry"]["periodNumber"], 5);
    let earlier = s.request_ok("timetable.get", json!({ "entryId": 2 }));
    assert_eq!(earlier["entry"]["periodNumber"], 2);

    let times = s.request_ok("periods.times", json!({ "day": "Monday" }));
    assert_eq!(times["periods"].as_array().map(|a| a.len()), Some(7));
    // Old period 4 now follows period 2 directly.
    assert_eq!(times["periods"][2]["start"], "10:40");
    assert_eq!(times["periods"][2]["duration"], 50);
}
