mod test_support;

use serde_json::json;
use test_support::spawn_sidecar;

#[test]
fn summary_counts_and_upcoming_exams() {
    let mut s = spawn_sidecar();

    let summary = s.request_ok("dashboard.summary", json!({ "today": "2025-06-01" }));
    assert_eq!(
        summary["counts"],
        json!({
            "students": 67,
            "faculty": 6,
            "subjects": 8,
            "timetableEntries": 8,
            "exams": 8,
            "examRooms": 11
        })
    );
    assert_eq!(summary["todayStatus"]["status"], "noClasses");
    let upcoming = summary["upcomingExams"].as_array().expect("upcoming");
    assert_eq!(upcoming.len(), 5);
    assert_eq!(upcoming[0]["subjectCode"], "CS101");

    let late = s.request_ok("dashboard.summary", json!({ "today": "2025-06-13" }));
    assert_eq!(late["upcomingExams"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(late["todayStatus"]["day"], "Friday");

    let holiday = s.request_ok("dashboard.summary", json!({ "today": "2025-05-01" }));
    assert_eq!(holiday["todayStatus"]["status"], "holiday");
}
