use chrono::Local;
use serde_json::{json, Value};

use crate::calendar::{self, format_iso_date, DateResolution};
use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{db_failed, optional_str, parse_date, Reply};
use crate::ipc::types::{AppState, Request};

const UPCOMING_LIMIT: i64 = 5;

fn handle_summary(state: &mut AppState, req: &Request) -> Reply {
    let conn = &state.db;
    let today = match optional_str(req, &req.params, "today")? {
        Some(raw) => parse_date(req, "today", &raw)?,
        None => Local::now().date_naive(),
    };

    let mut counts = serde_json::Map::new();
    for (key, table) in [
        ("students", "students"),
        ("faculty", "faculty"),
        ("subjects", "subjects"),
        ("timetableEntries", "timetable_entries"),
        ("exams", "exams"),
        ("examRooms", "exam_rooms"),
    ] {
        let n = db::count_rows(conn, table).map_err(|e| db_failed(req, "db_query_failed", e))?;
        counts.insert(key.to_string(), json!(n));
    }

    let mut stmt = conn
        .prepare(
            "SELECT e.id, s.subject_code, s.subject_name, e.exam_date, e.exam_time, e.exam_group
             FROM exams e
             JOIN subjects s ON s.id = e.subject_id
             WHERE e.exam_date >= ?
             ORDER BY e.exam_date, e.exam_time, e.id
             LIMIT ?",
        )
        .map_err(|e| db_failed(req, "db_query_failed", e))?;
    let upcoming = stmt
        .query_map((format_iso_date(today), UPCOMING_LIMIT), |row| {
            let id: i64 = row.get(0)?;
            let code: String = row.get(1)?;
            let name: String = row.get(2)?;
            let date: String = row.get(3)?;
            let time: String = row.get(4)?;
            let group: Option<String> = row.get(5)?;
            Ok(json!({
                "id": id,
                "subjectCode": code,
                "subjectName": name,
                "date": date,
                "time": time,
                "group": group
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<Value>, _>>())
        .map_err(|e| db_failed(req, "db_query_failed", e))?;

    let settings = db::load_settings(conn).map_err(|e| db_failed(req, "db_query_failed", e))?;
    let today_status = match calendar::resolve_date(&settings, today) {
        DateResolution::Holiday => json!({ "status": "holiday" }),
        DateResolution::NoClasses => json!({ "status": "noClasses" }),
        DateResolution::Classes { day, followed } => {
            json!({ "status": "classes", "day": day, "followed": followed })
        }
    };

    Ok(ok(
        &req.id,
        json!({
            "today": format_iso_date(today),
            "todayStatus": today_status,
            "counts": counts,
            "upcomingExams": upcoming
        }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "dashboard.summary" => handle_summary(state, req),
        _ => return None,
    };
    Some(res.unwrap_or_else(|e| e))
}
