use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, types::Value as SqlValue, Connection, OptionalExtension};
use serde_json::{json, Value};
use tracing::info;

use crate::calendar::{self, format_iso_date};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::exam_rooms::{rooms_for_exam, ExamRoom};
use crate::ipc::helpers::{
    bad_params, db_failed, in_range, not_found, object, optional_i64, optional_str, parse_date, parse_time,
    reject_unknown_fields, require_admin, required_date, required_i64, required_str,
    required_time, Reply,
};
use crate::ipc::types::{AppState, Request};
use crate::register_range::{is_valid_register_no, REGISTER_NO_LEN};
use crate::settings::DepartmentSettings;
use crate::timing::{format_12h, format_hhmm, parse_hhmm};
use crate::validation::{is_exam_group, EXAM_GROUPS};

const SELECT: &str = "SELECT e.id, e.subject_id, s.subject_code, s.subject_name,
       e.exam_date, e.exam_time, e.exam_group
     FROM exams e
     JOIN subjects s ON s.id = e.subject_id";

const ORDER: &str = " ORDER BY e.exam_date, e.exam_time, e.id";

#[derive(Debug, Clone)]
struct Exam {
    id: i64,
    subject_id: i64,
    subject_code: String,
    subject_name: String,
    date: String,
    time: String,
    group: Option<String>,
}

impl Exam {
    fn to_json(&self, settings: &DepartmentSettings) -> Value {
        let on_holiday = calendar::parse_iso_date(&self.date)
            .map(|d| settings.is_holiday(d))
            .unwrap_or(false);
        let time_label = parse_hhmm(&self.time).map(format_12h).ok();
        let group_name = self.group.as_deref().and_then(|g| {
            EXAM_GROUPS
                .iter()
                .find(|(id, _, _)| *id == g)
                .map(|(_, name, _)| *name)
        });
        json!({
            "id": self.id,
            "subjectId": self.subject_id,
            "subjectCode": self.subject_code,
            "subjectName": self.subject_name,
            "date": self.date,
            "time": self.time,
            "timeLabel": time_label,
            "group": self.group,
            "groupName": group_name,
            "onHoliday": on_holiday
        })
    }
}

fn exam_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Exam> {
    Ok(Exam {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        subject_code: row.get(2)?,
        subject_name: row.get(3)?,
        date: row.get(4)?,
        time: row.get(5)?,
        group: row.get(6)?,
    })
}

fn query_exams(
    conn: &Connection,
    req: &Request,
    filter: &str,
    values: Vec<SqlValue>,
) -> Result<Vec<Exam>, Value> {
    let sql = format!("{}{}{}", SELECT, filter, ORDER);
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| db_failed(req, "db_query_failed", e))?;
    let exams = stmt
        .query_map(params_from_iter(values), exam_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| db_failed(req, "db_query_failed", e))?;
    Ok(exams)
}

fn load(conn: &Connection, req: &Request, id: i64) -> Result<Exam, Value> {
    conn.query_row(&format!("{} WHERE e.id = ?", SELECT), [id], exam_from_row)
        .optional()
        .map_err(|e| db_failed(req, "db_query_failed", e))?
        .ok_or_else(|| not_found(req, "exam"))
}

fn load_settings(conn: &Connection, req: &Request) -> Result<DepartmentSettings, Value> {
    db::load_settings(conn).map_err(|e| db_failed(req, "db_query_failed", e))
}

fn exams_json(exams: &[Exam], settings: &DepartmentSettings) -> Vec<Value> {
    exams.iter().map(|e| e.to_json(settings)).collect()
}

fn check_group(req: &Request, group: Option<String>) -> Result<Option<String>, Value> {
    match group {
        Some(g) if g.is_empty() => Ok(None),
        Some(g) => {
            let g = g.to_ascii_lowercase();
            if !is_exam_group(&g) {
                return Err(bad_params(req, format!("unknown exam group: {}", g)));
            }
            Ok(Some(g))
        }
        None => Ok(None),
    }
}

fn require_subject(conn: &Connection, req: &Request, subject_id: i64) -> Result<(), Value> {
    let exists = db::row_exists(conn, "subjects", subject_id)
        .map_err(|e| db_failed(req, "db_query_failed", e))?;
    if !exists {
        return Err(not_found(req, "subject"));
    }
    Ok(())
}

fn required_register_no(req: &Request) -> Result<String, Value> {
    let reg = required_str(req, &req.params, "registerNo")?;
    if !is_valid_register_no(&reg) {
        return Err(bad_params(
            req,
            format!("registerNo must be exactly {} digits", REGISTER_NO_LEN),
        ));
    }
    Ok(reg)
}

fn handle_list(state: &mut AppState, req: &Request) -> Reply {
    let conn = &state.db;
    let group = check_group(req, optional_str(req, &req.params, "group")?)?;
    let exams = match group {
        Some(g) => query_exams(conn, req, " WHERE e.exam_group = ?", vec![SqlValue::Text(g)])?,
        None => query_exams(conn, req, "", Vec::new())?,
    };
    let settings = load_settings(conn, req)?;
    Ok(ok(&req.id, json!({ "exams": exams_json(&exams, &settings) })))
}

fn handle_get(state: &mut AppState, req: &Request) -> Reply {
    let conn = &state.db;
    let id = required_i64(req, &req.params, "examId")?;
    let exam = load(conn, req, id)?;
    let rooms = rooms_for_exam(conn, id).map_err(|e| db_failed(req, "db_query_failed", e))?;
    let settings = load_settings(conn, req)?;
    let rooms: Vec<Value> = rooms.iter().map(ExamRoom::to_json).collect();
    Ok(ok(
        &req.id,
        json!({ "exam": exam.to_json(&settings), "rooms": rooms }),
    ))
}

fn handle_create(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let conn = &state.db;
    let subject_id = required_i64(req, &req.params, "subjectId")?;
    let date = required_date(req, &req.params, "date")?;
    let time = required_time(req, &req.params, "time")?;
    let group = check_group(req, optional_str(req, &req.params, "group")?)?;
    require_subject(conn, req, subject_id)?;

    conn.execute(
        "INSERT INTO exams(subject_id, exam_date, exam_time, exam_group) VALUES(?, ?, ?, ?)",
        params![subject_id, format_iso_date(date), format_hhmm(time), group],
    )
    .map_err(|e| {
        err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "exams" })),
        )
    })?;
    let id = conn.last_insert_rowid();
    let exam = load(conn, req, id)?;
    let settings = load_settings(conn, req)?;

    info!(exam_id = id, subject_id, date = %exam.date, "exam created");
    Ok(ok(&req.id, json!({ "exam": exam.to_json(&settings) })))
}

fn handle_update(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let conn = &state.db;
    let id = required_i64(req, &req.params, "examId")?;
    let patch = object(req, "patch")?;
    reject_unknown_fields(req, patch, &["subjectId", "date", "time", "group"])?;

    let mut exam = load(conn, req, id)?;
    if let Some(v) = optional_i64(req, patch, "subjectId")? {
        require_subject(conn, req, v)?;
        exam.subject_id = v;
    }
    if let Some(raw) = optional_str(req, patch, "date")? {
        exam.date = format_iso_date(parse_date(req, "date", &raw)?);
    }
    if let Some(raw) = optional_str(req, patch, "time")? {
        exam.time = format_hhmm(parse_time(req, "time", &raw)?);
    }
    if patch.get("group").is_some() {
        exam.group = check_group(req, optional_str(req, patch, "group")?)?;
    }

    conn.execute(
        "UPDATE exams SET subject_id = ?, exam_date = ?, exam_time = ?, exam_group = ? WHERE id = ?",
        params![exam.subject_id, exam.date, exam.time, exam.group, id],
    )
    .map_err(|e| db_failed(req, "db_update_failed", e))?;
    let exam = load(conn, req, id)?;
    let settings = load_settings(conn, req)?;

    info!(exam_id = id, "exam updated");
    Ok(ok(&req.id, json!({ "exam": exam.to_json(&settings) })))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let conn = &state.db;
    let id = required_i64(req, &req.params, "examId")?;
    load(conn, req, id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| db_failed(req, "db_tx_failed", e))?;
    // Rooms first; exam_rooms.exam_id references the exam.
    let rooms = match tx.execute("DELETE FROM exam_rooms WHERE exam_id = ?", [id]) {
        Ok(n) => n,
        Err(e) => {
            let _ = tx.rollback();
            return Err(err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": "exam_rooms" })),
            ));
        }
    };
    if let Err(e) = tx.execute("DELETE FROM exams WHERE id = ?", [id]) {
        let _ = tx.rollback();
        return Err(err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "exams" })),
        ));
    }
    tx.commit()
        .map_err(|e| db_failed(req, "db_commit_failed", e))?;

    info!(exam_id = id, rooms, "exam deleted");
    Ok(ok(&req.id, json!({ "ok": true, "roomsRemoved": rooms })))
}

fn between(
    conn: &Connection,
    req: &Request,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Exam>, Value> {
    query_exams(
        conn,
        req,
        " WHERE e.exam_date BETWEEN ? AND ?",
        vec![
            SqlValue::Text(format_iso_date(from)),
            SqlValue::Text(format_iso_date(to)),
        ],
    )
}

/// Exams and holidays of one calendar month (`month` is 1-based).
fn handle_for_month(state: &mut AppState, req: &Request) -> Reply {
    let conn = &state.db;
    let year = required_i64(req, &req.params, "year")?;
    let month = in_range(req, "month", required_i64(req, &req.params, "month")?, 1, 12)?;
    let (first, last) = i32::try_from(year)
        .ok()
        .and_then(|y| calendar::month_bounds(y, month as u32))
        .ok_or_else(|| bad_params(req, "year is out of range"))?;

    let exams = between(conn, req, first, last)?;
    let settings = load_settings(conn, req)?;
    let holidays: Vec<String> = settings
        .holiday_dates
        .range(first..=last)
        .map(|d| format_iso_date(*d))
        .collect();
    Ok(ok(
        &req.id,
        json!({
            "year": year,
            "month": month,
            "exams": exams_json(&exams, &settings),
            "holidays": holidays
        }),
    ))
}

fn handle_for_date(state: &mut AppState, req: &Request) -> Reply {
    let conn = &state.db;
    let date = required_date(req, &req.params, "date")?;
    let exams = between(conn, req, date, date)?;
    let settings = load_settings(conn, req)?;
    Ok(ok(
        &req.id,
        json!({
            "date": format_iso_date(date),
            "isHoliday": settings.is_holiday(date),
            "exams": exams_json(&exams, &settings)
        }),
    ))
}

/// First room of the exam whose range holds the register number.
fn handle_room_for_student(state: &mut AppState, req: &Request) -> Reply {
    let conn = &state.db;
    let exam_id = required_i64(req, &req.params, "examId")?;
    let reg = required_register_no(req)?;
    load(conn, req, exam_id)?;
    let rooms = rooms_for_exam(conn, exam_id).map_err(|e| db_failed(req, "db_query_failed", e))?;
    let room = rooms.iter().find(|r| r.holds(&reg)).map(ExamRoom::to_json);
    Ok(ok(&req.id, json!({ "registerNo": reg, "room": room })))
}

/// Every exam for which the student has a room, with that room.
fn handle_lookup_student(state: &mut AppState, req: &Request) -> Reply {
    let conn = &state.db;
    let reg = required_register_no(req)?;
    let student: Option<(i64, String)> = conn
        .query_row(
            "SELECT id, full_name FROM students WHERE register_no = ?",
            [&reg],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
        .map_err(|e| db_failed(req, "db_query_failed", e))?;

    let exams = query_exams(conn, req, "", Vec::new())?;
    let settings = load_settings(conn, req)?;
    let mut found = Vec::new();
    for exam in &exams {
        let rooms = rooms_for_exam(conn, exam.id).map_err(|e| db_failed(req, "db_query_failed", e))?;
        if let Some(room) = rooms.iter().find(|r| r.holds(&reg)) {
            let mut v = exam.to_json(&settings);
            v["room"] = room.to_json();
            found.push(v);
        }
    }

    let student = student.map(|(id, name)| json!({ "id": id, "fullName": name }));
    Ok(ok(
        &req.id,
        json!({ "registerNo": reg, "student": student, "exams": found }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "exams.list" => handle_list(state, req),
        "exams.get" => handle_get(state, req),
        "exams.create" => handle_create(state, req),
        "exams.update" => handle_update(state, req),
        "exams.delete" => handle_delete(state, req),
        "exams.forMonth" => handle_for_month(state, req),
        "exams.forDate" => handle_for_date(state, req),
        "exams.roomForStudent" => handle_room_for_student(state, req),
        "exams.lookupStudent" => handle_lookup_student(state, req),
        _ => return None,
    };
    Some(res.unwrap_or_else(|e| e))
}
