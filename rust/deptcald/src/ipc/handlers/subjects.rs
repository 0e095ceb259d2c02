use rusqlite::{params, params_from_iter, types::Value as SqlValue, Connection, OptionalExtension};
use serde_json::{json, Value};
use tracing::info;

use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    bad_params, db_failed, in_range, not_found, nullable_i64, object, optional_i64, optional_str,
    reject_unknown_fields, require_admin, required_i64, required_str, Reply,
};
use crate::ipc::types::{AppState, Request};
use crate::validation::{canonical, is_valid_subject_code, DEPARTMENTS, SUBJECT_TYPES};

const FIELDS: [&str; 7] = [
    "subjectCode",
    "subjectName",
    "subjectType",
    "facultyId",
    "semester",
    "credits",
    "department",
];

const SELECT: &str = "SELECT s.id, s.subject_code, s.subject_name, s.subject_type, s.faculty_id,
       f.name, s.semester, s.credits, s.department
     FROM subjects s
     LEFT JOIN faculty f ON f.id = s.faculty_id";

#[derive(Debug, Clone)]
struct Subject {
    id: i64,
    code: String,
    name: String,
    kind: String,
    faculty_id: Option<i64>,
    faculty_name: Option<String>,
    semester: i64,
    credits: i64,
    department: String,
}

impl Subject {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "subjectCode": self.code,
            "subjectName": self.name,
            "subjectType": self.kind,
            "facultyId": self.faculty_id,
            "facultyName": self.faculty_name,
            "semester": self.semester,
            "credits": self.credits,
            "department": self.department
        })
    }
}

fn subject_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        kind: row.get(3)?,
        faculty_id: row.get(4)?,
        faculty_name: row.get(5)?,
        semester: row.get(6)?,
        credits: row.get(7)?,
        department: row.get(8)?,
    })
}

fn load(conn: &Connection, req: &Request, id: i64) -> Result<Subject, Value> {
    conn.query_row(&format!("{} WHERE s.id = ?", SELECT), [id], subject_from_row)
        .optional()
        .map_err(|e| db_failed(req, "db_query_failed", e))?
        .ok_or_else(|| not_found(req, "subject"))
}

fn validate(conn: &Connection, req: &Request, s: &mut Subject, self_id: Option<i64>) -> Result<(), Value> {
    s.code = s.code.to_ascii_uppercase();
    if !is_valid_subject_code(&s.code) {
        return Err(bad_params(
            req,
            "subjectCode must be two or more letters followed by three digits (e.g. CS101)",
        ));
    }
    if s.name.is_empty() {
        return Err(bad_params(req, "subjectName must not be empty"));
    }
    s.kind = canonical(&SUBJECT_TYPES, &s.kind)
        .ok_or_else(|| bad_params(req, format!("unknown subjectType: {}", s.kind)))?
        .to_string();
    s.department = canonical(&DEPARTMENTS, &s.department)
        .ok_or_else(|| bad_params(req, format!("unknown department: {}", s.department)))?
        .to_string();
    in_range(req, "semester", s.semester, 1, 8)?;
    in_range(req, "credits", s.credits, 1, 4)?;

    if let Some(fid) = s.faculty_id {
        let exists = db::row_exists(conn, "faculty", fid)
            .map_err(|e| db_failed(req, "db_query_failed", e))?;
        if !exists {
            return Err(not_found(req, "faculty member"));
        }
    }

    let holder: Option<i64> = conn
        .query_row(
            "SELECT id FROM subjects WHERE subject_code = ?",
            [&s.code],
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| db_failed(req, "db_query_failed", e))?;
    if let Some(other) = holder.filter(|other| Some(*other) != self_id) {
        return Err(err(
            &req.id,
            "duplicate",
            format!("subject code {} already exists", s.code),
            Some(json!({ "field": "subjectCode", "subjectId": other })),
        ));
    }
    Ok(())
}

fn handle_list(state: &mut AppState, req: &Request) -> Reply {
    let conn = &state.db;
    let semester = optional_i64(req, &req.params, "semester")?;
    let kind = optional_str(req, &req.params, "type")?;

    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<SqlValue> = Vec::new();
    if let Some(sem) = semester {
        clauses.push("s.semester = ?");
        values.push(SqlValue::Integer(sem));
    }
    if let Some(k) = kind {
        clauses.push("s.subject_type = ? COLLATE NOCASE");
        values.push(SqlValue::Text(k));
    }
    let mut sql = SELECT.to_string();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY s.subject_code");

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| db_failed(req, "db_query_failed", e))?;
    let rows = stmt
        .query_map(params_from_iter(values), subject_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| db_failed(req, "db_query_failed", e))?;
    let subjects: Vec<Value> = rows.iter().map(Subject::to_json).collect();
    Ok(ok(&req.id, json!({ "subjects": subjects })))
}

fn handle_get(state: &mut AppState, req: &Request) -> Reply {
    let conn = &state.db;
    let subject = if let Some(id) = optional_i64(req, &req.params, "subjectId")? {
        load(conn, req, id)?
    } else if let Some(code) = optional_str(req, &req.params, "subjectCode")? {
        conn.query_row(
            &format!("{} WHERE s.subject_code = ? COLLATE NOCASE", SELECT),
            [&code],
            subject_from_row,
        )
        .optional()
        .map_err(|e| db_failed(req, "db_query_failed", e))?
        .ok_or_else(|| not_found(req, "subject"))?
    } else {
        return Err(bad_params(req, "missing subjectId or subjectCode"));
    };
    Ok(ok(&req.id, json!({ "subject": subject.to_json() })))
}

fn handle_create(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let conn = &state.db;
    let input = object(req, "input")?;
    reject_unknown_fields(req, input, &FIELDS)?;

    let mut s = Subject {
        id: 0,
        code: required_str(req, input, "subjectCode")?,
        name: required_str(req, input, "subjectName")?,
        kind: required_str(req, input, "subjectType")?,
        faculty_id: nullable_i64(req, input, "facultyId")?.flatten(),
        faculty_name: None,
        semester: required_i64(req, input, "semester")?,
        credits: optional_i64(req, input, "credits")?.unwrap_or(3),
        department: optional_str(req, input, "department")?
            .unwrap_or_else(|| DEPARTMENTS[0].to_string()),
    };
    validate(conn, req, &mut s, None)?;

    conn.execute(
        "INSERT INTO subjects(subject_code, subject_name, subject_type, faculty_id, semester, credits, department)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![s.code, s.name, s.kind, s.faculty_id, s.semester, s.credits, s.department],
    )
    .map_err(|e| {
        err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "subjects" })),
        )
    })?;
    let id = conn.last_insert_rowid();
    let created = load(conn, req, id)?;

    info!(subject_id = id, code = %created.code, "subject created");
    Ok(ok(&req.id, json!({ "subject": created.to_json() })))
}

fn handle_update(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let conn = &state.db;
    let id = required_i64(req, &req.params, "subjectId")?;
    let patch = object(req, "patch")?;
    reject_unknown_fields(req, patch, &FIELDS)?;

    let mut s = load(conn, req, id)?;
    if let Some(v) = optional_str(req, patch, "subjectCode")? {
        s.code = v;
    }
    if let Some(v) = optional_str(req, patch, "subjectName")? {
        s.name = v;
    }
    if let Some(v) = optional_str(req, patch, "subjectType")? {
        s.kind = v;
    }
    if let Some(v) = nullable_i64(req, patch, "facultyId")? {
        s.faculty_id = v;
    }
    if let Some(v) = optional_i64(req, patch, "semester")? {
        s.semester = v;
    }
    if let Some(v) = optional_i64(req, patch, "credits")? {
        s.credits = v;
    }
    if let Some(v) = optional_str(req, patch, "department")? {
        s.department = v;
    }
    validate(conn, req, &mut s, Some(id))?;

    conn.execute(
        "UPDATE subjects
         SET subject_code = ?, subject_name = ?, subject_type = ?, faculty_id = ?,
             semester = ?, credits = ?, department = ?
         WHERE id = ?",
        params![s.code, s.name, s.kind, s.faculty_id, s.semester, s.credits, s.department, id],
    )
    .map_err(|e| db_failed(req, "db_update_failed", e))?;
    let updated = load(conn, req, id)?;

    info!(subject_id = id, "subject updated");
    Ok(ok(&req.id, json!({ "subject": updated.to_json() })))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let conn = &state.db;
    let id = required_i64(req, &req.params, "subjectId")?;
    load(conn, req, id)?;

    let count = |sql: &str| -> Result<i64, Value> {
        conn.query_row(sql, [id], |r| r.get(0))
            .map_err(|e| db_failed(req, "db_query_failed", e))
    };
    let entries = count("SELECT COUNT(*) FROM timetable_entries WHERE subject_id = ?")?;
    let exams = count("SELECT COUNT(*) FROM exams WHERE subject_id = ?")?;
    if entries > 0 || exams > 0 {
        return Err(err(
            &req.id,
            "in_use",
            "subject is still scheduled; remove its timetable entries and exams first",
            Some(json!({ "timetableEntries": entries, "exams": exams })),
        ));
    }

    conn.execute("DELETE FROM subjects WHERE id = ?", [id])
        .map_err(|e| db_failed(req, "db_delete_failed", e))?;
    info!(subject_id = id, "subject deleted");
    Ok(ok(&req.id, json!({ "ok": true })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "subjects.list" => handle_list(state, req),
        "subjects.get" => handle_get(state, req),
        "subjects.create" => handle_create(state, req),
        "subjects.update" => handle_update(state, req),
        "subjects.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(res.unwrap_or_else(|e| e))
}
