use rusqlite::{params, params_from_iter, types::Value as SqlValue, Connection, OptionalExtension};
use serde_json::{json, Value};
use tracing::info;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    bad_params, db_failed, not_found, object, optional_str, reject_unknown_fields, require_admin,
    required_i64, required_str, Reply,
};
use crate::ipc::types::{AppState, Request};
use crate::validation::{canonical, is_valid_email, is_valid_phone, DEPARTMENTS, DESIGNATIONS};

const FIELDS: [&str; 5] = ["name", "department", "designation", "email", "phone"];

const SELECT: &str = "SELECT id, name, department, designation, email, phone FROM faculty";

#[derive(Debug, Clone)]
struct Faculty {
    id: i64,
    name: String,
    department: String,
    designation: String,
    email: String,
    phone: String,
}

impl Faculty {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "department": self.department,
            "designation": self.designation,
            "email": self.email,
            "phone": self.phone
        })
    }
}

fn faculty_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Faculty> {
    Ok(Faculty {
        id: row.get(0)?,
        name: row.get(1)?,
        department: row.get(2)?,
        designation: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
    })
}

fn load(conn: &Connection, req: &Request, id: i64) -> Result<Faculty, Value> {
    conn.query_row(&format!("{} WHERE id = ?", SELECT), [id], faculty_from_row)
        .optional()
        .map_err(|e| db_failed(req, "db_query_failed", e))?
        .ok_or_else(|| not_found(req, "faculty member"))
}

fn validate(conn: &Connection, req: &Request, f: &mut Faculty, self_id: Option<i64>) -> Result<(), Value> {
    if f.name.is_empty() {
        return Err(bad_params(req, "name must not be empty"));
    }
    f.department = canonical(&DEPARTMENTS, &f.department)
        .ok_or_else(|| bad_params(req, format!("unknown department: {}", f.department)))?
        .to_string();
    f.designation = canonical(&DESIGNATIONS, &f.designation)
        .ok_or_else(|| bad_params(req, format!("unknown designation: {}", f.designation)))?
        .to_string();
    if !is_valid_email(&f.email) {
        return Err(bad_params(req, "please enter a valid email address"));
    }
    if !is_valid_phone(&f.phone) {
        return Err(bad_params(
            req,
            "phone must be at least 10 digits with an optional leading +",
        ));
    }

    let holder: Option<i64> = conn
        .query_row(
            "SELECT id FROM faculty WHERE email = ? COLLATE NOCASE",
            [&f.email],
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| db_failed(req, "db_query_failed", e))?;
    if let Some(other) = holder.filter(|other| Some(*other) != self_id) {
        return Err(err(
            &req.id,
            "duplicate",
            format!("email {} is already in use", f.email),
            Some(json!({ "field": "email", "facultyId": other })),
        ));
    }
    Ok(())
}

fn handle_list(state: &mut AppState, req: &Request) -> Reply {
    let conn = &state.db;
    let department = optional_str(req, &req.params, "department")?;
    let designation = optional_str(req, &req.params, "designation")?;

    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<SqlValue> = Vec::new();
    if let Some(d) = department {
        clauses.push("department = ? COLLATE NOCASE");
        values.push(SqlValue::Text(d));
    }
    if let Some(d) = designation {
        clauses.push("designation = ? COLLATE NOCASE");
        values.push(SqlValue::Text(d));
    }
    let mut sql = SELECT.to_string();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY name");

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| db_failed(req, "db_query_failed", e))?;
    let rows = stmt
        .query_map(params_from_iter(values), faculty_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| db_failed(req, "db_query_failed", e))?;
    let faculty: Vec<Value> = rows.iter().map(Faculty::to_json).collect();
    Ok(ok(&req.id, json!({ "faculty": faculty })))
}

fn handle_get(state: &mut AppState, req: &Request) -> Reply {
    let id = required_i64(req, &req.params, "facultyId")?;
    let f = load(&state.db, req, id)?;

    let mut stmt = state
        .db
        .prepare("SELECT id, subject_code, subject_name FROM subjects WHERE faculty_id = ? ORDER BY subject_code")
        .map_err(|e| db_failed(req, "db_query_failed", e))?;
    let subjects = stmt
        .query_map([id], |row| {
            let sid: i64 = row.get(0)?;
            let code: String = row.get(1)?;
            let name: String = row.get(2)?;
            Ok(json!({ "id": sid, "subjectCode": code, "subjectName": name }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| db_failed(req, "db_query_failed", e))?;

    Ok(ok(&req.id, json!({ "faculty": f.to_json(), "subjects": subjects })))
}

fn handle_create(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let conn = &state.db;
    let input = object(req, "input")?;
    reject_unknown_fields(req, input, &FIELDS)?;

    let mut f = Faculty {
        id: 0,
        name: required_str(req, input, "name")?,
        department: required_str(req, input, "department")?,
        designation: required_str(req, input, "designation")?,
        email: required_str(req, input, "email")?,
        phone: required_str(req, input, "phone")?,
    };
    validate(conn, req, &mut f, None)?;

    conn.execute(
        "INSERT INTO faculty(name, department, designation, email, phone) VALUES(?, ?, ?, ?, ?)",
        params![f.name, f.department, f.designation, f.email, f.phone],
    )
    .map_err(|e| {
        err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "faculty" })),
        )
    })?;
    f.id = conn.last_insert_rowid();

    info!(faculty_id = f.id, "faculty created");
    Ok(ok(&req.id, json!({ "faculty": f.to_json() })))
}

fn handle_update(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let conn = &state.db;
    let id = required_i64(req, &req.params, "facultyId")?;
    let patch = object(req, "patch")?;
    reject_unknown_fields(req, patch, &FIELDS)?;

    let mut f = load(conn, req, id)?;
    if let Some(v) = optional_str(req, patch, "name")? {
        f.name = v;
    }
    if let Some(v) = optional_str(req, patch, "department")? {
        f.department = v;
    }
    if let Some(v) = optional_str(req, patch, "designation")? {
        f.designation = v;
    }
    if let Some(v) = optional_str(req, patch, "email")? {
        f.email = v;
    }
    if let Some(v) = optional_str(req, patch, "phone")? {
        f.phone = v;
    }
    validate(conn, req, &mut f, Some(id))?;

    conn.execute(
        "UPDATE faculty SET name = ?, department = ?, designation = ?, email = ?, phone = ?
         WHERE id = ?",
        params![f.name, f.department, f.designation, f.email, f.phone, id],
    )
    .map_err(|e| db_failed(req, "db_update_failed", e))?;

    info!(faculty_id = id, "faculty updated");
    Ok(ok(&req.id, json!({ "faculty": f.to_json() })))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let conn = &state.db;
    let id = required_i64(req, &req.params, "facultyId")?;
    load(conn, req, id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| db_failed(req, "db_tx_failed", e))?;

    // Subjects and timetable entries outlive the faculty member; only the reference goes.
    let mut cleared = 0usize;
    for table in ["subjects", "timetable_entries"] {
        match tx.execute(
            &format!("UPDATE {} SET faculty_id = NULL WHERE faculty_id = ?", table),
            [id],
        ) {
            Ok(n) => cleared += n,
            Err(e) => {
                let _ = tx.rollback();
                return Err(err(
                    &req.id,
                    "db_update_failed",
                    e.to_string(),
                    Some(json!({ "table": table })),
                ));
            }
        }
    }
    if let Err(e) = tx.execute("DELETE FROM faculty WHERE id = ?", [id]) {
        let _ = tx.rollback();
        return Err(err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "faculty" })),
        ));
    }
    tx.commit()
        .map_err(|e| db_failed(req, "db_commit_failed", e))?;

    info!(faculty_id = id, cleared, "faculty deleted");
    Ok(ok(&req.id, json!({ "ok": true, "referencesCleared": cleared })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "faculty.list" => handle_list(state, req),
        "faculty.get" => handle_get(state, req),
        "faculty.create" => handle_create(state, req),
        "faculty.update" => handle_update(state, req),
        "faculty.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(res.unwrap_or_else(|e| e))
}
