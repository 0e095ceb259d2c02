use rusqlite::{params, params_from_iter, types::Value as SqlValue, Connection, OptionalExtension};
use serde_json::{json, Value};
use tracing::info;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    bad_params, db_failed, in_range, not_found, object, optional_i64, optional_str,
    reject_unknown_fields, require_admin, required_i64, required_str, Reply,
};
use crate::ipc::types::{AppState, Request};
use crate::register_range::{is_valid_register_no, REGISTER_NO_LEN};
use crate::validation::{canonical, is_valid_email, DEPARTMENTS};

const FIELDS: [&str; 5] = ["registerNo", "fullName", "department", "year", "email"];

#[derive(Debug, Clone)]
struct Student {
    id: i64,
    register_no: String,
    full_name: String,
    department: String,
    year: i64,
    email: String,
}

impl Student {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "registerNo": self.register_no,
            "fullName": self.full_name,
            "department": self.department,
            "year": self.year,
            "email": self.email
        })
    }
}

fn student_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        register_no: row.get(1)?,
        full_name: row.get(2)?,
        department: row.get(3)?,
        year: row.get(4)?,
        email: row.get(5)?,
    })
}

const SELECT: &str = "SELECT id, register_no, full_name, department, year, email FROM students";

fn load(conn: &Connection, req: &Request, id: i64) -> Result<Student, Value> {
    conn.query_row(&format!("{} WHERE id = ?", SELECT), [id], student_from_row)
        .optional()
        .map_err(|e| db_failed(req, "db_query_failed", e))?
        .ok_or_else(|| not_found(req, "student"))
}

fn load_by_register_no(
    conn: &Connection,
    req: &Request,
    register_no: &str,
) -> Result<Option<Student>, Value> {
    conn.query_row(
        &format!("{} WHERE register_no = ?", SELECT),
        [register_no],
        student_from_row,
    )
    .optional()
    .map_err(|e| db_failed(req, "db_query_failed", e))
}

/// Checks a merged record; `self_id` is skipped by the uniqueness check.
fn validate(conn: &Connection, req: &Request, s: &mut Student, self_id: Option<i64>) -> Result<(), Value> {
    if !is_valid_register_no(&s.register_no) {
        return Err(bad_params(
            req,
            format!("registerNo must be exactly {} digits", REGISTER_NO_LEN),
        ));
    }
    if s.full_name.is_empty() {
        return Err(bad_params(req, "fullName must not be empty"));
    }
    s.department = canonical(&DEPARTMENTS, &s.department)
        .ok_or_else(|| bad_params(req, format!("unknown department: {}", s.department)))?
        .to_string();
    in_range(req, "year", s.year, 1, 5)?;
    if !is_valid_email(&s.email) {
        return Err(bad_params(req, "please enter a valid email address"));
    }

    if let Some(other) = load_by_register_no(conn, req, &s.register_no)? {
        if Some(other.id) != self_id {
            return Err(err(
                &req.id,
                "duplicate",
                format!("register number {} already exists", s.register_no),
                Some(json!({ "field": "registerNo", "studentId": other.id })),
            ));
        }
    }
    Ok(())
}

fn handle_list(state: &mut AppState, req: &Request) -> Reply {
    let conn = &state.db;
    let query = optional_str(req, &req.params, "query")?;
    let department = optional_str(req, &req.params, "department")?;
    let year = optional_i64(req, &req.params, "year")?;

    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<SqlValue> = Vec::new();
    if let Some(q) = query.filter(|q| !q.is_empty()) {
        clauses.push("(register_no LIKE ? OR full_name LIKE ?)");
        let pattern = format!("%{}%", q);
        values.push(SqlValue::Text(pattern.clone()));
        values.push(SqlValue::Text(pattern));
    }
    if let Some(d) = department {
        clauses.push("department = ? COLLATE NOCASE");
        values.push(SqlValue::Text(d));
    }
    if let Some(y) = year {
        clauses.push("year = ?");
        values.push(SqlValue::Integer(y));
    }

    let mut sql = SELECT.to_string();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY register_no");

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| db_failed(req, "db_query_failed", e))?;
    let students = stmt
        .query_map(params_from_iter(values), student_from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| db_failed(req, "db_query_failed", e))?;

    let list: Vec<Value> = students.iter().map(Student::to_json).collect();
    Ok(ok(&req.id, json!({ "students": list })))
}

fn handle_get(state: &mut AppState, req: &Request) -> Reply {
    let conn = &state.db;
    let student = if let Some(id) = optional_i64(req, &req.params, "studentId")? {
        load(conn, req, id)?
    } else if let Some(reg) = optional_str(req, &req.params, "registerNo")? {
        load_by_register_no(conn, req, &reg)?.ok_or_else(|| not_found(req, "student"))?
    } else {
        return Err(bad_params(req, "missing studentId or registerNo"));
    };
    Ok(ok(&req.id, json!({ "student": student.to_json() })))
}

fn handle_create(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let conn = &state.db;
    let input = object(req, "input")?;
    reject_unknown_fields(req, input, &FIELDS)?;

    let register_no = required_str(req, input, "registerNo")?;
    let email = optional_str(req, input, "email")?
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| format!("{}@college.edu", register_no));
    let mut student = Student {
        id: 0,
        full_name: required_str(req, input, "fullName")?,
        department: required_str(req, input, "department")?,
        year: required_i64(req, input, "year")?,
        register_no,
        email,
    };
    validate(conn, req, &mut student, None)?;

    conn.execute(
        "INSERT INTO students(register_no, full_name, department, year, email) VALUES(?, ?, ?, ?, ?)",
        params![
            student.register_no,
            student.full_name,
            student.department,
            student.year,
            student.email
        ],
    )
    .map_err(|e| {
        err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        )
    })?;
    student.id = conn.last_insert_rowid();

    info!(student_id = student.id, register_no = %student.register_no, "student created");
    Ok(ok(&req.id, json!({ "student": student.to_json() })))
}

fn handle_update(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let conn = &state.db;
    let id = required_i64(req, &req.params, "studentId")?;
    let patch = object(req, "patch")?;
    reject_unknown_fields(req, patch, &FIELDS)?;

    let mut student = load(conn, req, id)?;
    if let Some(v) = optional_str(req, patch, "registerNo")? {
        student.register_no = v;
    }
    if let Some(v) = optional_str(req, patch, "fullName")? {
        student.full_name = v;
    }
    if let Some(v) = optional_str(req, patch, "department")? {
        student.department = v;
    }
    if let Some(v) = optional_i64(req, patch, "year")? {
        student.year = v;
    }
    if let Some(v) = optional_str(req, patch, "email")? {
        student.email = v;
    }
    validate(conn, req, &mut student, Some(id))?;

    conn.execute(
        "UPDATE students SET register_no = ?, full_name = ?, department = ?, year = ?, email = ?
         WHERE id = ?",
        params![
            student.register_no,
            student.full_name,
            student.department,
            student.year,
            student.email,
            id
        ],
    )
    .map_err(|e| db_failed(req, "db_update_failed", e))?;

    info!(student_id = id, "student updated");
    Ok(ok(&req.id, json!({ "student": student.to_json() })))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let conn = &state.db;
    let id = required_i64(req, &req.params, "studentId")?;
    let changed = conn
        .execute("DELETE FROM students WHERE id = ?", [id])
        .map_err(|e| db_failed(req, "db_delete_failed", e))?;
    if changed == 0 {
        return Err(not_found(req, "student"));
    }
    info!(student_id = id, "student deleted");
    Ok(ok(&req.id, json!({ "ok": true })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "students.list" => handle_list(state, req),
        "students.get" => handle_get(state, req),
        "students.create" => handle_create(state, req),
        "students.update" => handle_update(state, req),
        "students.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(res.unwrap_or_else(|e| e))
}
