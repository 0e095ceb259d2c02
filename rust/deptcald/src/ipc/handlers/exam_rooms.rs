use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::info;

use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    bad_params, db_failed, not_found, object, optional_str, reject_unknown_fields, require_admin,
    required_i64, required_str, Reply,
};
use crate::ipc::types::{AppState, Request};
use crate::register_range::RegisterRange;

#[derive(Debug, Clone)]
pub(crate) struct ExamRoom {
    pub id: i64,
    pub exam_id: i64,
    pub room_name: String,
    pub register_range: String,
}

impl ExamRoom {
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "examId": self.exam_id,
            "roomName": self.room_name,
            "registerRange": self.register_range
        })
    }

    /// Malformed stored ranges hold nobody.
    pub fn holds(&self, register_no: &str) -> bool {
        crate::register_range::is_in_register_range(register_no, &self.register_range)
    }
}

fn room_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExamRoom> {
    Ok(ExamRoom {
        id: row.get(0)?,
        exam_id: row.get(1)?,
        room_name: row.get(2)?,
        register_range: row.get(3)?,
    })
}

/// Rooms of one exam in the order they were added.
pub(crate) fn rooms_for_exam(conn: &Connection, exam_id: i64) -> rusqlite::Result<Vec<ExamRoom>> {
    let mut stmt = conn.prepare(
        "SELECT id, exam_id, room_name, register_range FROM exam_rooms WHERE exam_id = ? ORDER BY id",
    )?;
    let rooms = stmt
        .query_map([exam_id], room_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rooms)
}

fn load(conn: &Connection, req: &Request, id: i64) -> Result<ExamRoom, Value> {
    conn.query_row(
        "SELECT id, exam_id, room_name, register_range FROM exam_rooms WHERE id = ?",
        [id],
        room_from_row,
    )
    .optional()
    .map_err(|e| db_failed(req, "db_query_failed", e))?
    .ok_or_else(|| not_found(req, "exam room"))
}

fn require_exam(conn: &Connection, req: &Request, exam_id: i64) -> Result<(), Value> {
    let exists = db::row_exists(conn, "exams", exam_id).map_err(|e| db_failed(req, "db_query_failed", e))?;
    if !exists {
        return Err(not_found(req, "exam"));
    }
    Ok(())
}

fn parse_range(req: &Request, raw: &str) -> Result<RegisterRange, Value> {
    RegisterRange::parse(raw).map_err(|e| {
        err(
            &req.id,
            "invalid_range",
            e.to_string(),
            Some(json!({ "part": e.part, "reason": e.reason })),
        )
    })
}

/// Other rooms of the same exam whose ranges share a register number with `range`.
fn overlapping_rooms(
    conn: &Connection,
    req: &Request,
    exam_id: i64,
    range: &RegisterRange,
    self_id: Option<i64>,
) -> Result<Vec<i64>, Value> {
    let rooms = rooms_for_exam(conn, exam_id).map_err(|e| db_failed(req, "db_query_failed", e))?;
    Ok(rooms
        .iter()
        .filter(|r| Some(r.id) != self_id)
        .filter(|r| {
            RegisterRange::parse(&r.register_range)
                .map(|other| other.overlaps(range))
                .unwrap_or(false)
        })
        .map(|r| r.id)
        .collect())
}

fn handle_list(state: &mut AppState, req: &Request) -> Reply {
    let exam_id = required_i64(req, &req.params, "examId")?;
    require_exam(&state.db, req, exam_id)?;
    let rooms = rooms_for_exam(&state.db, exam_id).map_err(|e| db_failed(req, "db_query_failed", e))?;
    let list: Vec<Value> = rooms.iter().map(ExamRoom::to_json).collect();
    Ok(ok(&req.id, json!({ "rooms": list })))
}

fn handle_create(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let conn = &state.db;
    let exam_id = required_i64(req, &req.params, "examId")?;
    let room_name = required_str(req, &req.params, "roomName")?;
    let range = parse_range(req, &required_str(req, &req.params, "registerRange")?)?;
    require_exam(conn, req, exam_id)?;

    let overlaps = overlapping_rooms(conn, req, exam_id, &range, None)?;
    let room = ExamRoom {
        id: 0,
        exam_id,
        room_name,
        register_range: range.to_string(),
    };
    conn.execute(
        "INSERT INTO exam_rooms(exam_id, room_name, register_range) VALUES(?, ?, ?)",
        params![room.exam_id, room.room_name, room.register_range],
    )
    .map_err(|e| {
        err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "exam_rooms" })),
        )
    })?;
    let room = ExamRoom {
        id: conn.last_insert_rowid(),
        ..room
    };

    info!(room_id = room.id, exam_id, range = %room.register_range, "exam room created");
    Ok(ok(
        &req.id,
        json!({ "room": room.to_json(), "overlapsWith": overlaps }),
    ))
}

fn handle_update(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let conn = &state.db;
    let id = required_i64(req, &req.params, "roomId")?;
    let patch = object(req, "patch")?;
    reject_unknown_fields(req, patch, &["roomName", "registerRange"])?;

    let mut room = load(conn, req, id)?;
    if let Some(name) = optional_str(req, patch, "roomName")? {
        if name.is_empty() {
            return Err(bad_params(req, "roomName must not be empty"));
        }
        room.room_name = name;
    }
    if let Some(raw) = optional_str(req, patch, "registerRange")? {
        room.register_range = parse_range(req, &raw)?.to_string();
    }
    let overlaps = match RegisterRange::parse(&room.register_range) {
        Ok(range) => overlapping_rooms(conn, req, room.exam_id, &range, Some(id))?,
        Err(_) => Vec::new(),
    };

    conn.execute(
        "UPDATE exam_rooms SET room_name = ?, register_range = ? WHERE id = ?",
        params![room.room_name, room.register_range, id],
    )
    .map_err(|e| db_failed(req, "db_update_failed", e))?;

    info!(room_id = id, "exam room updated");
    Ok(ok(
        &req.id,
        json!({ "room": room.to_json(), "overlapsWith": overlaps }),
    ))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let id = required_i64(req, &req.params, "roomId")?;
    let changed = state
        .db
        .execute("DELETE FROM exam_rooms WHERE id = ?", [id])
        .map_err(|e| db_failed(req, "db_delete_failed", e))?;
    if changed == 0 {
        return Err(not_found(req, "exam room"));
    }
    info!(room_id = id, "exam room deleted");
    Ok(ok(&req.id, json!({ "ok": true })))
}

/// Students of the roster no room of the exam takes, and students claimed by more
/// than one room.
fn handle_coverage(state: &mut AppState, req: &Request) -> Reply {
    let conn = &state.db;
    let exam_id = required_i64(req, &req.params, "examId")?;
    require_exam(conn, req, exam_id)?;
    let rooms = rooms_for_exam(conn, exam_id).map_err(|e| db_failed(req, "db_query_failed", e))?;

    let mut stmt = conn
        .prepare("SELECT register_no FROM students ORDER BY register_no")
        .map_err(|e| db_failed(req, "db_query_failed", e))?;
    let roster = stmt
        .query_map([], |r| r.get::<_, String>(0))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| db_failed(req, "db_query_failed", e))?;

    let mut unassigned: Vec<&str> = Vec::new();
    let mut multiple: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for reg in &roster {
        let holding: Vec<&str> = rooms
            .iter()
            .filter(|room| room.holds(reg))
            .map(|room| room.room_name.as_str())
            .collect();
        match holding.len() {
            0 => unassigned.push(reg),
            1 => {}
            _ => {
                multiple.insert(reg, holding);
            }
        }
    }
    let multiple: Vec<Value> = multiple
        .into_iter()
        .map(|(reg, rooms)| json!({ "registerNo": reg, "rooms": rooms }))
        .collect();

    Ok(ok(
        &req.id,
        json!({
            "examId": exam_id,
            "students": roster.len(),
            "unassigned": unassigned,
            "multiplyAssigned": multiple
        }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "examRooms.list" => handle_list(state, req),
        "examRooms.create" => handle_create(state, req),
        "examRooms.update" => handle_update(state, req),
        "examRooms.delete" => handle_delete(state, req),
        "examRooms.coverage" => handle_coverage(state, req),
        _ => return None,
    };
    Some(res.unwrap_or_else(|e| e))
}
