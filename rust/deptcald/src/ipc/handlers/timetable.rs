use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::calendar::{self, DateResolution, Day};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    bad_params, db_failed, not_found, nullable_i64, object, optional_bool, optional_i64,
    optional_str, parse_day, reject_unknown_fields, require_admin, required_date, required_day,
    required_i64, required_str, Reply,
};
use crate::ipc::types::{AppState, Request};
use crate::settings::DepartmentSettings;
use crate::slots::{validate_placement, SlotSpan};
use crate::timing::{format_12h, format_hhmm};

const FIELDS: [&str; 9] = [
    "day",
    "periodNumber",
    "slotsUsed",
    "subjectId",
    "facultyId",
    "room",
    "isElective",
    "isBreak",
    "isLunch",
];

const SELECT: &str = "SELECT t.id, t.day, t.period_number, t.slots_used, t.subject_id,
       s.subject_code, s.subject_name, t.faculty_id, f.name, t.room,
       t.is_elective, t.is_break, t.is_lunch
     FROM timetable_entries t
     LEFT JOIN subjects s ON s.id = t.subject_id
     LEFT JOIN faculty f ON f.id = t.faculty_id";

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub id: i64,
    pub day: Day,
    pub period: u32,
    pub slots: u32,
    pub subject_id: Option<i64>,
    pub subject_code: Option<String>,
    pub subject_name: Option<String>,
    pub faculty_id: Option<i64>,
    pub faculty_name: Option<String>,
    pub room: String,
    pub is_elective: bool,
    pub is_break: bool,
    pub is_lunch: bool,
}

impl Entry {
    fn is_pause(&self) -> bool {
        self.is_break || self.is_lunch
    }

    fn kind(&self) -> &'static str {
        if self.is_lunch {
            "lunch"
        } else if self.is_break {
            "break"
        } else {
            "class"
        }
    }

    pub fn span(&self) -> SlotSpan {
        SlotSpan::new(self.day, self.period, self.slots)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "day": self.day,
            "periodNumber": self.period,
            "slotsUsed": self.slots,
            "subjectId": self.subject_id,
            "subjectCode": self.subject_code,
            "subjectName": self.subject_name,
            "facultyId": self.faculty_id,
            "facultyName": self.faculty_name,
            "room": self.room,
            "isElective": self.is_elective,
            "isBreak": self.is_break,
            "isLunch": self.is_lunch,
            "kind": self.kind()
        })
    }
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entry> {
    let raw_day: String = row.get(1)?;
    let day = Day::parse(&raw_day).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(1, Type::Text, format!("unknown day {}", raw_day).into())
    })?;
    Ok(Entry {
        id: row.get(0)?,
        day,
        period: row.get(2)?,
        slots: row.get(3)?,
        subject_id: row.get(4)?,
        subject_code: row.get(5)?,
        subject_name: row.get(6)?,
        faculty_id: row.get(7)?,
        faculty_name: row.get(8)?,
        room: row.get(9)?,
        is_elective: row.get(10)?,
        is_break: row.get(11)?,
        is_lunch: row.get(12)?,
    })
}

fn load(conn: &Connection, req: &Request, id: i64) -> Result<Entry, Value> {
    conn.query_row(&format!("{} WHERE t.id = ?", SELECT), [id], entry_from_row)
        .optional()
        .map_err(|e| db_failed(req, "db_query_failed", e))?
        .ok_or_else(|| not_found(req, "timetable entry"))
}

/// Entries ordered by day then period; `day` narrows to one day.
pub(crate) fn list_entries(conn: &Connection, day: Option<Day>) -> rusqlite::Result<Vec<Entry>> {
    let mut entries = match day {
        Some(d) => {
            let mut stmt = conn.prepare(&format!("{} WHERE t.day = ?", SELECT))?;
            let rows = stmt.query_map([d.as_str()], entry_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(SELECT)?;
            let rows = stmt.query_map([], entry_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    entries.sort_by_key(|e| (e.day, e.period, e.id));
    Ok(entries)
}

fn load_settings(conn: &Connection, req: &Request) -> Result<DepartmentSettings, Value> {
    db::load_settings(conn).map_err(|e| db_failed(req, "db_query_failed", e))
}

/// Runs the slot checks for `span` against the stored entries of its day.
fn check_placement(
    conn: &Connection,
    req: &Request,
    span: &SlotSpan,
    ignore_id: Option<i64>,
) -> Result<(), Value> {
    let settings = load_settings(conn, req)?;
    let existing = db::day_spans(conn, span.day).map_err(|e| db_failed(req, "db_query_failed", e))?;
    validate_placement(span, ignore_id, &existing, settings.max_periods(span.day)).map_err(|e| {
        warn!(day = %span.day, period = span.period, slots = span.slots, error = %e, "placement rejected");
        let details = match &e {
            crate::slots::PlacementError::Conflict { entry_id, .. } => {
                Some(json!({ "conflictingEntryId": entry_id }))
            }
            _ => None,
        };
        err(&req.id, e.code(), e.to_string(), details)
    })
}

/// Shape rules that do not depend on other entries.
fn validate_entry(conn: &Connection, req: &Request, entry: &Entry) -> Result<(), Value> {
    if entry.is_break && entry.is_lunch {
        return Err(bad_params(req, "an entry cannot be both a break and lunch"));
    }
    if entry.is_pause() {
        if entry.subject_id.is_some() || entry.faculty_id.is_some() {
            return Err(bad_params(req, "break and lunch entries carry no subject or faculty"));
        }
        if entry.is_elective {
            return Err(bad_params(req, "break and lunch entries cannot be electives"));
        }
        return Ok(());
    }

    let Some(subject_id) = entry.subject_id else {
        return Err(bad_params(req, "a class entry needs a subjectId"));
    };
    let subject_exists = db::row_exists(conn, "subjects", subject_id)
        .map_err(|e| db_failed(req, "db_query_failed", e))?;
    if !subject_exists {
        return Err(not_found(req, "subject"));
    }
    if let Some(fid) = entry.faculty_id {
        let faculty_exists = db::row_exists(conn, "faculty", fid)
            .map_err(|e| db_failed(req, "db_query_failed", e))?;
        if !faculty_exists {
            return Err(not_found(req, "faculty member"));
        }
    }
    Ok(())
}

fn positive_u32(req: &Request, key: &str, v: i64) -> Result<u32, Value> {
    u32::try_from(v).map_err(|_| bad_params(req, format!("{} must not be negative", key)))
}

fn insert_entry(conn: &Connection, req: &Request, entry: &Entry) -> Result<i64, Value> {
    conn.execute(
        "INSERT INTO timetable_entries(day, period_number, slots_used, subject_id, faculty_id, room, is_elective, is_break, is_lunch)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            entry.day.as_str(),
            entry.period,
            entry.slots,
            entry.subject_id,
            entry.faculty_id,
            entry.room,
            entry.is_elective,
            entry.is_break,
            entry.is_lunch
        ],
    )
    .map_err(|e| {
        err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "timetable_entries" })),
        )
    })?;
    Ok(conn.last_insert_rowid())
}

fn save_entry(conn: &Connection, req: &Request, entry: &Entry) -> Result<(), Value> {
    conn.execute(
        "UPDATE timetable_entries
         SET day = ?, period_number = ?, slots_used = ?, subject_id = ?, faculty_id = ?,
             room = ?, is_elective = ?, is_break = ?, is_lunch = ?
         WHERE id = ?",
        params![
            entry.day.as_str(),
            entry.period,
            entry.slots,
            entry.subject_id,
            entry.faculty_id,
            entry.room,
            entry.is_elective,
            entry.is_break,
            entry.is_lunch,
            entry.id
        ],
    )
    .map_err(|e| db_failed(req, "db_update_failed", e))?;
    Ok(())
}

fn subject_faculty(conn: &Connection, req: &Request, subject_id: i64) -> Result<Option<i64>, Value> {
    conn.query_row(
        "SELECT faculty_id FROM subjects WHERE id = ?",
        [subject_id],
        |r| r.get::<_, Option<i64>>(0),
    )
    .optional()
    .map(Option::flatten)
    .map_err(|e| db_failed(req, "db_query_failed", e))
}

fn handle_list(state: &mut AppState, req: &Request) -> Reply {
    let day = match optional_str(req, &req.params, "day")? {
        Some(raw) => Some(parse_day(req, "day", &raw)?),
        None => None,
    };
    let entries = list_entries(&state.db, day).map_err(|e| db_failed(req, "db_query_failed", e))?;
    let list: Vec<Value> = entries.iter().map(Entry::to_json).collect();
    Ok(ok(&req.id, json!({ "entries": list })))
}

fn handle_get(state: &mut AppState, req: &Request) -> Reply {
    let id = required_i64(req, &req.params, "entryId")?;
    let entry = load(&state.db, req, id)?;
    Ok(ok(&req.id, json!({ "entry": entry.to_json() })))
}

fn handle_create(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let conn = &state.db;
    let input = object(req, "input")?;
    reject_unknown_fields(req, input, &FIELDS)?;

    let subject_id = nullable_i64(req, input, "subjectId")?.flatten();
    let faculty_id = match nullable_i64(req, input, "facultyId")? {
        Some(v) => v,
        None => match subject_id {
            Some(sid) => subject_faculty(conn, req, sid)?,
            None => None,
        },
    };
    let mut entry = Entry {
        id: 0,
        day: required_day(req, input, "day")?,
        period: positive_u32(req, "periodNumber", required_i64(req, input, "periodNumber")?)?,
        slots: positive_u32(req, "slotsUsed", optional_i64(req, input, "slotsUsed")?.unwrap_or(1))?,
        subject_id,
        subject_code: None,
        subject_name: None,
        faculty_id,
        faculty_name: None,
        room: optional_str(req, input, "room")?.unwrap_or_default(),
        is_elective: optional_bool(req, input, "isElective")?.unwrap_or(false),
        is_break: optional_bool(req, input, "isBreak")?.unwrap_or(false),
        is_lunch: optional_bool(req, input, "isLunch")?.unwrap_or(false),
    };
    validate_entry(conn, req, &entry)?;
    check_placement(conn, req, &entry.span(), None)?;

    entry.id = insert_entry(conn, req, &entry)?;
    let created = load(conn, req, entry.id)?;
    info!(entry_id = created.id, day = %created.day, period = created.period, "timetable entry created");
    Ok(ok(&req.id, json!({ "entry": created.to_json() })))
}

fn handle_add_break(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let conn = &state.db;
    let day = required_day(req, &req.params, "day")?;
    let period = positive_u32(req, "periodNumber", required_i64(req, &req.params, "periodNumber")?)?;
    let slots = positive_u32(
        req,
        "slotsUsed",
        optional_i64(req, &req.params, "slotsUsed")?.unwrap_or(1),
    )?;
    let kind = required_str(req, &req.params, "kind")?.to_ascii_lowercase();
    let is_lunch = match kind.as_str() {
        "break" => false,
        "lunch" => true,
        _ => return Err(bad_params(req, "kind must be break or lunch")),
    };

    let mut entry = Entry {
        id: 0,
        day,
        period,
        slots,
        subject_id: None,
        subject_code: None,
        subject_name: None,
        faculty_id: None,
        faculty_name: None,
        room: String::new(),
        is_elective: false,
        is_break: !is_lunch,
        is_lunch,
    };
    check_placement(conn, req, &entry.span(), None)?;
    entry.id = insert_entry(conn, req, &entry)?;

    info!(entry_id = entry.id, day = %day, period, kind = %kind, "pause added");
    Ok(ok(&req.id, json!({ "entry": entry.to_json() })))
}

fn handle_update(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let conn = &state.db;
    let id = required_i64(req, &req.params, "entryId")?;
    let patch = object(req, "patch")?;
    reject_unknown_fields(req, patch, &FIELDS)?;

    let mut entry = load(conn, req, id)?;
    if let Some(raw) = optional_str(req, patch, "day")? {
        entry.day = parse_day(req, "day", &raw)?;
    }
    if let Some(v) = optional_i64(req, patch, "periodNumber")? {
        entry.period = positive_u32(req, "periodNumber", v)?;
    }
    if let Some(v) = optional_i64(req, patch, "slotsUsed")? {
        entry.slots = positive_u32(req, "slotsUsed", v)?;
    }
    if let Some(v) = optional_str(req, patch, "room")? {
        entry.room = v;
    }
    if let Some(v) = optional_bool(req, patch, "isElective")? {
        entry.is_elective = v;
    }
    if let Some(v) = optional_bool(req, patch, "isBreak")? {
        entry.is_break = v;
    }
    if let Some(v) = optional_bool(req, patch, "isLunch")? {
        entry.is_lunch = v;
    }
    let subject_patch = nullable_i64(req, patch, "subjectId")?;
    let faculty_patch = nullable_i64(req, patch, "facultyId")?;
    if entry.is_pause() {
        // Turning a class into a pause drops its subject unless the patch names one.
        if subject_patch.is_none() {
            entry.subject_id = None;
        }
        if faculty_patch.is_none() {
            entry.faculty_id = None;
        }
    }
    if let Some(v) = subject_patch {
        entry.subject_id = v;
        if faculty_patch.is_none() {
            entry.faculty_id = match v {
                Some(sid) => subject_faculty(conn, req, sid)?,
                None => None,
            };
        }
    }
    if let Some(v) = faculty_patch {
        entry.faculty_id = v;
    }

    validate_entry(conn, req, &entry)?;
    check_placement(conn, req, &entry.span(), Some(id))?;
    save_entry(conn, req, &entry)?;

    let updated = load(conn, req, id)?;
    info!(entry_id = id, "timetable entry updated");
    Ok(ok(&req.id, json!({ "entry": updated.to_json() })))
}

fn handle_move(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let conn = &state.db;
    let id = required_i64(req, &req.params, "entryId")?;
    let mut entry = load(conn, req, id)?;
    entry.day = required_day(req, &req.params, "day")?;
    entry.period = positive_u32(req, "periodNumber", required_i64(req, &req.params, "periodNumber")?)?;

    check_placement(conn, req, &entry.span(), Some(id))?;
    save_entry(conn, req, &entry)?;

    info!(entry_id = id, day = %entry.day, period = entry.period, "timetable entry moved");
    Ok(ok(&req.id, json!({ "entry": entry.to_json() })))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let id = required_i64(req, &req.params, "entryId")?;
    let changed = state
        .db
        .execute("DELETE FROM timetable_entries WHERE id = ?", [id])
        .map_err(|e| db_failed(req, "db_delete_failed", e))?;
    if changed == 0 {
        return Err(not_found(req, "timetable entry"));
    }
    info!(entry_id = id, "timetable entry deleted");
    Ok(ok(&req.id, json!({ "ok": true })))
}

/// Dry run of the placement rules so editors can grey out occupied cells.
fn handle_check_placement(state: &mut AppState, req: &Request) -> Reply {
    let conn = &state.db;
    let day = required_day(req, &req.params, "day")?;
    let period = positive_u32(req, "periodNumber", required_i64(req, &req.params, "periodNumber")?)?;
    let slots = positive_u32(
        req,
        "slotsUsed",
        optional_i64(req, &req.params, "slotsUsed")?.unwrap_or(1),
    )?;
    let ignore = optional_i64(req, &req.params, "entryId")?;

    let settings = load_settings(conn, req)?;
    let existing = db::day_spans(conn, day).map_err(|e| db_failed(req, "db_query_failed", e))?;
    let span = SlotSpan::new(day, period, slots);
    let result = match validate_placement(&span, ignore, &existing, settings.max_periods(day)) {
        Ok(()) => json!({ "valid": true }),
        Err(e) => {
            let conflicting = match &e {
                crate::slots::PlacementError::Conflict { entry_id, .. } => Some(*entry_id),
                _ => None,
            };
            json!({
                "valid": false,
                "code": e.code(),
                "message": e.to_string(),
                "conflictingEntryId": conflicting
            })
        }
    };
    Ok(ok(&req.id, result))
}

/// Period times of `day` plus its entries with their clock span.
pub(crate) fn day_view(
    conn: &Connection,
    req: &Request,
    settings: &DepartmentSettings,
    day: Day,
) -> Result<Value, Value> {
    let periods = match settings.schedule_for(day) {
        Some(schedule) => schedule
            .period_times()
            .map_err(|e| err(&req.id, e.code(), e.to_string(), None))?,
        None => Vec::new(),
    };
    let entries = list_entries(conn, Some(day)).map_err(|e| db_failed(req, "db_query_failed", e))?;

    let items: Vec<Value> = entries
        .iter()
        .map(|e| {
            let mut v = e.to_json();
            let span = settings
                .schedule_for(day)
                .and_then(|s| s.span_times(e.period, e.slots).ok());
            if let Some((start, end)) = span {
                v["startTime"] = json!(format_hhmm(start));
                v["endTime"] = json!(format_hhmm(end));
                v["timeLabel"] = json!(format!("{} - {}", format_12h(start), format_12h(end)));
            }
            v
        })
        .collect();

    Ok(json!({
        "day": day,
        "periods": periods,
        "entries": items
    }))
}

fn handle_day_view(state: &mut AppState, req: &Request) -> Reply {
    let day = required_day(req, &req.params, "day")?;
    let settings = load_settings(&state.db, req)?;
    let view = day_view(&state.db, req, &settings, day)?;
    Ok(ok(&req.id, view))
}

fn handle_for_date(state: &mut AppState, req: &Request) -> Reply {
    let date = required_date(req, &req.params, "date")?;
    let settings = load_settings(&state.db, req)?;
    let iso = calendar::format_iso_date(date);
    let result = match calendar::resolve_date(&settings, date) {
        DateResolution::Holiday => json!({ "date": iso, "status": "holiday" }),
        DateResolution::NoClasses => json!({ "date": iso, "status": "noClasses" }),
        DateResolution::Classes { day, followed } => {
            let view = day_view(&state.db, req, &settings, day)?;
            json!({
                "date": iso,
                "status": "classes",
                "day": day,
                "followed": followed,
                "view": view
            })
        }
    };
    Ok(ok(&req.id, result))
}

/// Monday-first week around `date`; Sunday is left out since it never has classes.
fn handle_for_week(state: &mut AppState, req: &Request) -> Reply {
    let date = required_date(req, &req.params, "date")?;
    let settings = load_settings(&state.db, req)?;

    let mut days = Vec::new();
    for d in calendar::week_of(date).into_iter().take(Day::ALL.len()) {
        let iso = calendar::format_iso_date(d);
        let item = match calendar::resolve_date(&settings, d) {
            DateResolution::Holiday => json!({ "date": iso, "status": "holiday" }),
            DateResolution::NoClasses => json!({ "date": iso, "status": "noClasses" }),
            DateResolution::Classes { day, followed } => {
                let entries = list_entries(&state.db, Some(day))
                    .map_err(|e| db_failed(req, "db_query_failed", e))?;
                let entries: Vec<Value> = entries.iter().map(Entry::to_json).collect();
                json!({
                    "date": iso,
                    "status": "classes",
                    "day": day,
                    "followed": followed,
                    "entries": entries
                })
            }
        };
        days.push(item);
    }
    Ok(ok(&req.id, json!({ "days": days })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "timetable.list" => handle_list(state, req),
        "timetable.get" => handle_get(state, req),
        "timetable.create" => handle_create(state, req),
        "timetable.addBreak" => handle_add_break(state, req),
        "timetable.update" => handle_update(state, req),
        "timetable.move" => handle_move(state, req),
        "timetable.delete" => handle_delete(state, req),
        "timetable.checkPlacement" => handle_check_placement(state, req),
        "timetable.dayView" => handle_day_view(state, req),
        "timetable.forDate" => handle_for_date(state, req),
        "timetable.forWeek" => handle_for_week(state, req),
        _ => return None,
    };
    Some(res.unwrap_or_else(|e| e))
}
