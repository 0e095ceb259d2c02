use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};

use crate::calendar::Day;
use crate::settings::{DepartmentSettings, SETTINGS_KEY};
use crate::slots::SlotSpan;

/// The department data lives only for the lifetime of the process.
pub fn open_db() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY,
            register_no TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            department TEXT NOT NULL,
            year INTEGER NOT NULL,
            email TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS faculty(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            department TEXT NOT NULL,
            designation TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id INTEGER PRIMARY KEY,
            subject_code TEXT NOT NULL UNIQUE,
            subject_name TEXT NOT NULL,
            subject_type TEXT NOT NULL,
            faculty_id INTEGER,
            semester INTEGER NOT NULL,
            credits INTEGER NOT NULL,
            department TEXT NOT NULL,
            FOREIGN KEY(faculty_id) REFERENCES faculty(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_entries(
            id INTEGER PRIMARY KEY,
            day TEXT NOT NULL,
            period_number INTEGER NOT NULL,
            slots_used INTEGER NOT NULL,
            subject_id INTEGER,
            faculty_id INTEGER,
            room TEXT NOT NULL DEFAULT '',
            is_elective INTEGER NOT NULL DEFAULT 0,
            is_break INTEGER NOT NULL DEFAULT 0,
            is_lunch INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            FOREIGN KEY(faculty_id) REFERENCES faculty(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_day ON timetable_entries(day, period_number)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exams(
            id INTEGER PRIMARY KEY,
            subject_id INTEGER NOT NULL,
            exam_date TEXT NOT NULL,
            exam_time TEXT NOT NULL,
            exam_group TEXT,
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exams_date ON exams(exam_date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exam_rooms(
            id INTEGER PRIMARY KEY,
            exam_id INTEGER NOT NULL,
            room_name TEXT NOT NULL,
            register_range TEXT NOT NULL,
            FOREIGN KEY(exam_id) REFERENCES exams(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exam_rooms_exam ON exam_rooms(exam_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value_json FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(s) => Ok(Some(
            serde_json::from_str(&s).with_context(|| format!("settings {} is not valid json", key))?,
        )),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// Current department settings, falling back to the built-in defaults when nothing
/// has been stored yet.
pub fn load_settings(conn: &Connection) -> anyhow::Result<DepartmentSettings> {
    match settings_get_json(conn, SETTINGS_KEY)? {
        Some(v) => serde_json::from_value(v).context("stored department settings are malformed"),
        None => Ok(DepartmentSettings::mock()),
    }
}

pub fn save_settings(conn: &Connection, settings: &DepartmentSettings) -> anyhow::Result<()> {
    settings_set_json(conn, SETTINGS_KEY, &serde_json::to_value(settings)?)
}

/// Occupied spans on `day`, keyed by entry id, in period order.
pub fn day_spans(conn: &Connection, day: Day) -> anyhow::Result<Vec<(i64, SlotSpan)>> {
    let mut stmt = conn.prepare(
        "SELECT id, period_number, slots_used
         FROM timetable_entries
         WHERE day = ?
         ORDER BY period_number, id",
    )?;
    let rows = stmt
        .query_map([day.as_str()], |row| {
            let id: i64 = row.get(0)?;
            let period: i64 = row.get(1)?;
            let slots: i64 = row.get(2)?;
            Ok((id, SlotSpan::new(day, period as u32, slots as u32)))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn row_exists(conn: &Connection, table: &str, id: i64) -> anyhow::Result<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    let found: Option<i64> = conn.query_row(&sql, [id], |r| r.get(0)).optional()?;
    Ok(found.is_some())
}

pub fn count_rows(conn: &Connection, table: &str) -> anyhow::Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    Ok(conn.query_row(&sql, [], |r| r.get(0))?)
}
