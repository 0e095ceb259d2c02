use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;

use crate::calendar::{self, Day};
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::timing;

/// Handler outcome; both arms are complete response envelopes.
pub type Reply = Result<Value, Value>;

pub fn bad_params(req: &Request, message: impl Into<String>) -> Value {
    err(&req.id, "bad_params", message, None)
}

pub fn not_found(req: &Request, what: &str) -> Value {
    err(&req.id, "not_found", format!("{} not found", what), None)
}

pub fn db_failed(req: &Request, code: &str, e: impl std::fmt::Display) -> Value {
    err(&req.id, code, e.to_string(), None)
}

pub fn require_admin(state: &AppState, req: &Request) -> Result<(), Value> {
    if state.admin.is_some() {
        return Ok(());
    }
    Err(err(
        &req.id,
        "unauthorized",
        "admin login required",
        Some(serde_json::json!({ "method": req.method })),
    ))
}

fn present<'a>(obj: &'a Value, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

/// `params[key]` as an object (used for `input` and `patch` payloads).
pub fn object<'a>(req: &'a Request, key: &str) -> Result<&'a Value, Value> {
    match req.params.get(key) {
        Some(v) if v.is_object() => Ok(v),
        Some(_) => Err(bad_params(req, format!("{} must be an object", key))),
        None => Err(bad_params(req, format!("missing {}", key))),
    }
}

pub fn required_str(req: &Request, obj: &Value, key: &str) -> Result<String, Value> {
    match optional_str(req, obj, key)? {
        Some(s) if !s.is_empty() => Ok(s),
        Some(_) => Err(bad_params(req, format!("{} must not be empty", key))),
        None => Err(bad_params(req, format!("missing {}", key))),
    }
}

pub fn optional_str(req: &Request, obj: &Value, key: &str) -> Result<Option<String>, Value> {
    match present(obj, key) {
        None => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.trim().to_string()))
            .ok_or_else(|| bad_params(req, format!("{} must be string", key))),
    }
}

pub fn optional_i64(req: &Request, obj: &Value, key: &str) -> Result<Option<i64>, Value> {
    match present(obj, key) {
        None => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| bad_params(req, format!("{} must be integer", key))),
    }
}

pub fn required_i64(req: &Request, obj: &Value, key: &str) -> Result<i64, Value> {
    optional_i64(req, obj, key)?.ok_or_else(|| bad_params(req, format!("missing {}", key)))
}

pub fn optional_bool(req: &Request, obj: &Value, key: &str) -> Result<Option<bool>, Value> {
    match present(obj, key) {
        None => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| bad_params(req, format!("{} must be boolean", key))),
    }
}

/// Distinguishes an absent key (`None`) from an explicit `null` (`Some(None)`).
pub fn nullable_i64(req: &Request, obj: &Value, key: &str) -> Result<Option<Option<i64>>, Value> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(Some(None)),
        Some(v) => v
            .as_i64()
            .map(|n| Some(Some(n)))
            .ok_or_else(|| bad_params(req, format!("{} must be integer or null", key))),
    }
}

pub fn in_range(req: &Request, key: &str, v: i64, min: i64, max: i64) -> Result<i64, Value> {
    if !(min..=max).contains(&v) {
        return Err(bad_params(req, format!("{} must be in {}..={}", key, min, max)));
    }
    Ok(v)
}

pub fn parse_day(req: &Request, key: &str, raw: &str) -> Result<Day, Value> {
    Day::parse(raw).ok_or_else(|| {
        bad_params(
            req,
            format!("{} must be one of: Monday, Tuesday, Wednesday, Thursday, Friday, Saturday", key),
        )
    })
}

pub fn required_day(req: &Request, obj: &Value, key: &str) -> Result<Day, Value> {
    let raw = required_str(req, obj, key)?;
    parse_day(req, key, &raw)
}

pub fn parse_date(req: &Request, key: &str, raw: &str) -> Result<NaiveDate, Value> {
    calendar::parse_iso_date(raw)
        .ok_or_else(|| bad_params(req, format!("{} must be a YYYY-MM-DD date", key)))
}

pub fn required_date(req: &Request, obj: &Value, key: &str) -> Result<NaiveDate, Value> {
    let raw = required_str(req, obj, key)?;
    parse_date(req, key, &raw)
}

pub fn parse_time(req: &Request, key: &str, raw: &str) -> Result<NaiveTime, Value> {
    timing::parse_hhmm(raw).map_err(|e| bad_params(req, format!("{}: {}", key, e)))
}

pub fn required_time(req: &Request, obj: &Value, key: &str) -> Result<NaiveTime, Value> {
    let raw = required_str(req, obj, key)?;
    parse_time(req, key, &raw)
}

pub fn reject_unknown_fields(req: &Request, obj: &Value, allowed: &[&str]) -> Result<(), Value> {
    if let Some(map) = obj.as_object() {
        if let Some(k) = map.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(bad_params(req, format!("unknown field: {}", k)));
        }
    }
    Ok(())
}
