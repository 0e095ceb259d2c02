use serde_json::{json, Value};

use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::timetable::list_entries;
use crate::ipc::helpers::{db_failed, required_day, required_time, Reply};
use crate::ipc::types::{AppState, Request};
use crate::timing::{self, PeriodTime};

fn period_times(state: &AppState, req: &Request) -> Result<Vec<PeriodTime>, Value> {
    let day = required_day(req, &req.params, "day")?;
    let settings = db::load_settings(&state.db).map_err(|e| db_failed(req, "db_query_failed", e))?;
    match settings.schedule_for(day) {
        Some(schedule) => schedule
            .period_times()
            .map_err(|e| err(&req.id, e.code(), e.to_string(), None)),
        None => Ok(Vec::new()),
    }
}

fn handle_times(state: &mut AppState, req: &Request) -> Reply {
    let times = period_times(state, req)?;
    let labelled: Vec<Value> = times
        .iter()
        .map(|t| {
            let mut v = json!(t);
            v["label"] = json!(format!(
                "{} - {}",
                timing::format_12h(t.start),
                timing::format_12h(t.end)
            ));
            v
        })
        .collect();
    Ok(ok(&req.id, json!({ "periods": labelled })))
}

/// Period in progress at `time` on `day`, plus the entry occupying it.
fn handle_current(state: &mut AppState, req: &Request) -> Reply {
    let day = required_day(req, &req.params, "day")?;
    let now = required_time(req, &req.params, "time")?;
    let times = period_times(state, req)?;

    let Some(period) = timing::current_period(&times, now) else {
        return Ok(ok(&req.id, json!({ "period": null, "entry": null })));
    };
    let entries = list_entries(&state.db, Some(day)).map_err(|e| db_failed(req, "db_query_failed", e))?;
    let entry = entries
        .iter()
        .find(|e| e.span().covers(period))
        .map(|e| e.to_json());
    Ok(ok(&req.id, json!({ "period": period, "entry": entry })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "periods.times" => handle_times(state, req),
        "periods.current" => handle_current(state, req),
        _ => return None,
    };
    Some(res.unwrap_or_else(|e| e))
}
