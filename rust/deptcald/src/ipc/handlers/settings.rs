use chrono::{Datelike, NaiveTime, Weekday};
use serde_json::{json, Value};
use tracing::info;

use crate::calendar::{format_iso_date, Day};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::timetable::list_entries;
use crate::ipc::helpers::{
    bad_params, db_failed, object, optional_bool, optional_i64, optional_str, parse_day,
    reject_unknown_fields, require_admin, required_date, required_day, required_i64,
    required_time, Reply,
};
use crate::ipc::types::{AppState, Request};
use crate::settings::{check_period_minutes, DepartmentSettings, MAX_PERIODS_PER_DAY};
use crate::timing::{format_hhmm, DaySchedule, PeriodSlot};

fn load(state: &AppState, req: &Request) -> Result<DepartmentSettings, Value> {
    db::load_settings(&state.db).map_err(|e| db_failed(req, "db_query_failed", e))
}

fn store(state: &AppState, req: &Request, settings: &DepartmentSettings) -> Result<(), Value> {
    settings.validate().map_err(|m| bad_params(req, m))?;
    db::save_settings(&state.db, settings).map_err(|e| db_failed(req, "db_update_failed", e))
}

fn settings_json(settings: &DepartmentSettings) -> Value {
    json!({ "settings": settings })
}

fn minutes(req: &Request, key: &str, v: i64) -> Result<u32, Value> {
    let m = u32::try_from(v).map_err(|_| bad_params(req, format!("{} must not be negative", key)))?;
    check_period_minutes(m).map_err(|e| bad_params(req, format!("{} {}", key, e)))?;
    Ok(m)
}

/// Rejects a schedule whose last period would run past midnight.
fn check_schedule(req: &Request, day: Day, schedule: &DaySchedule) -> Result<(), Value> {
    schedule.validate().map_err(|e| {
        err(
            &req.id,
            e.code(),
            format!("{}: {}", day, e),
            Some(json!({ "day": day })),
        )
    })
}

fn period_number(req: &Request, schedule: &DaySchedule) -> Result<usize, Value> {
    let n = required_i64(req, &req.params, "periodNumber")?;
    if n < 1 || n > schedule.period_count() as i64 {
        return Err(err(
            &req.id,
            "period_out_of_range",
            format!(
                "invalid period number {}: must be between 1 and {}",
                n,
                schedule.period_count()
            ),
            None,
        ));
    }
    Ok(n as usize)
}

fn handle_get(state: &mut AppState, req: &Request) -> Reply {
    let settings = load(state, req)?;
    Ok(ok(&req.id, settings_json(&settings)))
}

fn handle_update(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let patch = object(req, "patch")?;
    reject_unknown_fields(req, patch, &["showMonday", "defaultPeriodDuration"])?;

    let mut settings = load(state, req)?;
    if let Some(v) = optional_bool(req, patch, "showMonday")? {
        settings.show_monday = v;
    }
    if let Some(v) = optional_i64(req, patch, "defaultPeriodDuration")? {
        settings.default_period_duration = minutes(req, "defaultPeriodDuration", v)?;
    }
    store(state, req, &settings)?;

    info!(
        show_monday = settings.show_monday,
        default_period_duration = settings.default_period_duration,
        "settings updated"
    );
    Ok(ok(&req.id, settings_json(&settings)))
}

fn handle_day_schedule_update(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let day = required_day(req, &req.params, "day")?;
    let start = required_time(req, &req.params, "firstPeriodStartTime")?;

    let mut settings = load(state, req)?;
    let schedule = settings
        .day_schedules
        .entry(day)
        .or_insert_with(|| DaySchedule::new(start, &[]));
    schedule.first_period_start_time = start;
    check_schedule(req, day, schedule)?;
    store(state, req, &settings)?;

    info!(day = %day, start = %format_hhmm(start), "day schedule updated");
    Ok(ok(&req.id, settings_json(&settings)))
}

fn handle_periods_add(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let day = required_day(req, &req.params, "day")?;
    let mut settings = load(state, req)?;
    let duration = match optional_i64(req, &req.params, "duration")? {
        Some(v) => minutes(req, "duration", v)?,
        None => settings.default_period_duration,
    };

    let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default();
    let schedule = settings
        .day_schedules
        .entry(day)
        .or_insert_with(|| DaySchedule::new(nine, &[]));
    if schedule.periods.len() >= MAX_PERIODS_PER_DAY {
        return Err(bad_params(
            req,
            format!("{} already has the maximum of {} periods", day, MAX_PERIODS_PER_DAY),
        ));
    }
    schedule.periods.push(PeriodSlot { duration });
    check_schedule(req, day, schedule)?;
    let added = schedule.period_count();
    store(state, req, &settings)?;

    info!(day = %day, period = added, duration, "period added");
    Ok(ok(
        &req.id,
        json!({ "periodNumber": added, "settings": settings }),
    ))
}

fn handle_periods_update(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let day = required_day(req, &req.params, "day")?;
    let duration = minutes(req, "duration", required_i64(req, &req.params, "duration")?)?;

    let mut settings = load(state, req)?;
    let Some(schedule) = settings.day_schedules.get_mut(&day) else {
        return Err(bad_params(req, format!("{} has no periods", day)));
    };
    let n = period_number(req, schedule)?;
    schedule.periods[n - 1].duration = duration;
    check_schedule(req, day, schedule)?;
    store(state, req, &settings)?;

    info!(day = %day, period = n, duration, "period duration updated");
    Ok(ok(&req.id, settings_json(&settings)))
}

/// Drops a period; entries after it move up one period so they keep their place in
/// the day.
fn handle_periods_remove(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let day = required_day(req, &req.params, "day")?;

    let mut settings = load(state, req)?;
    let Some(schedule) = settings.day_schedules.get_mut(&day) else {
        return Err(bad_params(req, format!("{} has no periods", day)));
    };
    let n = period_number(req, schedule)?;

    let entries =
        list_entries(&state.db, Some(day)).map_err(|e| db_failed(req, "db_query_failed", e))?;
    let occupying: Vec<i64> = entries
        .iter()
        .filter(|e| e.span().covers(n as u32))
        .map(|e| e.id)
        .collect();
    if !occupying.is_empty() {
        return Err(err(
            &req.id,
            "in_use",
            format!("period {} on {} is occupied; move or delete its entries first", n, day),
            Some(json!({ "entryIds": occupying })),
        ));
    }

    schedule.periods.remove(n - 1);
    settings.validate().map_err(|m| bad_params(req, m))?;

    let tx = state
        .db
        .unchecked_transaction()
        .map_err(|e| db_failed(req, "db_tx_failed", e))?;
    let shifted = match tx.execute(
        "UPDATE timetable_entries SET period_number = period_number - 1
         WHERE day = ? AND period_number > ?",
        (day.as_str(), n as i64),
    ) {
        Ok(count) => count,
        Err(e) => {
            let _ = tx.rollback();
            return Err(err(
                &req.id,
                "db_update_failed",
                e.to_string(),
                Some(json!({ "table": "timetable_entries" })),
            ));
        }
    };
    if let Err(e) = db::save_settings(&tx, &settings) {
        let _ = tx.rollback();
        return Err(db_failed(req, "db_update_failed", e));
    }
    tx.commit()
        .map_err(|e| db_failed(req, "db_commit_failed", e))?;

    info!(day = %day, period = n, shifted, "period removed");
    Ok(ok(
        &req.id,
        json!({ "entriesShifted": shifted, "settings": settings }),
    ))
}

fn handle_holidays_add(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let date = required_date(req, &req.params, "date")?;
    let mut settings = load(state, req)?;
    if !settings.holiday_dates.insert(date) {
        return Err(err(
            &req.id,
            "duplicate",
            format!("{} is already a holiday", format_iso_date(date)),
            None,
        ));
    }
    store(state, req, &settings)?;
    info!(date = %date, "holiday added");
    Ok(ok(&req.id, settings_json(&settings)))
}

fn handle_holidays_remove(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let date = required_date(req, &req.params, "date")?;
    let mut settings = load(state, req)?;
    if !settings.holiday_dates.remove(&date) {
        return Err(err(
            &req.id,
            "not_found",
            format!("{} is not a holiday", format_iso_date(date)),
            None,
        ));
    }
    store(state, req, &settings)?;
    info!(date = %date, "holiday removed");
    Ok(ok(&req.id, settings_json(&settings)))
}

fn follows_day(req: &Request, raw: Option<String>) -> Result<Day, Value> {
    let day = match raw {
        Some(raw) => parse_day(req, "followsDay", &raw)?,
        None => Day::Tuesday,
    };
    if day == Day::Monday {
        return Err(bad_params(req, "a working Monday must follow another weekday's timetable"));
    }
    Ok(day)
}

fn handle_working_mondays_add(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let date = required_date(req, &req.params, "date")?;
    if date.weekday() != Weekday::Mon {
        return Err(bad_params(
            req,
            format!("{} is not a Monday", format_iso_date(date)),
        ));
    }
    let day = follows_day(req, optional_str(req, &req.params, "followsDay")?)?;

    let mut settings = load(state, req)?;
    if settings.working_mondays.contains_key(&date) {
        return Err(err(
            &req.id,
            "duplicate",
            format!("{} is already a working Monday", format_iso_date(date)),
            None,
        ));
    }
    settings.working_mondays.insert(date, day);
    store(state, req, &settings)?;

    info!(date = %date, follows = %day, "working Monday added");
    Ok(ok(&req.id, settings_json(&settings)))
}

fn handle_working_mondays_remove(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let date = required_date(req, &req.params, "date")?;
    let mut settings = load(state, req)?;
    if settings.working_mondays.remove(&date).is_none() {
        return Err(err(
            &req.id,
            "not_found",
            format!("{} is not a working Monday", format_iso_date(date)),
            None,
        ));
    }
    store(state, req, &settings)?;
    info!(date = %date, "working Monday removed");
    Ok(ok(&req.id, settings_json(&settings)))
}

fn handle_working_mondays_set_schedule(state: &mut AppState, req: &Request) -> Reply {
    require_admin(state, req)?;
    let date = required_date(req, &req.params, "date")?;
    let raw = optional_str(req, &req.params, "followsDay")?
        .ok_or_else(|| bad_params(req, "missing followsDay"))?;
    let day = follows_day(req, Some(raw))?;

    let mut settings = load(state, req)?;
    let Some(slot) = settings.working_mondays.get_mut(&date) else {
        return Err(err(
            &req.id,
            "not_found",
            format!("{} is not a working Monday", format_iso_date(date)),
            None,
        ));
    };
    *slot = day;
    store(state, req, &settings)?;

    info!(date = %date, follows = %day, "working Monday schedule changed");
    Ok(ok(&req.id, settings_json(&settings)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "settings.get" => handle_get(state, req),
        "settings.update" => handle_update(state, req),
        "settings.daySchedule.update" => handle_day_schedule_update(state, req),
        "settings.periods.add" => handle_periods_add(state, req),
        "settings.periods.update" => handle_periods_update(state, req),
        "settings.periods.remove" => handle_periods_remove(state, req),
        "settings.holidays.add" => handle_holidays_add(state, req),
        "settings.holidays.remove" => handle_holidays_remove(state, req),
        "settings.workingMondays.add" => handle_working_mondays_add(state, req),
        "settings.workingMondays.remove" => handle_working_mondays_remove(state, req),
        "settings.workingMondays.setSchedule" => handle_working_mondays_set_schedule(state, req),
        _ => return None,
    };
    Some(res.unwrap_or_else(|e| e))
}
