use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::calendar::Day;
use crate::timing::DaySchedule;

pub const SETTINGS_KEY: &str = "department.settings";

pub const MIN_PERIOD_MINUTES: u32 = 5;
pub const MAX_PERIOD_MINUTES: u32 = 240;
pub const MAX_PERIODS_PER_DAY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentSettings {
    pub show_monday: bool,
    pub default_period_duration: u32,
    #[serde(default)]
    pub holiday_dates: BTreeSet<NaiveDate>,
    /// Working Monday date -> weekday whose timetable it follows.
    #[serde(default)]
    pub working_mondays: BTreeMap<NaiveDate, Day>,
    pub day_schedules: BTreeMap<Day, DaySchedule>,
}

impl DepartmentSettings {
    /// Settings used before any admin edits: periods from 09:00 where period 3 is the
    /// 20-minute break and period 6 the hour-long lunch; Saturday stops after period 5.
    pub fn mock() -> Self {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default();
        let weekday = DaySchedule::new(nine, &[50, 50, 20, 50, 50, 60, 50, 50]);
        let saturday = DaySchedule::new(nine, &[50, 50, 20, 50, 50]);
        let mut day_schedules = BTreeMap::new();
        for day in Day::ALL {
            let schedule = if day == Day::Saturday {
                saturday.clone()
            } else {
                weekday.clone()
            };
            day_schedules.insert(day, schedule);
        }
        let holiday_dates = [(2025, 5, 1), (2025, 5, 15), (2025, 6, 15)]
            .into_iter()
            .filter_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
            .collect();
        Self {
            show_monday: true,
            default_period_duration: 50,
            holiday_dates,
            working_mondays: BTreeMap::new(),
            day_schedules,
        }
    }

    pub fn schedule_for(&self, day: Day) -> Option<&DaySchedule> {
        self.day_schedules.get(&day)
    }

    /// Number of periods on `day`; days without a schedule have none.
    pub fn max_periods(&self, day: Day) -> u32 {
        self.schedule_for(day).map(|s| s.period_count()).unwrap_or(0)
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holiday_dates.contains(&date)
    }

    pub fn validate(&self) -> Result<(), String> {
        check_period_minutes(self.default_period_duration)
            .map_err(|m| format!("defaultPeriodDuration {}", m))?;
        for (day, schedule) in &self.day_schedules {
            if schedule.periods.len() > MAX_PERIODS_PER_DAY {
                return Err(format!(
                    "{} has more than {} periods",
                    day, MAX_PERIODS_PER_DAY
                ));
            }
            for p in &schedule.periods {
                check_period_minutes(p.duration)
                    .map_err(|m| format!("{} period duration {}", day, m))?;
            }
            schedule
                .validate()
                .map_err(|e| format!("{}: {}", day, e))?;
        }
        for (date, day) in &self.working_mondays {
            if date.weekday() != Weekday::Mon {
                return Err(format!("working Monday {} is not a Monday", date));
            }
            if *day == Day::Monday {
                return Err(format!("working Monday {} must follow another weekday", date));
            }
        }
        Ok(())
    }
}

pub fn check_period_minutes(minutes: u32) -> Result<(), String> {
    if !(MIN_PERIOD_MINUTES..=MAX_PERIOD_MINUTES).contains(&minutes) {
        return Err(format!(
            "must be in {}..={} minutes",
            MIN_PERIOD_MINUTES, MAX_PERIOD_MINUTES
        ));
    }
    Ok(())
}
