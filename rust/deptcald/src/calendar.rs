use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::settings::DepartmentSettings;

/// Days that carry a timetable. Sunday never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Day {
    pub const ALL: [Day; 6] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s) || d.short().eq_ignore_ascii_case(s))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
        }
    }

    pub fn short(self) -> &'static str {
        &self.as_str()[..3]
    }

    pub fn from_weekday(w: Weekday) -> Option<Self> {
        match w {
            Weekday::Mon => Some(Day::Monday),
            Weekday::Tue => Some(Day::Tuesday),
            Weekday::Wed => Some(Day::Wednesday),
            Weekday::Thu => Some(Day::Thursday),
            Weekday::Fri => Some(Day::Friday),
            Weekday::Sat => Some(Day::Saturday),
            Weekday::Sun => None,
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

pub fn format_iso_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateResolution {
    Holiday,
    NoClasses,
    /// `followed` is set when a working Monday borrows another day's timetable.
    Classes { day: Day, followed: bool },
}

/// Which timetable (if any) applies on a calendar date.
pub fn resolve_date(settings: &DepartmentSettings, date: NaiveDate) -> DateResolution {
    if settings.is_holiday(date) {
        return DateResolution::Holiday;
    }
    if let Some(day) = settings.working_mondays.get(&date) {
        return DateResolution::Classes {
            day: *day,
            followed: true,
        };
    }
    match Day::from_weekday(date.weekday()) {
        None => DateResolution::NoClasses,
        Some(Day::Monday) if !settings.show_monday => DateResolution::NoClasses,
        Some(day) => DateResolution::Classes {
            day,
            followed: false,
        },
    }
}

/// First and last day of a month (`month` is 1-based).
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

/// Monday-first week containing `date`.
pub fn week_of(date: NaiveDate) -> [NaiveDate; 7] {
    let monday = date - ChronoDuration::days(date.weekday().num_days_from_monday() as i64);
    std::array::from_fn(|i| monday + ChronoDuration::days(i as i64))
}
