use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimingError {
    PeriodOutOfRange { period: u32, count: u32 },
    PastMidnight { period: u32 },
    ZeroDuration { period: u32 },
    BadTime(String),
}

impl TimingError {
    pub fn code(&self) -> &'static str {
        match self {
            TimingError::PeriodOutOfRange { .. } => "period_out_of_range",
            TimingError::PastMidnight { .. }
            | TimingError::ZeroDuration { .. }
            | TimingError::BadTime(_) => "bad_params",
        }
    }
}

impl fmt::Display for TimingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimingError::PeriodOutOfRange { period, count } => {
                write!(f, "period {period} out of range: must be between 1 and {count}")
            }
            TimingError::PastMidnight { period } => {
                write!(f, "period {period} would end after midnight")
            }
            TimingError::ZeroDuration { period } => {
                write!(f, "period {period} must have a duration of at least 1 minute")
            }
            TimingError::BadTime(raw) => write!(f, "invalid time {raw:?}: expected HH:MM"),
        }
    }
}

impl std::error::Error for TimingError {}

/// `HH:MM` wire format for `NaiveTime` fields.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_hhmm(*t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_hhmm(&raw).map_err(serde::de::Error::custom)
    }
}

pub fn parse_hhmm(raw: &str) -> Result<NaiveTime, TimingError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| TimingError::BadTime(raw.to_string()))
}

pub fn format_hhmm(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Display form used by the student views, e.g. `2:30 PM`.
pub fn format_12h(t: NaiveTime) -> String {
    t.format("%-I:%M %p").to_string()
}

fn minutes_of(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

fn time_at(minutes: u32) -> Option<NaiveTime> {
    if minutes >= MINUTES_PER_DAY {
        return None;
    }
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSlot {
    pub duration: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    #[serde(with = "hhmm")]
    pub first_period_start_time: NaiveTime,
    pub periods: Vec<PeriodSlot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodTime {
    pub period: u32,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    pub duration: u32,
}

impl DaySchedule {
    pub fn new(first_period_start_time: NaiveTime, durations: &[u32]) -> Self {
        Self {
            first_period_start_time,
            periods: durations.iter().map(|&duration| PeriodSlot { duration }).collect(),
        }
    }

    pub fn period_count(&self) -> u32 {
        self.periods.len() as u32
    }

    fn check_period(&self, period: u32) -> Result<(), TimingError> {
        if period < 1 || period > self.period_count() {
            return Err(TimingError::PeriodOutOfRange {
                period,
                count: self.period_count(),
            });
        }
        Ok(())
    }

    /// Minutes since midnight at which `period` starts: the first start time plus the
    /// durations of every earlier period.
    fn start_minutes(&self, period: u32) -> Result<u32, TimingError> {
        self.check_period(period)?;
        let before: u32 = self.periods[..(period - 1) as usize]
            .iter()
            .map(|p| p.duration)
            .sum();
        Ok(minutes_of(self.first_period_start_time) + before)
    }

    pub fn period_start(&self, period: u32) -> Result<NaiveTime, TimingError> {
        let m = self.start_minutes(period)?;
        time_at(m).ok_or(TimingError::PastMidnight { period })
    }

    pub fn period_end(&self, period: u32) -> Result<NaiveTime, TimingError> {
        let m = self.start_minutes(period)? + self.periods[(period - 1) as usize].duration;
        time_at(m).ok_or(TimingError::PastMidnight { period })
    }

    /// Start of `period` through the end of the last period a `slots`-wide entry covers.
    pub fn span_times(&self, period: u32, slots: u32) -> Result<(NaiveTime, NaiveTime), TimingError> {
        let last = period.saturating_add(slots.max(1) - 1);
        Ok((self.period_start(period)?, self.period_end(last)?))
    }

    pub fn period_times(&self) -> Result<Vec<PeriodTime>, TimingError> {
        (1..=self.period_count())
            .map(|period| {
                Ok(PeriodTime {
                    period,
                    start: self.period_start(period)?,
                    end: self.period_end(period)?,
                    duration: self.periods[(period - 1) as usize].duration,
                })
            })
            .collect()
    }

    /// Rejects zero-length periods and days that run past midnight.
    pub fn validate(&self) -> Result<(), TimingError> {
        for (i, p) in self.periods.iter().enumerate() {
            if p.duration == 0 {
                return Err(TimingError::ZeroDuration { period: i as u32 + 1 });
            }
        }
        if self.period_count() > 0 {
            self.period_end(self.period_count())?;
        }
        Ok(())
    }
}

/// Period in progress at `now`. Both ends are inclusive, so at a shared boundary the
/// earlier period wins.
pub fn current_period(times: &[PeriodTime], now: NaiveTime) -> Option<u32> {
    let now = minutes_of(now);
    times
        .iter()
        .find(|t| minutes_of(t.start) <= now && now <= minutes_of(t.end))
        .map(|t| t.period)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    fn weekday() -> DaySchedule {
        DaySchedule::new(at(9, 0), &[50, 50, 20, 50, 50, 60, 50, 50])
    }

    #[test]
    fn period_end_chains_variable_durations() {
        let s = weekday();
        let expected = [
            ((9, 0), (9, 50)),
            ((9, 50), (10, 40)),
            ((10, 40), (11, 0)),
            ((11, 0), (11, 50)),
            ((11, 50), (12, 40)),
            ((12, 40), (13, 40)),
            ((13, 40), (14, 30)),
            ((14, 30), (15, 20)),
        ];
        for (i, (start, end)) in expected.iter().enumerate() {
            let p = i as u32 + 1;
            assert_eq!(s.period_start(p).unwrap(), at(start.0, start.1), "start of {p}");
            assert_eq!(s.period_end(p).unwrap(), at(end.0, end.1), "end of {p}");
        }
        // Each period starts exactly where the previous one ended.
        for p in 2..=s.period_count() {
            assert_eq!(s.period_start(p).unwrap(), s.period_end(p - 1).unwrap());
        }
    }

    #[test]
    fn span_times_cover_multi_slot_entries() {
        let s = weekday();
        assert_eq!(s.span_times(4, 2).unwrap(), (at(11, 0), at(12, 40)));
        assert_eq!(s.span_times(7, 1).unwrap(), (at(13, 40), at(14, 30)));
        assert_eq!(
            s.span_times(8, 2),
            Err(TimingError::PeriodOutOfRange { period: 9, count: 8 })
        );
    }

    #[test]
    fn period_numbers_are_one_based() {
        let s = weekday();
        assert!(matches!(
            s.period_start(0),
            Err(TimingError::PeriodOutOfRange { period: 0, count: 8 })
        ));
        assert!(s.period_end(9).is_err());
        let empty = DaySchedule::new(at(9, 0), &[]);
        assert!(empty.period_times().unwrap().is_empty());
        assert!(empty.validate().is_ok());
    }

    #[test]
    fn span_times_rejects_spans_beyond_the_day() {
        let s = weekday();
        assert_eq!(
            s.span_times(1, u32::MAX),
            Err(TimingError::PeriodOutOfRange { period: u32::MAX, count: 8 })
        );
        assert_eq!(
            s.span_times(u32::MAX, 2),
            Err(TimingError::PeriodOutOfRange { period: u32::MAX, count: 8 })
        );
        assert!(s.span_times(8, 2).is_err());
        assert_eq!(s.span_times(8, 1).unwrap(), (at(14, 30), at(15, 20)));
    }

    #[test]
    fn schedules_past_midnight_are_rejected() {
        let late = DaySchedule::new(at(23, 0), &[50, 50]);
        assert_eq!(late.period_end(1).unwrap(), at(23, 50));
        assert_eq!(late.period_end(2), Err(TimingError::PastMidnight { period: 2 }));
        assert_eq!(late.validate(), Err(TimingError::PastMidnight { period: 2 }));

        let zero = DaySchedule::new(at(9, 0), &[50, 0]);
        assert_eq!(zero.validate(), Err(TimingError::ZeroDuration { period: 2 }));
    }

    #[test]
    fn current_period_prefers_earlier_period_on_boundary() {
        let times = weekday().period_times().unwrap();
        assert_eq!(current_period(&times, at(9, 0)), Some(1));
        assert_eq!(current_period(&times, at(9, 50)), Some(1));
        assert_eq!(current_period(&times, at(9, 51)), Some(2));
        assert_eq!(current_period(&times, at(10, 45)), Some(3));
        assert_eq!(current_period(&times, at(15, 20)), Some(8));
        assert_eq!(current_period(&times, at(8, 59)), None);
        assert_eq!(current_period(&times, at(15, 21)), None);
    }

    #[test]
    fn hhmm_round_trips_through_serde() {
        let s = weekday();
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["firstPeriodStartTime"], "09:00");
        assert_eq!(v["periods"][2]["duration"], 20);
        let back: DaySchedule = serde_json::from_value(v).unwrap();
        assert_eq!(back, s);

        assert!(parse_hhmm("9:5x").is_err());
        assert_eq!(format_12h(at(14, 30)), "2:30 PM");
        assert_eq!(format_12h(at(0, 5)), "12:05 AM");
    }
}
