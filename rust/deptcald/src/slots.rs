use std::fmt;

use crate::calendar::Day;

/// Periods `[period, period + slots)` an entry occupies on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSpan {
    pub day: Day,
    pub period: u32,
    pub slots: u32,
}

impl SlotSpan {
    pub fn new(day: Day, period: u32, slots: u32) -> Self {
        Self { day, period, slots }
    }

    /// Exclusive end period, clamped at `u32::MAX`.
    pub fn end_period(&self) -> u32 {
        self.period.saturating_add(self.slots)
    }

    pub fn last_period(&self) -> u32 {
        self.end_period().saturating_sub(1)
    }

    pub fn covers(&self, period: u32) -> bool {
        self.period <= period && period < self.end_period()
    }

    pub fn overlaps(&self, other: &SlotSpan) -> bool {
        self.day == other.day
            && self.period < other.end_period()
            && other.period < self.end_period()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    PeriodOutOfRange { period: u32, max: u32 },
    NoSlots,
    ExceedsDay { last: u32, max: u32 },
    Conflict { entry_id: i64, span: SlotSpan },
}

impl PlacementError {
    pub fn code(&self) -> &'static str {
        match self {
            PlacementError::PeriodOutOfRange { .. } => "period_out_of_range",
            PlacementError::NoSlots => "bad_params",
            PlacementError::ExceedsDay { .. } => "exceeds_day",
            PlacementError::Conflict { .. } => "slot_conflict",
        }
    }
}

impl fmt::Display for PlacementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementError::PeriodOutOfRange { period, max } => {
                write!(f, "invalid period number {period}: must be between 1 and {max}")
            }
            PlacementError::NoSlots => write!(f, "slotsUsed must be at least 1"),
            PlacementError::ExceedsDay { last, max } => write!(
                f,
                "entry duration exceeds available periods: ends at period {last} of {max}"
            ),
            PlacementError::Conflict { entry_id, span } => write!(
                f,
                "entry overlaps with entry {entry_id} ({} periods {}-{})",
                span.day,
                span.period,
                span.last_period()
            ),
        }
    }
}

impl std::error::Error for PlacementError {}

/// Checks that `candidate` fits inside a day of `max_periods` periods and shares no
/// period with any entry in `existing`. The entry being edited (`ignore_id`) is skipped
/// so that it never conflicts with its own old position.
pub fn validate_placement(
    candidate: &SlotSpan,
    ignore_id: Option<i64>,
    existing: &[(i64, SlotSpan)],
    max_periods: u32,
) -> Result<(), PlacementError> {
    if candidate.period < 1 || candidate.period > max_periods {
        return Err(PlacementError::PeriodOutOfRange {
            period: candidate.period,
            max: max_periods,
        });
    }
    if candidate.slots < 1 {
        return Err(PlacementError::NoSlots);
    }
    // period is already within 1..=max_periods here.
    if candidate.slots > max_periods - candidate.period + 1 {
        return Err(PlacementError::ExceedsDay {
            last: candidate.last_period(),
            max: max_periods,
        });
    }
    for (id, span) in existing {
        if Some(*id) == ignore_id {
            continue;
        }
        if candidate.overlaps(span) {
            return Err(PlacementError::Conflict {
                entry_id: *id,
                span: *span,
            });
        }
    }
    Ok(())
}
