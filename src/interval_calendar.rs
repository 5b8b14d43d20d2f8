// src/interval_calendar.rs
//! The discretised time axis every other stage keys into.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::diagnostics::{code, Diagnostics};
use crate::error::TipPoolError;
use crate::shift_normalizer::ShiftRecord;

pub const DEFAULT_INTERVAL_MINUTES: u32 = 15;
pub const MIN_INTERVAL_MINUTES: u32 = 2;
pub const MAX_INTERVAL_MINUTES: u32 = 60;
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Slot length in minutes. Always within 2..=60 and a divisor of 1440.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct IntervalMinutes(u32);

impl IntervalMinutes {
    /// Returns `None` for anything the grid cannot tile a day with.
    pub fn new(minutes: u32) -> Option<Self> {
        let in_range = (MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&minutes);
        if in_range && MINUTES_PER_DAY % minutes == 0 {
            Some(Self(minutes))
        } else {
            None
        }
    }

    /// Parses an operator-supplied value, substituting the 15 minute default
    /// (with a warning) for anything non-numeric or off-grid.
    pub fn parse_or_default(raw: &str, diagnostics: &mut Diagnostics) -> Self {
        match raw.trim().parse::<u32>().ok().and_then(Self::new) {
            Some(minutes) => minutes,
            None => {
                diagnostics.warning(
                    code::INTERVAL_FALLBACK,
                    format!(
                        "Interval '{}' must be an integer in {}..={} dividing {}; using {} minutes",
                        raw.trim(),
                        MIN_INTERVAL_MINUTES,
                        MAX_INTERVAL_MINUTES,
                        MINUTES_PER_DAY,
                        DEFAULT_INTERVAL_MINUTES
                    ),
                );
                Self::default()
            }
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn duration(self) -> Duration {
        Duration::minutes(i64::from(self.0))
    }

    pub fn slots_per_day(self) -> u32 {
        MINUTES_PER_DAY / self.0
    }
}

impl Default for IntervalMinutes {
    fn default() -> Self {
        Self(DEFAULT_INTERVAL_MINUTES)
    }
}

impl fmt::Display for IntervalMinutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Composite join key shared by transactions, presence and pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SlotKey {
    pub work_date: NaiveDate,
    pub slot_start: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Interval {
    pub work_date: NaiveDate,
    pub slot_start: NaiveDateTime,
    pub slot_end: NaiveDateTime,
}

impl Interval {
    pub fn key(&self) -> SlotKey {
        SlotKey {
            work_date: self.work_date,
            slot_start: self.slot_start,
        }
    }

    /// Half-open overlap: touching at a boundary is not presence.
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        start < self.slot_end && end > self.slot_start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IntervalMode {
    /// Fixed midnight-to-midnight grid shared by everyone on a date.
    #[default]
    CalendarAnchored,
    /// Slots start at each shift's clock-in.
    ShiftAnchored,
}

impl FromStr for IntervalMode {
    type Err = TipPoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "calendar" | "calendar-anchored" | "calendar_anchored" => Ok(Self::CalendarAnchored),
            "shift" | "shift-anchored" | "shift_anchored" => Ok(Self::ShiftAnchored),
            other => Err(TipPoolError::Config(format!(
                "unknown interval mode '{}' (expected 'calendar' or 'shift')",
                other
            ))),
        }
    }
}

/// Floors a timestamp onto the midnight-anchored grid.
pub fn floor_to_slot(timestamp: NaiveDateTime, minutes: IntervalMinutes) -> SlotKey {
    let work_date = timestamp.date();
    let minute_of_day = timestamp.hour() * 60 + timestamp.minute();
    let floored = minute_of_day - minute_of_day % minutes.get();
    SlotKey {
        work_date,
        slot_start: work_date.and_time(NaiveTime::MIN) + Duration::minutes(i64::from(floored)),
    }
}

/// Calendar-anchored grid: `1440 / minutes` contiguous slots per date.
pub fn generate_intervals(
    reference_dates: &BTreeSet<NaiveDate>,
    minutes: IntervalMinutes,
) -> Vec<Interval> {
    let step = minutes.duration();
    let mut intervals =
        Vec::with_capacity(reference_dates.len() * minutes.slots_per_day() as usize);
    for &work_date in reference_dates {
        let mut slot_start = work_date.and_time(NaiveTime::MIN);
        for _ in 0..minutes.slots_per_day() {
            intervals.push(Interval {
                work_date,
                slot_start,
                slot_end: slot_start + step,
            });
            slot_start += step;
        }
    }
    intervals
}

/// Shift-anchored tiling. The last slot is kept whole even when it runs past
/// clock-out, so a shift shorter than one slot still yields exactly one.
pub fn generate_shift_intervals(shift: &ShiftRecord, minutes: IntervalMinutes) -> Vec<Interval> {
    let step = minutes.duration();
    let mut intervals = Vec::new();
    let mut slot_start = shift.clock_in;
    while slot_start < shift.clock_out {
        intervals.push(Interval {
            work_date: shift.work_date,
            slot_start,
            slot_end: slot_start + step,
        });
        slot_start += step;
    }
    intervals
}

/// Extends each shift to the end of its last shift-anchored slot.
pub fn credit_full_intervals(shifts: &[ShiftRecord], minutes: IntervalMinutes) -> Vec<ShiftRecord> {
    shifts
        .iter()
        .map(|shift| {
            let credited_end = generate_shift_intervals(shift, minutes)
                .last()
                .map(|last| last.slot_end)
                .unwrap_or(shift.clock_out);
            ShiftRecord {
                clock_out: credited_end,
                ..shift.clone()
            }
        })
        .collect()
}
