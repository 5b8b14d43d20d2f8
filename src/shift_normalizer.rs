// src/shift_normalizer.rs
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::diagnostics::{code, Diagnostics, Severity};

/// Punches within this distance of the previous clock-out are treated as continuous.
pub const MERGE_TOLERANCE_MINUTES: i64 = 1;

/// Longest shift accepted; anything longer is treated as a bad clock-out.
pub const MAX_SHIFT_HOURS: i64 = 24;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"];
const TIME_FORMATS: [&str; 4] = ["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M:%S %p"];
const MISSING_MARKERS: [&str; 2] = ["", "-"];

pub type EmployeeId = String;

/// One row of a time-clock export, as handed over by the shift pre-processor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawShiftRow {
    #[serde(rename = "First Name", default)]
    pub first_name: String,
    #[serde(rename = "Last Name", default)]
    pub last_name: String,
    #[serde(rename = "Department", default)]
    pub department: String,
    #[serde(rename = "Date In", default)]
    pub date_in: String,
    #[serde(rename = "Time In", default)]
    pub time_in: String,
    #[serde(rename = "Date Out", default)]
    pub date_out: String,
    #[serde(rename = "Time Out", default)]
    pub time_out: String,
    #[serde(rename = "Total Less Break", alias = "Total-Less-Break-Hours", default)]
    pub total_less_break: String,
    #[serde(rename = "Out Status", default)]
    pub out_status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ShiftRecord {
    pub employee_id: EmployeeId,
    pub department: String,
    pub work_date: NaiveDate,
    pub clock_in: NaiveDateTime,
    pub clock_out: NaiveDateTime,
}

/// A shift whose clock-out could not be resolved. It never enters interval
/// expansion, but its employee still counts as having worked that day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedShift {
    pub employee_id: EmployeeId,
    pub department: String,
    pub work_date: NaiveDate,
    pub clock_in: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedShifts {
    pub shifts: Vec<ShiftRecord>,
    pub unresolved: Vec<UnresolvedShift>,
    pub diagnostics: Diagnostics,
}

impl NormalizedShifts {
    /// Distinct employees per work date, resolved or not. A shift running
    /// past midnight also puts its employee on the clock-out date; clocking
    /// out exactly at midnight does not.
    pub fn day_roster(&self) -> BTreeMap<NaiveDate, BTreeSet<EmployeeId>> {
        let mut roster: BTreeMap<NaiveDate, BTreeSet<EmployeeId>> = BTreeMap::new();
        for shift in &self.shifts {
            roster
                .entry(shift.work_date)
                .or_default()
                .insert(shift.employee_id.clone());
            if shift.clock_out.time() > NaiveTime::MIN {
                roster
                    .entry(shift.clock_out.date())
                    .or_default()
                    .insert(shift.employee_id.clone());
            }
        }
        for shift in &self.unresolved {
            roster
                .entry(shift.work_date)
                .or_default()
                .insert(shift.employee_id.clone());
        }
        roster
    }

    pub fn work_dates(&self) -> BTreeSet<NaiveDate> {
        self.shifts
            .iter()
            .map(|s| s.work_date)
            .chain(self.unresolved.iter().map(|s| s.work_date))
            .collect()
    }
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

pub(crate) fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim().to_ascii_uppercase();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&raw, fmt).ok())
}

fn display_name(row: &RawShiftRow) -> EmployeeId {
    format!("{} {}", row.first_name.trim(), row.last_name.trim())
        .trim()
        .to_string()
}

fn is_missed_punch(row: &RawShiftRow) -> bool {
    MISSING_MARKERS.contains(&row.time_out.trim())
        || row.out_status.to_ascii_lowercase().contains("missed")
}

fn read_clock_out(row: &RawShiftRow, clock_in: NaiveDateTime) -> Option<NaiveDateTime> {
    if is_missed_punch(row) {
        return None;
    }
    let time_out = parse_time(&row.time_out)?;
    match parse_date(&row.date_out) {
        Some(date_out) => Some(date_out.and_time(time_out)),
        None if row.date_out.trim().is_empty() => {
            let same_day = clock_in.date().and_time(time_out);
            // No out-date and an earlier out-time: the shift crossed midnight.
            if same_day < clock_in {
                Some(same_day + Duration::days(1))
            } else {
                Some(same_day)
            }
        }
        None => None,
    }
}

fn synthesize_clock_out(row: &RawShiftRow, clock_in: NaiveDateTime) -> Option<NaiveDateTime> {
    let hours = Decimal::from_str(row.total_less_break.trim()).ok()?;
    if hours > Decimal::from(MAX_SHIFT_HOURS) {
        return None;
    }
    let minutes = (hours * Decimal::from(60)).round().to_i64()?;
    clock_in.checked_add_signed(Duration::try_minutes(minutes)?)
}

/// Turns raw clock rows into typed shift records.
///
/// Rows whose clock-out can neither be read nor synthesised from the
/// elapsed-hours field are reported and kept as [`UnresolvedShift`]s.
/// Rows without a readable date in are dropped with a diagnostic.
pub fn normalize(rows: &[RawShiftRow]) -> NormalizedShifts {
    let mut out = NormalizedShifts::default();

    for (index, row) in rows.iter().enumerate() {
        let employee_id = display_name(row);
        let department = row.department.trim().to_string();

        let Some(work_date) = parse_date(&row.date_in) else {
            out.diagnostics.warning(
                code::SHIFT_INVALID_CLOCK_IN,
                format!(
                    "Row {} ({}): unreadable date in '{}'; row skipped",
                    index + 1,
                    employee_id,
                    row.date_in
                ),
            );
            continue;
        };

        let Some(time_in) = parse_time(&row.time_in) else {
            out.diagnostics.warning_on(
                work_date,
                code::SHIFT_INVALID_CLOCK_IN,
                format!(
                    "Row {} ({}): unreadable time in '{}'",
                    index + 1,
                    employee_id,
                    row.time_in
                ),
            );
            out.unresolved.push(UnresolvedShift {
                employee_id,
                department,
                work_date,
                clock_in: None,
            });
            continue;
        };
        let clock_in = work_date.and_time(time_in);

        let clock_out = match read_clock_out(row, clock_in) {
            Some(clock_out) => Some(clock_out),
            None => {
                let synthesized = synthesize_clock_out(row, clock_in);
                if let Some(clock_out) = synthesized {
                    out.diagnostics.push(
                        Severity::Info,
                        code::SHIFT_SYNTHESIZED_CLOCK_OUT,
                        format!(
                            "{}: clock-out synthesised as {} from {}h",
                            employee_id,
                            clock_out.format("%H:%M"),
                            row.total_less_break.trim()
                        ),
                        Some(work_date),
                    );
                }
                synthesized
            }
        };

        match clock_out {
            Some(clock_out)
                if clock_out > clock_in
                    && clock_out - clock_in <= Duration::hours(MAX_SHIFT_HOURS) =>
            {
                out.shifts.push(ShiftRecord {
                    employee_id,
                    department,
                    work_date,
                    clock_in,
                    clock_out,
                })
            }
            _ => {
                out.diagnostics.warning_on(
                    work_date,
                    code::SHIFT_UNRESOLVED_CLOCK_OUT,
                    format!(
                        "{}: no usable clock-out for shift starting {}",
                        employee_id,
                        clock_in.format("%H:%M")
                    ),
                );
                out.unresolved.push(UnresolvedShift {
                    employee_id,
                    department,
                    work_date,
                    clock_in: Some(clock_in),
                });
            }
        }
    }

    out.shifts.sort();
    debug!(
        "Normalized {} shift rows: {} resolved, {} unresolved",
        rows.len(),
        out.shifts.len(),
        out.unresolved.len()
    );
    out
}

/// Collapses back-to-back punches of the same employee, day and department
/// into one presence range. A change of department starts a new range.
/// Returns the merged shifts and how many rows were absorbed.
pub fn merge_presence(shifts: &[ShiftRecord]) -> (Vec<ShiftRecord>, usize) {
    let tolerance = Duration::minutes(MERGE_TOLERANCE_MINUTES);
    let mut groups: BTreeMap<(&str, NaiveDate, &str), Vec<&ShiftRecord>> = BTreeMap::new();
    for shift in shifts {
        groups
            .entry((
                shift.employee_id.as_str(),
                shift.work_date,
                shift.department.as_str(),
            ))
            .or_default()
            .push(shift);
    }

    let mut merged = Vec::with_capacity(shifts.len());
    let mut absorbed = 0;
    for (_, mut group) in groups {
        group.sort_by_key(|s| (s.clock_in, s.clock_out));
        let mut current = group[0].clone();
        for next in group.into_iter().skip(1) {
            if next.clock_in <= current.clock_out + tolerance {
                current.clock_out = current.clock_out.max(next.clock_out);
                absorbed += 1;
            } else {
                merged.push(std::mem::replace(&mut current, next.clone()));
            }
        }
        merged.push(current);
    }

    merged.sort();
    (merged, absorbed)
}
