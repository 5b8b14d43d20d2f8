// src/csv_io.rs
//! Reading the time-clock and POS exports, and writing run results.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::allocation::{TipPool, UnallocatedTip};
use crate::diagnostics::Diagnostic;
use crate::error::Result;
use crate::pipeline::TipPoolReport;
use crate::presence::PresenceRecord;
use crate::redistribution::EmployeeDailyShare;
use crate::role_classifier::Role;
use crate::settlement::{ConservationReport, EmployeeFinalTotal};
use crate::shift_normalizer::RawShiftRow;
use crate::transaction_aggregator::RawTransactionRow;

pub const EMPLOYEE_TOTALS_FILE: &str = "employee_totals.csv";
pub const DAILY_SHARES_FILE: &str = "daily_shares.csv";
pub const TIP_POOLS_FILE: &str = "tip_pools.csv";
pub const UNALLOCATED_FILE: &str = "unallocated.csv";
pub const PRESENCE_FILE: &str = "presence.csv";
pub const SUMMARY_FILE: &str = "summary.json";

const SLOT_FORMAT: &str = "%Y-%m-%d %H:%M";

fn deserialize_rows<T: DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

fn is_footer(row: &RawShiftRow) -> bool {
    (row.first_name.is_empty() && row.last_name.is_empty())
        || row.first_name.to_ascii_lowercase().starts_with("total")
}

/// Time-clock exports open with report banners; the data starts at the first
/// line naming both `First Name` and `Last Name`. Blank and total rows at the
/// end are dropped.
pub fn parse_shift_export(text: &str) -> Result<Vec<RawShiftRow>> {
    let header_at = text
        .lines()
        .position(|line| line.contains("First Name") && line.contains("Last Name"))
        .unwrap_or(0);
    let body: String = text
        .lines()
        .skip(header_at)
        .collect::<Vec<_>>()
        .join("\n");

    let rows: Vec<RawShiftRow> = deserialize_rows(&body)?;
    let total = rows.len();
    let rows: Vec<RawShiftRow> = rows.into_iter().filter(|r| !is_footer(r)).collect();
    debug!(
        "Shift export: skipped {} banner lines, {} footer rows",
        header_at,
        total - rows.len()
    );
    Ok(rows)
}

pub fn parse_transaction_export(text: &str) -> Result<Vec<RawTransactionRow>> {
    deserialize_rows(text)
}

pub fn read_shift_rows(path: &Path) -> Result<Vec<RawShiftRow>> {
    parse_shift_export(&fs::read_to_string(path)?)
}

pub fn read_transaction_rows(path: &Path) -> Result<Vec<RawTransactionRow>> {
    parse_transaction_export(&fs::read_to_string(path)?)
}

/// Two decimal places, half away from zero, always printed with both digits.
pub fn money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

// --- Result sink rows ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeTotalRow {
    pub employee: String,
    pub allocated: Decimal,
    pub redistributed: Decimal,
    pub total: Decimal,
}

impl From<&EmployeeFinalTotal> for EmployeeTotalRow {
    fn from(t: &EmployeeFinalTotal) -> Self {
        Self {
            employee: t.employee_id.clone(),
            allocated: money(t.allocated),
            redistributed: money(t.redistributed),
            total: money(t.total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyShareRow {
    pub date: NaiveDate,
    pub employee: String,
    pub allocated: Decimal,
    pub redistributed: Decimal,
    pub total: Decimal,
}

impl From<&EmployeeDailyShare> for DailyShareRow {
    fn from(s: &EmployeeDailyShare) -> Self {
        Self {
            date: s.work_date,
            employee: s.employee_id.clone(),
            allocated: money(s.allocated),
            redistributed: money(s.redistributed),
            total: money(s.total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TipPoolRow {
    pub date: NaiveDate,
    pub slot_start: String,
    pub total_tip: Decimal,
    pub foh_pool: Decimal,
    pub boh_pool: Decimal,
    pub foh_count: usize,
    pub boh_count: usize,
    pub exec_count: usize,
}

impl From<&TipPool> for TipPoolRow {
    fn from(p: &TipPool) -> Self {
        Self {
            date: p.work_date,
            slot_start: p.slot_start.format(SLOT_FORMAT).to_string(),
            total_tip: money(p.total_tip),
            foh_pool: money(p.foh_pool),
            boh_pool: money(p.boh_pool),
            foh_count: p.foh_count,
            boh_count: p.boh_count,
            exec_count: p.exec_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnallocatedRow {
    pub date: NaiveDate,
    pub slot_start: String,
    pub amount: Decimal,
    pub reason: String,
}

impl From<&UnallocatedTip> for UnallocatedRow {
    fn from(u: &UnallocatedTip) -> Self {
        Self {
            date: u.work_date,
            slot_start: u
                .slot_start
                .map(|s: NaiveDateTime| s.format(SLOT_FORMAT).to_string())
                .unwrap_or_default(),
            amount: money(u.amount),
            reason: u.reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceRow {
    pub date: NaiveDate,
    pub slot_start: String,
    pub slot_end: String,
    pub foh: String,
    pub boh: String,
    pub exec: String,
}

impl From<&PresenceRecord> for PresenceRow {
    fn from(p: &PresenceRecord) -> Self {
        let names = |role: Role| p.employees(role).cloned().collect::<Vec<_>>().join("; ");
        Self {
            date: p.work_date,
            slot_start: p.slot_start.format(SLOT_FORMAT).to_string(),
            slot_end: p.slot_end.format(SLOT_FORMAT).to_string(),
            foh: names(Role::FrontOfHouse),
            boh: names(Role::BackOfHouse),
            exec: names(Role::Executive),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary<'a> {
    pub total_tips: Decimal,
    pub total_paid: Decimal,
    pub total_redistributed: Decimal,
    pub conservation: &'a ConservationReport,
    pub employees: usize,
    pub shift_records: usize,
    pub unresolved_shifts: usize,
    pub approved_transactions: usize,
    pub excluded_transactions: usize,
    pub diagnostics: &'a [Diagnostic],
}

impl<'a> From<&'a TipPoolReport> for RunSummary<'a> {
    fn from(report: &'a TipPoolReport) -> Self {
        Self {
            total_tips: money(report.transactions.total_tips()),
            total_paid: money(report.conservation.allocated),
            total_redistributed: money(report.allocation.total_unallocated()),
            conservation: &report.conservation,
            employees: report.totals.len(),
            shift_records: report.shifts.shifts.len(),
            unresolved_shifts: report.shifts.unresolved.len(),
            approved_transactions: report.transactions.approved_rows,
            excluded_transactions: report.transactions.excluded_rows,
            diagnostics: report.diagnostics.entries(),
        }
    }
}

pub fn write_csv<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes every result table plus `summary.json` into `dir`, creating it if needed.
pub fn write_report(dir: &Path, report: &TipPoolReport) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let path = |name: &str| dir.join(name);

    write_csv(
        &path(EMPLOYEE_TOTALS_FILE),
        report.totals.iter().map(EmployeeTotalRow::from),
    )?;
    write_csv(
        &path(DAILY_SHARES_FILE),
        report.daily_shares.iter().map(DailyShareRow::from),
    )?;
    write_csv(
        &path(TIP_POOLS_FILE),
        report.allocation.pools.iter().map(TipPoolRow::from),
    )?;
    write_csv(
        &path(UNALLOCATED_FILE),
        report.allocation.unallocated.iter().map(UnallocatedRow::from),
    )?;
    write_csv(
        &path(PRESENCE_FILE),
        report.presence.values().map(PresenceRow::from),
    )?;
    fs::write(
        path(SUMMARY_FILE),
        serde_json::to_string_pretty(&RunSummary::from(report))?,
    )?;

    let written: Vec<PathBuf> = [
        EMPLOYEE_TOTALS_FILE,
        DAILY_SHARES_FILE,
        TIP_POOLS_FILE,
        UNALLOCATED_FILE,
        PRESENCE_FILE,
        SUMMARY_FILE,
    ]
    .iter()
    .map(|name| path(name))
    .collect();
    info!("Wrote {} result files to {}", written.len(), dir.display());
    Ok(written)
}
