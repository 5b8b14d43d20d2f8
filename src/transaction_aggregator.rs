// src/transaction_aggregator.rs
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::diagnostics::{code, Diagnostics};
use crate::error::{Result, TipPoolError};
use crate::interval_calendar::{floor_to_slot, IntervalMinutes, SlotKey};
use crate::timezone::TimezoneConversion;

const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
];

/// One POS export row, as handed over by the transaction pre-processor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTransactionRow {
    #[serde(rename = "Transaction Date", alias = "TransactionTimestamp", default)]
    pub timestamp: String,
    #[serde(rename = "Tip", alias = "TipAmount", default)]
    pub tip_amount: String,
    #[serde(rename = "Approved", alias = "ApprovalFlag", default)]
    pub approval_flag: String,
}

impl RawTransactionRow {
    pub fn is_approved(&self) -> bool {
        self.approval_flag.trim().eq_ignore_ascii_case("yes")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionSlot {
    pub work_date: NaiveDate,
    pub slot_start: NaiveDateTime,
    pub tip_amount: Decimal,
}

impl TransactionSlot {
    pub fn key(&self) -> SlotKey {
        SlotKey {
            work_date: self.work_date,
            slot_start: self.slot_start,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregatedTransactions {
    pub slots: Vec<TransactionSlot>,
    pub approved_rows: usize,
    pub unapproved_rows: usize,
    pub excluded_rows: usize,
    pub diagnostics: Diagnostics,
}

impl AggregatedTransactions {
    pub fn total_tips(&self) -> Decimal {
        self.slots.iter().map(|s| s.tip_amount).sum()
    }
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.naive_local())
        })
        .ok_or_else(|| TipPoolError::InvalidTimestamp(raw.to_string()))
}

/// Accepts `$1,234.50`-style values. Negative or non-numeric amounts are errors.
pub fn parse_tip_amount(raw: &str) -> Result<Decimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    match Decimal::from_str(&cleaned) {
        Ok(amount) if !amount.is_sign_negative() => Ok(amount),
        _ => Err(TipPoolError::InvalidAmount(raw.to_string())),
    }
}

/// Sums approved tips per calendar slot.
///
/// Unapproved rows are dropped silently. Rows with an unreadable amount or
/// timestamp are dropped and reported; they never fall into a default slot.
pub fn aggregate(
    rows: &[RawTransactionRow],
    minutes: IntervalMinutes,
    conversion: Option<&TimezoneConversion>,
) -> AggregatedTransactions {
    let mut out = AggregatedTransactions::default();
    let mut sums: BTreeMap<SlotKey, Decimal> = BTreeMap::new();

    for (index, row) in rows.iter().enumerate() {
        if !row.is_approved() {
            out.unapproved_rows += 1;
            continue;
        }
        out.approved_rows += 1;

        let tip = match parse_tip_amount(&row.tip_amount) {
            Ok(tip) => tip,
            Err(e) => {
                out.excluded_rows += 1;
                out.diagnostics
                    .warning(code::TX_INVALID_AMOUNT, format!("Row {}: {}", index + 1, e));
                continue;
            }
        };

        let local = match parse_timestamp(&row.timestamp) {
            Ok(ts) => ts,
            Err(e) => {
                out.excluded_rows += 1;
                out.diagnostics
                    .warning(code::TX_INVALID_TIMESTAMP, format!("Row {}: {}", index + 1, e));
                continue;
            }
        };

        let converted = match conversion.map(|c| c.apply(local)).transpose() {
            Ok(ts) => ts.unwrap_or(local),
            Err(e) => {
                out.excluded_rows += 1;
                out.diagnostics.warning_on(
                    local.date(),
                    code::TX_NONEXISTENT_LOCAL_TIME,
                    format!("Row {}: {}", index + 1, e),
                );
                continue;
            }
        };

        *sums.entry(floor_to_slot(converted, minutes)).or_default() += tip;
    }

    out.slots = sums
        .into_iter()
        .map(|(key, tip_amount)| TransactionSlot {
            work_date: key.work_date,
            slot_start: key.slot_start,
            tip_amount,
        })
        .collect();

    debug!(
        "Aggregated {} approved transactions into {} slots ({} excluded, {} unapproved)",
        out.approved_rows,
        out.slots.len(),
        out.excluded_rows,
        out.unapproved_rows
    );
    out
}
