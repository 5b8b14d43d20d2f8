// src/settlement.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::allocation::DirectShare;
use crate::error::{Result, TipPoolError};
use crate::redistribution::EmployeeDailyShare;
use crate::shift_normalizer::EmployeeId;
use crate::transaction_aggregator::TransactionSlot;

/// Largest payout-vs-tips difference still accepted, in currency units.
pub const CONSERVATION_TOLERANCE: Decimal = dec!(0.01);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeFinalTotal {
    pub employee_id: EmployeeId,
    pub allocated: Decimal,
    pub redistributed: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConservationReport {
    pub expected: Decimal,
    pub allocated: Decimal,
    pub delta: Decimal,
}

impl ConservationReport {
    pub fn holds(&self) -> bool {
        self.delta.abs() < CONSERVATION_TOLERANCE
    }

    pub fn ensure(&self) -> Result<()> {
        if self.holds() {
            Ok(())
        } else {
            Err(TipPoolError::ConservationViolation {
                allocated: self.allocated,
                expected: self.expected,
                delta: self.delta,
            })
        }
    }
}

#[derive(Default)]
struct Accumulator {
    allocated: Decimal,
    redistributed: Decimal,
}

/// Per employee and work date: direct pool money plus redistributed money.
pub fn daily_shares(
    direct: &[DirectShare],
    redistributed: &[EmployeeDailyShare],
) -> Vec<EmployeeDailyShare> {
    let mut acc: BTreeMap<(NaiveDate, &str), Accumulator> = BTreeMap::new();
    for share in direct {
        acc.entry((share.work_date, share.employee_id.as_str()))
            .or_default()
            .allocated += share.amount;
    }
    for share in redistributed {
        let entry = acc
            .entry((share.work_date, share.employee_id.as_str()))
            .or_default();
        entry.allocated += share.allocated;
        entry.redistributed += share.redistributed;
    }

    acc.into_iter()
        .map(|((work_date, employee), a)| EmployeeDailyShare {
            employee_id: employee.to_string(),
            work_date,
            allocated: a.allocated,
            redistributed: a.redistributed,
            total: a.allocated + a.redistributed,
        })
        .collect()
}

/// Final per-employee totals for the whole period, ordered by employee.
pub fn aggregate_totals(
    direct: &[DirectShare],
    redistributed: &[EmployeeDailyShare],
) -> Vec<EmployeeFinalTotal> {
    let mut acc: BTreeMap<&str, Accumulator> = BTreeMap::new();
    for share in direct {
        acc.entry(share.employee_id.as_str()).or_default().allocated += share.amount;
    }
    for share in redistributed {
        let entry = acc.entry(share.employee_id.as_str()).or_default();
        entry.allocated += share.allocated;
        entry.redistributed += share.redistributed;
    }

    acc.into_iter()
        .map(|(employee, a)| EmployeeFinalTotal {
            employee_id: employee.to_string(),
            allocated: a.allocated,
            redistributed: a.redistributed,
            total: a.allocated + a.redistributed,
        })
        .collect()
}

pub fn conservation(totals: &[EmployeeFinalTotal], slots: &[TransactionSlot]) -> ConservationReport {
    let allocated: Decimal = totals.iter().map(|t| t.total).sum();
    let expected: Decimal = slots.iter().map(|s| s.tip_amount).sum();
    ConservationReport {
        expected,
        allocated,
        delta: allocated - expected,
    }
}

/// Checks that every tip dollar ended up with exactly one employee.
pub fn verify(totals: &[EmployeeFinalTotal], slots: &[TransactionSlot]) -> Result<ConservationReport> {
    let report = conservation(totals, slots);
    report.ensure()?;
    Ok(report)
}
