// src/redistribution.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::allocation::UnallocatedTip;
use crate::diagnostics::{code, Diagnostics};
use crate::error::{Result, TipPoolError};
use crate::shift_normalizer::EmployeeId;

pub type DayRoster = BTreeMap<NaiveDate, BTreeSet<EmployeeId>>;

/// One employee's money for one work date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeDailyShare {
    pub employee_id: EmployeeId,
    pub work_date: NaiveDate,
    pub allocated: Decimal,
    pub redistributed: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrandedFunds {
    pub work_date: NaiveDate,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct RedistributionOutcome {
    pub shares: Vec<EmployeeDailyShare>,
    pub stranded: Vec<StrandedFunds>,
    pub diagnostics: Diagnostics,
}

/// Fails on the first day whose unallocated money had nobody to go to.
pub fn ensure_nothing_stranded(stranded: &[StrandedFunds]) -> Result<()> {
    match stranded.first() {
        Some(s) => Err(TipPoolError::StrandedFunds {
            date: s.work_date,
            amount: s.amount,
        }),
        None => Ok(()),
    }
}

/// Spreads each day's unallocated total evenly over everyone who worked that
/// day, whatever their role. Days with no roster are reported as stranded;
/// days that sum to zero have nothing to spread and are skipped.
pub fn redistribute(unallocated: &[UnallocatedTip], roster: &DayRoster) -> RedistributionOutcome {
    let mut per_day: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for tip in unallocated {
        *per_day.entry(tip.work_date).or_default() += tip.amount;
    }

    let mut out = RedistributionOutcome::default();
    for (work_date, amount) in per_day {
        if amount.is_zero() {
            continue;
        }
        let employees = roster.get(&work_date).filter(|e| !e.is_empty());
        let Some(employees) = employees else {
            out.diagnostics.error_on(
                work_date,
                code::STRANDED_UNALLOCATED,
                format!("{} unallocated with no employee on the roster", amount),
            );
            out.stranded.push(StrandedFunds { work_date, amount });
            continue;
        };

        let each = amount / Decimal::from(employees.len());
        debug!(
            "Redistributing {} on {} across {} employees ({} each)",
            amount,
            work_date,
            employees.len(),
            each
        );
        for employee in employees {
            out.shares.push(EmployeeDailyShare {
                employee_id: employee.clone(),
                work_date,
                allocated: Decimal::ZERO,
                redistributed: each,
                total: each,
            });
        }
    }
    out
}
