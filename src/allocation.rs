// src/allocation.rs
//! Slot-level tip pooling.
//!
//! Each transaction slot's tips are split between the front-of-house and
//! back-of-house pools, and each pool is divided evenly among the employees of
//! that role on duty in the slot. Executives never draw from a pool. Whatever
//! cannot reach an on-duty employee is returned as an [`UnallocatedTip`] for
//! the day-level redistribution.
//!
//! Two policies share the same code path and differ only when exactly one
//! role is on duty:
//!
//! * [`AllocationPolicy::FullFallback`] (default): the present role takes the
//!   whole slot, nothing is orphaned.
//! * [`AllocationPolicy::StrictRatio`]: the present role keeps its ratio share
//!   and the absent role's share is orphaned, tagged with the missing role.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::diagnostics::{code, Diagnostics};
use crate::error::TipPoolError;
use crate::interval_calendar::SlotKey;
use crate::presence::{PresenceMap, PresenceRecord};
use crate::role_classifier::Role;
use crate::shift_normalizer::EmployeeId;
use crate::transaction_aggregator::TransactionSlot;

pub const DEFAULT_BOH_RATIO: Decimal = dec!(0.15);

/// Back-of-house share of a slot's tips, always within `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BohRatio(Decimal);

impl BohRatio {
    pub fn new(ratio: Decimal) -> Option<Self> {
        if ratio >= Decimal::ZERO && ratio <= Decimal::ONE {
            Some(Self(ratio))
        } else {
            None
        }
    }

    /// Falls back to 0.15 (with a warning) for non-numeric or out-of-range input.
    pub fn parse_or_default(raw: &str, diagnostics: &mut Diagnostics) -> Self {
        match Decimal::from_str(raw.trim()).ok().and_then(Self::new) {
            Some(ratio) => ratio,
            None => {
                diagnostics.warning(
                    code::RATIO_FALLBACK,
                    format!(
                        "BOH ratio '{}' must be a number between 0 and 1; using {}",
                        raw.trim(),
                        DEFAULT_BOH_RATIO
                    ),
                );
                Self::default()
            }
        }
    }

    pub fn get(self) -> Decimal {
        self.0
    }
}

impl Default for BohRatio {
    fn default() -> Self {
        Self(DEFAULT_BOH_RATIO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AllocationPolicy {
    #[default]
    FullFallback,
    StrictRatio,
}

impl FromStr for AllocationPolicy {
    type Err = TipPoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full-fallback" | "full_fallback" | "fallback" => Ok(Self::FullFallback),
            "strict-ratio" | "strict_ratio" | "strict" => Ok(Self::StrictRatio),
            other => Err(TipPoolError::Config(format!(
                "unknown allocation policy '{}' (expected 'full-fallback' or 'strict-ratio')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum UnallocatedReason {
    #[serde(rename = "no coverage")]
    NoCoverage,
    #[serde(rename = "no FOH")]
    NoFrontOfHouse,
    #[serde(rename = "no BOH")]
    NoBackOfHouse,
}

impl fmt::Display for UnallocatedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnallocatedReason::NoCoverage => "no coverage",
            UnallocatedReason::NoFrontOfHouse => "no FOH",
            UnallocatedReason::NoBackOfHouse => "no BOH",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TipPool {
    pub work_date: NaiveDate,
    pub slot_start: NaiveDateTime,
    pub total_tip: Decimal,
    pub foh_pool: Decimal,
    pub boh_pool: Decimal,
    pub foh_count: usize,
    pub boh_count: usize,
    pub exec_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnallocatedTip {
    pub work_date: NaiveDate,
    pub slot_start: Option<NaiveDateTime>,
    pub amount: Decimal,
    pub reason: UnallocatedReason,
}

/// One employee's cut of one slot's pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectShare {
    pub employee_id: EmployeeId,
    pub work_date: NaiveDate,
    pub slot_start: NaiveDateTime,
    pub role: Role,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct AllocationOutcome {
    pub pools: Vec<TipPool>,
    pub unallocated: Vec<UnallocatedTip>,
    pub shares: Vec<DirectShare>,
    pub diagnostics: Diagnostics,
}

impl AllocationOutcome {
    pub fn total_allocated(&self) -> Decimal {
        self.shares.iter().map(|s| s.amount).sum()
    }

    pub fn total_unallocated(&self) -> Decimal {
        self.unallocated.iter().map(|u| u.amount).sum()
    }
}

struct Split {
    foh_pool: Decimal,
    boh_pool: Decimal,
    orphaned: Option<(Decimal, UnallocatedReason)>,
}

fn split_slot(
    total: Decimal,
    foh_count: usize,
    boh_count: usize,
    ratio: BohRatio,
    policy: AllocationPolicy,
) -> Split {
    let boh_share = total * ratio.get();
    // FOH takes the remainder so the two shares always add back to the total.
    let foh_share = total - boh_share;

    match (foh_count > 0, boh_count > 0, policy) {
        (true, true, _) => Split {
            foh_pool: foh_share,
            boh_pool: boh_share,
            orphaned: None,
        },
        (true, false, AllocationPolicy::FullFallback) => Split {
            foh_pool: total,
            boh_pool: Decimal::ZERO,
            orphaned: None,
        },
        (false, true, AllocationPolicy::FullFallback) => Split {
            foh_pool: Decimal::ZERO,
            boh_pool: total,
            orphaned: None,
        },
        (true, false, AllocationPolicy::StrictRatio) => Split {
            foh_pool: foh_share,
            boh_pool: Decimal::ZERO,
            orphaned: Some((boh_share, UnallocatedReason::NoBackOfHouse)),
        },
        (false, true, AllocationPolicy::StrictRatio) => Split {
            foh_pool: Decimal::ZERO,
            boh_pool: boh_share,
            orphaned: Some((foh_share, UnallocatedReason::NoFrontOfHouse)),
        },
        (false, false, _) => Split {
            foh_pool: Decimal::ZERO,
            boh_pool: Decimal::ZERO,
            orphaned: Some((total, UnallocatedReason::NoCoverage)),
        },
    }
}

fn divide_pool(
    pool: Decimal,
    role: Role,
    record: Option<&PresenceRecord>,
    key: SlotKey,
    shares: &mut Vec<DirectShare>,
) {
    let Some(record) = record else {
        return;
    };
    let count = record.count(role);
    if count == 0 {
        return;
    }
    let each = pool / Decimal::from(count);
    for employee in record.employees(role) {
        shares.push(DirectShare {
            employee_id: employee.clone(),
            work_date: key.work_date,
            slot_start: key.slot_start,
            role,
            amount: each,
        });
    }
}

/// Splits every transaction slot into role pools and per-employee shares.
///
/// For each slot, `foh_pool + boh_pool + orphaned == total_tip` exactly.
pub fn allocate(
    slots: &[TransactionSlot],
    presence: &PresenceMap,
    ratio: BohRatio,
    policy: AllocationPolicy,
) -> AllocationOutcome {
    let mut out = AllocationOutcome::default();

    for slot in slots {
        let key = slot.key();
        // No presence record means nobody was on duty.
        let record = presence.get(&key);
        let count = |role| record.map_or(0, |r| r.count(role));
        let foh_count = count(Role::FrontOfHouse);
        let boh_count = count(Role::BackOfHouse);
        let exec_count = count(Role::Executive);

        let split = split_slot(slot.tip_amount, foh_count, boh_count, ratio, policy);
        divide_pool(split.foh_pool, Role::FrontOfHouse, record, key, &mut out.shares);
        divide_pool(split.boh_pool, Role::BackOfHouse, record, key, &mut out.shares);

        if let Some((amount, reason)) = split.orphaned {
            if reason == UnallocatedReason::NoCoverage {
                out.diagnostics.warning_on(
                    key.work_date,
                    code::SLOT_NO_COVERAGE,
                    format!(
                        "{} in tips at {} with no pooled employee on duty",
                        amount,
                        key.slot_start.format("%H:%M")
                    ),
                );
            }
            // A zero strict-ratio share is not an orphan; an uncovered slot always is.
            if !amount.is_zero() || reason == UnallocatedReason::NoCoverage {
                out.unallocated.push(UnallocatedTip {
                    work_date: key.work_date,
                    slot_start: Some(key.slot_start),
                    amount,
                    reason,
                });
            }
        }

        out.pools.push(TipPool {
            work_date: key.work_date,
            slot_start: key.slot_start,
            total_tip: slot.tip_amount,
            foh_pool: split.foh_pool,
            boh_pool: split.boh_pool,
            foh_count,
            boh_count,
            exec_count,
        });
    }

    debug!(
        "Allocated {} slots: {} direct shares, {} unallocated entries",
        out.pools.len(),
        out.shares.len(),
        out.unallocated.len()
    );
    out
}
