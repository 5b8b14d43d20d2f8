// src/pipeline.rs
use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::allocation::{allocate, AllocationOutcome};
use crate::config::TipPoolConfig;
use crate::diagnostics::{code, Diagnostics};
use crate::error::{Result, TipPoolError};
use crate::interval_calendar::{credit_full_intervals, generate_intervals, IntervalMode};
use crate::presence::{resolve_presence, PresenceMap};
use crate::redistribution::{ensure_nothing_stranded, redistribute, EmployeeDailyShare, StrandedFunds};
use crate::role_classifier::RoleClassifier;
use crate::settlement::{
    aggregate_totals, conservation, daily_shares, verify, ConservationReport, EmployeeFinalTotal,
};
use crate::shift_normalizer::{merge_presence, normalize, NormalizedShifts, RawShiftRow, ShiftRecord};
use crate::transaction_aggregator::{aggregate, AggregatedTransactions, RawTransactionRow};

/// Everything one run produced, stage by stage.
#[derive(Debug, Clone)]
pub struct TipPoolReport {
    pub shifts: NormalizedShifts,
    pub transactions: AggregatedTransactions,
    pub presence: PresenceMap,
    pub allocation: AllocationOutcome,
    pub redistributed: Vec<EmployeeDailyShare>,
    pub stranded: Vec<StrandedFunds>,
    pub daily_shares: Vec<EmployeeDailyShare>,
    pub totals: Vec<EmployeeFinalTotal>,
    pub conservation: ConservationReport,
    pub diagnostics: Diagnostics,
}

impl TipPoolReport {
    /// Errors when the payouts must not be used: money was stranded or the
    /// totals do not add back up to the tips taken.
    pub fn ensure_trustworthy(&self) -> Result<()> {
        ensure_nothing_stranded(&self.stranded)?;
        verify(&self.totals, &self.transactions.slots)?;
        Ok(())
    }
}

pub struct TipPoolEngine<'a> {
    config: &'a TipPoolConfig,
    classifier: &'a dyn RoleClassifier,
}

fn span(dates: &BTreeSet<NaiveDate>) -> Option<(NaiveDate, NaiveDate)> {
    Some((*dates.first()?, *dates.last()?))
}

impl<'a> TipPoolEngine<'a> {
    pub fn new(config: &'a TipPoolConfig, classifier: &'a dyn RoleClassifier) -> Self {
        Self { config, classifier }
    }

    /// Shift and transaction dates must overlap. Transaction dates here are
    /// already converted, the same values the slots are keyed on.
    fn check_ranges(
        &self,
        shift_dates: &BTreeSet<NaiveDate>,
        transaction_dates: &BTreeSet<NaiveDate>,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let (Some((shifts_from, shifts_to)), Some((transactions_from, transactions_to))) =
            (span(shift_dates), span(transaction_dates))
        else {
            return Ok(());
        };
        if shifts_to >= transactions_from && transactions_to >= shifts_from {
            return Ok(());
        }

        let error = TipPoolError::MismatchedInputRanges {
            shifts_from,
            shifts_to,
            transactions_from,
            transactions_to,
        };
        if self.config.strict_ranges {
            return Err(error);
        }
        diagnostics.warning(code::RANGE_MISMATCH, error.to_string());
        Ok(())
    }

    /// Presence spans: raw shifts on the calendar grid, or shifts stretched
    /// to the end of their last shift-anchored slot.
    fn presence_spans(&self, shifts: &[ShiftRecord]) -> Vec<ShiftRecord> {
        match self.config.interval_mode {
            IntervalMode::CalendarAnchored => shifts.to_vec(),
            IntervalMode::ShiftAnchored => credit_full_intervals(shifts, self.config.interval_minutes),
        }
    }

    pub fn run(
        &self,
        shift_rows: &[RawShiftRow],
        transaction_rows: &[RawTransactionRow],
    ) -> Result<TipPoolReport> {
        let config = self.config;
        let mut diagnostics = Diagnostics::new();

        let mut shifts = normalize(shift_rows);
        diagnostics.extend(std::mem::take(&mut shifts.diagnostics));
        if config.merge_presence {
            let (merged, absorbed) = merge_presence(&shifts.shifts);
            if absorbed > 0 {
                diagnostics.info(
                    code::SHIFT_MERGED,
                    format!("Merged {} back-to-back shift rows", absorbed),
                );
            }
            shifts.shifts = merged;
        }

        let mut transactions =
            aggregate(transaction_rows, config.interval_minutes, config.timezone.as_ref());
        diagnostics.extend(std::mem::take(&mut transactions.diagnostics));

        let transaction_dates: BTreeSet<NaiveDate> =
            transactions.slots.iter().map(|s| s.work_date).collect();
        self.check_ranges(&shifts.work_dates(), &transaction_dates, &mut diagnostics)?;

        let spans = self.presence_spans(&shifts.shifts);
        let mut grid_dates = transaction_dates;
        for s in &spans {
            grid_dates.insert(s.work_date);
            grid_dates.insert(s.clock_out.date());
        }
        let intervals = generate_intervals(&grid_dates, config.interval_minutes);
        let presence = resolve_presence(&intervals, &spans, self.classifier);
        debug!(
            "Resolved presence for {} of {} intervals",
            presence.len(),
            intervals.len()
        );

        let mut allocation = allocate(
            &transactions.slots,
            &presence,
            config.boh_ratio,
            config.allocation_policy,
        );
        diagnostics.extend(std::mem::take(&mut allocation.diagnostics));

        let mut redistribution = redistribute(&allocation.unallocated, &shifts.day_roster());
        diagnostics.extend(std::mem::take(&mut redistribution.diagnostics));

        let daily = daily_shares(&allocation.shares, &redistribution.shares);
        let totals = aggregate_totals(&allocation.shares, &redistribution.shares);
        let conservation = conservation(&totals, &transactions.slots);

        info!(
            "Allocated {} in tips to {} employees ({} redistributed, delta {})",
            conservation.expected,
            totals.len(),
            allocation.total_unallocated(),
            conservation.delta
        );

        Ok(TipPoolReport {
            shifts,
            transactions,
            presence,
            allocation,
            redistributed: redistribution.shares,
            stranded: redistribution.stranded,
            daily_shares: daily,
            totals,
            conservation,
            diagnostics,
        })
    }
}
