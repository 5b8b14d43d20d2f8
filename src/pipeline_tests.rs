// src/pipeline_tests.rs

#[cfg(test)]
mod tests {
    use crate::allocation::{AllocationPolicy, BohRatio, UnallocatedReason};
    use crate::config::TipPoolConfig;
    use crate::diagnostics::code;
    use crate::error::TipPoolError;
    use crate::interval_calendar::{IntervalMinutes, IntervalMode};
    use crate::pipeline::{TipPoolEngine, TipPoolReport};
    use crate::role_classifier::DepartmentRoleClassifier;
    use crate::settlement::EmployeeFinalTotal;
    use crate::shift_normalizer::RawShiftRow;
    use crate::timezone::TimezoneConversion;
    use crate::transaction_aggregator::RawTransactionRow;
    use chrono::NaiveDateTime;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    // Same-day shift on 2025-02-18 unless the times cross midnight.
    fn shift(name: &str, department: &str, time_in: &str, time_out: &str) -> RawShiftRow {
        let (first, last) = name.split_once(' ').unwrap_or((name, ""));
        RawShiftRow {
            first_name: first.to_string(),
            last_name: last.to_string(),
            department: department.to_string(),
            date_in: "02/18/2025".to_string(),
            time_in: time_in.to_string(),
            date_out: String::new(),
            time_out: time_out.to_string(),
            total_less_break: String::new(),
            out_status: String::new(),
        }
    }

    fn tip(timestamp: &str, amount: &str) -> RawTransactionRow {
        RawTransactionRow {
            timestamp: timestamp.to_string(),
            tip_amount: amount.to_string(),
            approval_flag: "Yes".to_string(),
        }
    }

    fn config(policy: AllocationPolicy) -> TipPoolConfig {
        TipPoolConfig {
            allocation_policy: policy,
            ..Default::default()
        }
    }

    fn run(
        config: &TipPoolConfig,
        shifts: &[RawShiftRow],
        transactions: &[RawTransactionRow],
    ) -> TipPoolReport {
        let classifier = DepartmentRoleClassifier::with_executives(&config.executive_names);
        TipPoolEngine::new(config, &classifier)
            .run(shifts, transactions)
            .expect("run should succeed")
    }

    fn total_for<'a>(report: &'a TipPoolReport, employee: &str) -> Option<&'a EmployeeFinalTotal> {
        report.totals.iter().find(|t| t.employee_id == employee)
    }

    fn basic_day() -> (Vec<RawShiftRow>, Vec<RawTransactionRow>) {
        (
            vec![
                shift("Ana Ruiz", "Server", "10:00", "10:30"),
                shift("Olga Voss", "Owner", "10:00", "10:30"),
            ],
            vec![tip("2025-02-18 10:05:00", "$20.00")],
        )
    }

    #[test]
    fn basic_day_strict_ratio_redistributes_missing_kitchen_share() {
        let (shifts, transactions) = basic_day();
        let report = run(&config(AllocationPolicy::StrictRatio), &shifts, &transactions);

        let ana = total_for(&report, "Ana Ruiz").unwrap();
        let olga = total_for(&report, "Olga Voss").unwrap();
        assert_eq!(ana.allocated, dec!(17.00));
        assert_eq!(ana.redistributed, dec!(1.50));
        assert_eq!(ana.total, dec!(18.50));
        assert_eq!(olga.allocated, Decimal::ZERO);
        assert_eq!(olga.total, dec!(1.50));
        assert_eq!(ana.total + olga.total, dec!(20.00));

        assert_eq!(report.allocation.unallocated.len(), 1);
        assert_eq!(
            report.allocation.unallocated[0].reason,
            UnallocatedReason::NoBackOfHouse
        );
        assert!(report.ensure_trustworthy().is_ok());
    }

    #[test]
    fn basic_day_full_fallback_pays_server_everything() {
        let (shifts, transactions) = basic_day();
        let report = run(&config(AllocationPolicy::FullFallback), &shifts, &transactions);

        assert_eq!(total_for(&report, "Ana Ruiz").unwrap().total, dec!(20.00));
        assert!(total_for(&report, "Olga Voss").is_none());
        assert!(report.allocation.unallocated.is_empty());
        assert_eq!(report.allocation.pools[0].exec_count, 1);
    }

    #[test]
    fn lone_server_keeps_whole_tip() {
        let shifts = vec![shift("Ana Ruiz", "Server", "10:00", "10:30")];
        let transactions = vec![tip("2025-02-18 10:05", "20.00")];
        let report = run(&config(AllocationPolicy::FullFallback), &shifts, &transactions);

        assert_eq!(report.totals.len(), 1);
        assert_eq!(report.totals[0].total, dec!(20.00));
        assert!(report.allocation.unallocated.is_empty());
        assert!(report.redistributed.is_empty());
    }

    #[test]
    fn servers_only_day_shares_evenly() {
        let shifts = vec![
            shift("Ana Ruiz", "Server", "09:00", "12:00"),
            shift("Ben Cole", "Bartender", "09:00", "12:00"),
        ];
        let transactions = vec![
            tip("2025-02-18 09:10", "10.00"),
            tip("2025-02-18 11:40", "6.00"),
        ];
        let report = run(&config(AllocationPolicy::FullFallback), &shifts, &transactions);

        assert_eq!(total_for(&report, "Ana Ruiz").unwrap().total, dec!(8.00));
        assert_eq!(total_for(&report, "Ben Cole").unwrap().total, dec!(8.00));
        assert!(report.allocation.pools.iter().all(|p| p.boh_pool.is_zero()));
    }

    fn busy_day() -> (Vec<RawShiftRow>, Vec<RawTransactionRow>) {
        (
            vec![
                shift("Ana Ruiz", "Server", "10:03", "14:47"),
                shift("Ben Cole", "Server", "11:30", "22:15"),
                shift("Carl Diaz", "Kitchen", "09:00", "15:00"),
                shift("Eve Lang", "Line Cook", "16:00", "23:30"),
                shift("Olga Voss", "General Manager", "08:00", "20:00"),
                shift("Hugo Reyes", "Bar", "21:00", "01:30"),
            ],
            vec![
                tip("2025-02-18 07:15", "4.00"),
                tip("2025-02-18 10:05", "20.00"),
                tip("2025-02-18 10:05", "3.33"),
                tip("2025-02-18 12:59", "17.77"),
                tip("2025-02-18 15:31", "9.99"),
                tip("2025-02-18 16:45", "11.11"),
                tip("2025-02-18 23:50", "7.00"),
                tip("2025-02-19 00:20", "5.55"),
            ],
        )
    }

    #[test]
    fn conservation_holds_across_intervals_ratios_and_policies() {
        let (shifts, transactions) = busy_day();
        for minutes in [2, 5, 10, 15, 20, 30, 60] {
            for ratio in [dec!(0), dec!(0.15), dec!(0.5), dec!(1)] {
                for policy in [AllocationPolicy::FullFallback, AllocationPolicy::StrictRatio] {
                    let config = TipPoolConfig {
                        interval_minutes: IntervalMinutes::new(minutes).unwrap(),
                        boh_ratio: BohRatio::new(ratio).unwrap(),
                        allocation_policy: policy,
                        ..Default::default()
                    };
                    let report = run(&config, &shifts, &transactions);
                    assert_eq!(report.conservation.expected, dec!(78.75));
                    assert!(
                        report.ensure_trustworthy().is_ok(),
                        "{} min, ratio {}, {:?}: {:?}",
                        minutes,
                        ratio,
                        policy,
                        report.conservation
                    );
                }
            }
        }
    }

    #[test]
    fn executives_get_nothing_from_pools() {
        let (shifts, transactions) = busy_day();
        let report = run(&config(AllocationPolicy::FullFallback), &shifts, &transactions);
        let olga = total_for(&report, "Olga Voss").unwrap();
        assert_eq!(olga.allocated, Decimal::ZERO);
        // The 07:15 tip had nobody on duty and is shared over the whole roster.
        assert_eq!(olga.redistributed, dec!(4.00) / dec!(6));
    }

    #[test]
    fn runs_are_repeatable() {
        let (shifts, transactions) = busy_day();
        let config = config(AllocationPolicy::StrictRatio);
        let first = run(&config, &shifts, &transactions);
        let second = run(&config, &shifts, &transactions);
        assert_eq!(first.totals, second.totals);
        assert_eq!(first.daily_shares, second.daily_shares);
        assert_eq!(first.allocation.pools, second.allocation.pools);
    }

    #[test]
    fn shift_crossing_midnight_covers_next_morning_slots() {
        let shifts = vec![shift("Hugo Reyes", "Bar", "22:00", "01:00")];
        let transactions = vec![
            tip("2025-02-18 23:00", "4.00"),
            tip("2025-02-19 00:30", "6.00"),
        ];
        let report = run(&config(AllocationPolicy::FullFallback), &shifts, &transactions);

        let hugo = total_for(&report, "Hugo Reyes").unwrap();
        assert_eq!(hugo.allocated, dec!(10.00));
        assert!(report.allocation.unallocated.is_empty());
    }

    #[test]
    fn midnight_clock_out_does_not_share_next_day_leftovers() {
        let mut ben = shift("Ben Cole", "Server", "10:00", "14:00");
        ben.date_in = "02/19/2025".to_string();
        let shifts = vec![shift("Ana Ruiz", "Server", "18:00", "00:00"), ben];
        let transactions = vec![tip("2025-02-19 03:00", "10.00")];
        let report = run(&config(AllocationPolicy::FullFallback), &shifts, &transactions);

        assert_eq!(report.allocation.unallocated.len(), 1);
        assert_eq!(total_for(&report, "Ben Cole").unwrap().total, dec!(10.00));
        assert!(total_for(&report, "Ana Ruiz").is_none());
    }

    #[test]
    fn disjoint_date_ranges_abort_in_strict_mode() {
        let shifts = vec![shift("Ana Ruiz", "Server", "10:00", "12:00")];
        let transactions = vec![tip("2025-03-10 10:05", "5.00")];
        let config = config(AllocationPolicy::FullFallback);
        let classifier = DepartmentRoleClassifier::new();

        let result = TipPoolEngine::new(&config, &classifier).run(&shifts, &transactions);
        assert!(matches!(
            result,
            Err(TipPoolError::MismatchedInputRanges { .. })
        ));
    }

    #[test]
    fn disjoint_date_ranges_warn_when_lenient() {
        let shifts = vec![shift("Ana Ruiz", "Server", "10:00", "12:00")];
        let transactions = vec![tip("2025-03-10 10:05", "5.00")];
        let config = TipPoolConfig {
            strict_ranges: false,
            ..Default::default()
        };
        let report = run(&config, &shifts, &transactions);

        assert_eq!(report.diagnostics.count(code::RANGE_MISMATCH), 1);
        // Nobody worked 2025-03-10, so the money cannot be paid out.
        assert!(matches!(
            report.ensure_trustworthy(),
            Err(TipPoolError::StrandedFunds { amount, .. }) if amount == dec!(5.00)
        ));
    }

    #[test]
    fn uncovered_day_without_roster_is_stranded() {
        let shifts = vec![shift("Ana Ruiz", "Server", "10:00", "12:00")];
        let transactions = vec![
            tip("2025-02-18 10:30", "5.00"),
            tip("2025-02-19 10:30", "8.00"),
        ];
        let report = run(&config(AllocationPolicy::FullFallback), &shifts, &transactions);

        assert_eq!(report.stranded.len(), 1);
        assert_eq!(report.stranded[0].amount, dec!(8.00));
        assert_eq!(report.diagnostics.count(code::STRANDED_UNALLOCATED), 1);
        assert!(report.ensure_trustworthy().is_err());
    }

    #[test]
    fn zero_tip_on_empty_day_is_listed_but_not_stranded() {
        let shifts = vec![shift("Ana Ruiz", "Server", "10:00", "12:00")];
        let transactions = vec![
            tip("2025-02-18 10:30", "5.00"),
            tip("2025-02-19 10:30", "0.00"),
        ];
        let report = run(&config(AllocationPolicy::FullFallback), &shifts, &transactions);

        let orphans = &report.allocation.unallocated;
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].amount, Decimal::ZERO);
        assert_eq!(orphans[0].reason, UnallocatedReason::NoCoverage);
        assert!(report.stranded.is_empty());
        assert!(report.redistributed.is_empty());
        assert!(report.ensure_trustworthy().is_ok());
    }

    #[test]
    fn tampered_totals_fail_conservation() {
        let (shifts, transactions) = basic_day();
        let mut report = run(&config(AllocationPolicy::FullFallback), &shifts, &transactions);
        report.totals[0].total += dec!(0.50);

        assert!(matches!(
            report.ensure_trustworthy(),
            Err(TipPoolError::ConservationViolation { delta, .. }) if delta == dec!(0.50)
        ));
    }

    #[test]
    fn shift_anchored_mode_credits_whole_slot() {
        let shifts = vec![
            shift("Ana Ruiz", "Server", "10:07", "10:14"),
            shift("Ben Cole", "Server", "08:00", "09:00"),
        ];
        let transactions = vec![tip("2025-02-18 10:16", "10.00")];

        let calendar = run(&config(AllocationPolicy::FullFallback), &shifts, &transactions);
        assert_eq!(total_for(&calendar, "Ana Ruiz").unwrap().total, dec!(5.00));
        assert_eq!(total_for(&calendar, "Ben Cole").unwrap().total, dec!(5.00));

        let config = TipPoolConfig {
            interval_mode: IntervalMode::ShiftAnchored,
            ..Default::default()
        };
        let anchored = run(&config, &shifts, &transactions);
        assert_eq!(total_for(&anchored, "Ana Ruiz").unwrap().total, dec!(10.00));
        assert!(total_for(&anchored, "Ben Cole").is_none());
    }

    #[test]
    fn unresolved_shift_still_shares_redistribution() {
        let mut missed = shift("Dana Park", "Server", "10:00", "");
        missed.out_status = "Missed Punch".to_string();
        let shifts = vec![shift("Ana Ruiz", "Server", "10:00", "11:00"), missed];
        let transactions = vec![tip("2025-02-18 10:05", "10.00")];
        let report = run(&config(AllocationPolicy::StrictRatio), &shifts, &transactions);

        assert_eq!(report.shifts.unresolved.len(), 1);
        assert_eq!(report.diagnostics.count(code::SHIFT_UNRESOLVED_CLOCK_OUT), 1);
        let dana = total_for(&report, "Dana Park").unwrap();
        assert_eq!(dana.allocated, Decimal::ZERO);
        assert_eq!(dana.redistributed, dec!(0.75));
        assert_eq!(total_for(&report, "Ana Ruiz").unwrap().total, dec!(9.25));
    }

    #[test]
    fn missed_punch_with_hours_is_synthesized() {
        let mut missed = shift("Dana Park", "Server", "10:00", "");
        missed.out_status = "Missed Punch".to_string();
        missed.total_less_break = "1.5".to_string();
        let transactions = vec![tip("2025-02-18 11:20", "6.00")];
        let report = run(&config(AllocationPolicy::FullFallback), &[missed], &transactions);

        assert!(report.shifts.unresolved.is_empty());
        assert_eq!(report.diagnostics.count(code::SHIFT_SYNTHESIZED_CLOCK_OUT), 1);
        assert_eq!(total_for(&report, "Dana Park").unwrap().allocated, dec!(6.00));
    }

    #[test]
    fn bad_and_unapproved_rows_are_left_out() {
        let shifts = vec![shift("Ana Ruiz", "Server", "10:00", "11:00")];
        let mut declined = tip("2025-02-18 10:10", "50.00");
        declined.approval_flag = "No".to_string();
        let transactions = vec![
            tip("2025-02-18 10:05", "4.00"),
            tip("2025-02-18 10:06", "four"),
            tip("not a time", "2.00"),
            declined,
        ];
        let report = run(&config(AllocationPolicy::FullFallback), &shifts, &transactions);

        assert_eq!(report.conservation.expected, dec!(4.00));
        assert_eq!(report.transactions.excluded_rows, 2);
        assert_eq!(report.transactions.unapproved_rows, 1);
        assert_eq!(report.diagnostics.count(code::TX_INVALID_AMOUNT), 1);
        assert_eq!(report.diagnostics.count(code::TX_INVALID_TIMESTAMP), 1);
        assert!(report.ensure_trustworthy().is_ok());
    }

    #[test]
    fn transactions_are_converted_before_slotting() {
        let shifts = vec![shift("Ana Ruiz", "Server", "10:00", "10:30")];
        let transactions = vec![tip("2025-02-18 15:05", "10.00")];
        let config = TipPoolConfig {
            timezone: Some(TimezoneConversion::parse("UTC", "America/New_York").unwrap()),
            ..Default::default()
        };
        let report = run(&config, &shifts, &transactions);

        let expected_slot =
            NaiveDateTime::parse_from_str("2025-02-18 10:00", "%Y-%m-%d %H:%M").unwrap();
        assert_eq!(report.allocation.pools[0].slot_start, expected_slot);
        assert_eq!(total_for(&report, "Ana Ruiz").unwrap().allocated, dec!(10.00));
    }

    #[test]
    fn back_to_back_punches_are_merged() {
        let shifts = vec![
            shift("Ana Ruiz", "Server", "10:00", "12:00"),
            shift("Ana Ruiz", "Server", "12:00", "14:00"),
        ];
        let transactions = vec![tip("2025-02-18 12:00", "3.00")];
        let report = run(&config(AllocationPolicy::FullFallback), &shifts, &transactions);

        assert_eq!(report.shifts.shifts.len(), 1);
        assert_eq!(report.diagnostics.count(code::SHIFT_MERGED), 1);
        assert_eq!(total_for(&report, "Ana Ruiz").unwrap().total, dec!(3.00));
    }
}
