// src/presence.rs
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::interval_calendar::{Interval, SlotKey};
use crate::role_classifier::{Role, RoleClassifier};
use crate::shift_normalizer::{EmployeeId, ShiftRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceRecord {
    pub work_date: NaiveDate,
    pub slot_start: NaiveDateTime,
    pub slot_end: NaiveDateTime,
    pub present_by_role: BTreeMap<Role, BTreeSet<EmployeeId>>,
}

impl PresenceRecord {
    pub fn key(&self) -> SlotKey {
        SlotKey {
            work_date: self.work_date,
            slot_start: self.slot_start,
        }
    }

    pub fn employees(&self, role: Role) -> impl Iterator<Item = &EmployeeId> {
        self.present_by_role.get(&role).into_iter().flatten()
    }

    pub fn count(&self, role: Role) -> usize {
        self.present_by_role.get(&role).map_or(0, BTreeSet::len)
    }
}

pub type PresenceMap = BTreeMap<SlotKey, PresenceRecord>;

/// Who was on duty in each interval, by role.
///
/// Presence is the half-open overlap `clock_in < slot_end && clock_out > slot_start`.
/// An employee with several overlapping shifts in one slot counts once, under
/// the role of their earliest shift. Intervals nobody covers are left out.
pub fn resolve_presence(
    intervals: &[Interval],
    shifts: &[ShiftRecord],
    classifier: &dyn RoleClassifier,
) -> PresenceMap {
    let mut roles: BTreeMap<(&str, &str), Role> = BTreeMap::new();
    let mut ordered: Vec<&ShiftRecord> = shifts.iter().collect();
    ordered.sort_by_key(|s| (s.clock_in, s.clock_out));

    let mut presence = PresenceMap::new();
    for interval in intervals {
        let mut on_duty: BTreeMap<&str, Role> = BTreeMap::new();
        for shift in ordered
            .iter()
            .take_while(|s| s.clock_in < interval.slot_end)
            .filter(|s| interval.overlaps(s.clock_in, s.clock_out))
        {
            let role = *roles
                .entry((shift.employee_id.as_str(), shift.department.as_str()))
                .or_insert_with(|| classifier.classify(&shift.employee_id, &shift.department));
            on_duty.entry(shift.employee_id.as_str()).or_insert(role);
        }
        if on_duty.is_empty() {
            continue;
        }

        let mut present_by_role: BTreeMap<Role, BTreeSet<EmployeeId>> = BTreeMap::new();
        for (employee, role) in on_duty {
            present_by_role
                .entry(role)
                .or_default()
                .insert(employee.to_string());
        }
        presence.insert(
            interval.key(),
            PresenceRecord {
                work_date: interval.work_date,
                slot_start: interval.slot_start,
                slot_end: interval.slot_end,
                present_by_role,
            },
        );
    }
    presence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval_calendar::{generate_intervals, IntervalMinutes};
    use crate::role_classifier::DepartmentRoleClassifier;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn shift(name: &str, dept: &str, clock_in: &str, clock_out: &str) -> ShiftRecord {
        ShiftRecord {
            employee_id: name.to_string(),
            department: dept.to_string(),
            work_date: dt(clock_in).date(),
            clock_in: dt(clock_in),
            clock_out: dt(clock_out),
        }
    }

    fn day_grid(minutes: u32) -> Vec<Interval> {
        let dates = [dt("2025-02-18 00:00").date()].into_iter().collect();
        generate_intervals(&dates, IntervalMinutes::new(minutes).unwrap())
    }

    fn at<'a>(presence: &'a PresenceMap, slot: &str) -> Option<&'a PresenceRecord> {
        let start = dt(slot);
        presence.get(&SlotKey {
            work_date: start.date(),
            slot_start: start,
        })
    }

    #[test]
    fn partitions_by_role_and_excludes_nobody() {
        let shifts = vec![
            shift("Ana Ruiz", "Server", "2025-02-18 10:00", "2025-02-18 11:00"),
            shift("Ben Cole", "Kitchen", "2025-02-18 10:00", "2025-02-18 11:00"),
            shift("Dana Park", "Owner", "2025-02-18 10:00", "2025-02-18 11:00"),
        ];
        let presence = resolve_presence(&day_grid(15), &shifts, &DepartmentRoleClassifier::new());
        let slot = at(&presence, "2025-02-18 10:15").unwrap();

        assert_eq!(slot.count(Role::FrontOfHouse), 1);
        assert_eq!(slot.count(Role::BackOfHouse), 1);
        assert_eq!(slot.count(Role::Executive), 1);
        assert_eq!(presence.len(), 4);
    }

    #[test]
    fn boundary_touch_is_not_presence() {
        let shifts = vec![shift("Ana Ruiz", "Server", "2025-02-18 10:00", "2025-02-18 10:15")];
        let presence = resolve_presence(&day_grid(15), &shifts, &DepartmentRoleClassifier::new());
        assert!(at(&presence, "2025-02-18 10:00").is_some());
        assert!(at(&presence, "2025-02-18 10:15").is_none());
        assert!(at(&presence, "2025-02-18 09:45").is_none());
    }

    #[test]
    fn partial_overlap_credits_whole_calendar_slot() {
        let shifts = vec![shift("Ana Ruiz", "Server", "2025-02-18 10:10", "2025-02-18 10:20")];
        let presence = resolve_presence(&day_grid(15), &shifts, &DepartmentRoleClassifier::new());
        assert_eq!(at(&presence, "2025-02-18 10:00").unwrap().count(Role::FrontOfHouse), 1);
        assert_eq!(at(&presence, "2025-02-18 10:15").unwrap().count(Role::FrontOfHouse), 1);
    }

    #[test]
    fn overlapping_shifts_count_employee_once() {
        let shifts = vec![
            shift("Ana Ruiz", "Server", "2025-02-18 10:00", "2025-02-18 11:00"),
            shift("Ana Ruiz", "Server", "2025-02-18 10:30", "2025-02-18 12:00"),
        ];
        let presence = resolve_presence(&day_grid(15), &shifts, &DepartmentRoleClassifier::new());
        assert_eq!(at(&presence, "2025-02-18 10:45").unwrap().count(Role::FrontOfHouse), 1);
    }

    #[test]
    fn overnight_shift_reaches_next_day_grid() {
        let shifts = vec![shift("Ana Ruiz", "Bartender", "2025-02-18 22:00", "2025-02-19 01:00")];
        let dates = [dt("2025-02-18 00:00").date(), dt("2025-02-19 00:00").date()]
            .into_iter()
            .collect();
        let grid = generate_intervals(&dates, IntervalMinutes::new(60).unwrap());
        let presence = resolve_presence(&grid, &shifts, &DepartmentRoleClassifier::new());
        assert!(at(&presence, "2025-02-19 00:00").is_some());
        assert!(at(&presence, "2025-02-19 01:00").is_none());
    }
}
