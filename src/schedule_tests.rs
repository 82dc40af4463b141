// src/schedule_tests.rs

#[cfg(test)]
mod tests {
    use crate::assignments::*;
    use crate::calendar_grid::*;
    use crate::hr_api::{AssignmentEmployee, AssignmentRecord};
    use crate::shift_catalog::{catalog, ShiftKind};
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .unwrap_or_else(|_| panic!("Invalid date string format: {}", date_str))
    }

    fn m(year: i32, month: u32) -> ScheduleMonth {
        ScheduleMonth::new(year, month)
            .unwrap_or_else(|| panic!("Invalid month: {}-{}", year, month))
    }

    // Helper function to create a raw assignment record
    fn record(
        id: &str,
        date: &str,
        shift: &str,
        employee: Option<(&str, &str)>,
    ) -> AssignmentRecord {
        AssignmentRecord {
            id: id.to_string(),
            date: date.to_string(),
            shift_type: shift.to_string(),
            employee: employee.map(|(id, name)| AssignmentEmployee {
                id: id.to_string(),
                name: name.to_string(),
            }),
        }
    }

    fn ids(raw: &[&str]) -> BTreeSet<EmployeeId> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    // --- Shift Catalog ---

    #[test]
    fn catalog_has_three_ordered_shifts() {
        assert_eq!(ShiftKind::ALL.len(), 3);
        assert_eq!(
            ShiftKind::ALL,
            [
                ShiftKind::Morning,
                ShiftKind::Intermediate,
                ShiftKind::Night
            ]
        );

        let entries = catalog();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].label, "Morning");
        assert_eq!(entries[1].label, "Intermediate");
        assert_eq!(entries[2].label, "Night");

        let style_keys: BTreeSet<&str> = entries.iter().map(|e| e.style_key).collect();
        assert_eq!(style_keys.len(), 3, "Style keys must be distinct");
    }

    #[test]
    fn shift_labels_resolve_exactly() {
        for kind in ShiftKind::ALL {
            assert_eq!(ShiftKind::from_label(kind.label()), Some(kind));
        }
        assert_eq!(ShiftKind::from_label("Dawn"), None);
        assert_eq!(
            ShiftKind::from_label("morning"),
            None,
            "Label matching is case-sensitive"
        );
        assert_eq!(ShiftKind::from_label(""), None);
    }

    // --- Calendar Grid ---

    #[test]
    fn grid_always_has_42_cells() {
        let months = [
            m(2025, 3),
            m(2025, 2),
            m(2024, 2), // leap February
            m(2025, 9), // starts on a Monday
            m(2025, 12),
            m(2026, 1),
        ];
        let empty = ScheduleIndex::default();

        for month in months {
            let grid = build_month_grid(month, &empty);
            assert_eq!(grid.len(), GRID_CELLS, "Grid for {} must be 6 weeks", month);

            let current_count = grid.iter().filter(|day| day.in_target_month).count();
            assert_eq!(
                current_count,
                month.days_in_month() as usize,
                "Current-month cell count for {} must match its length",
                month
            );
        }
    }

    #[test]
    fn grid_days_are_consecutive() {
        let grid = build_month_grid(m(2025, 3), &ScheduleIndex::default());
        for pair in grid.windows(2) {
            assert_eq!(
                pair[1].date,
                pair[0].date.succ_opt().unwrap(),
                "Grid dates must ascend one day at a time"
            );
        }
    }

    #[test]
    fn march_2025_grid_pads_with_february_and_april() {
        // March 1, 2025 is a Saturday: five leading cells, Feb 24-28.
        let grid = build_month_grid(m(2025, 3), &ScheduleIndex::default());

        for (offset, day) in grid[..5].iter().enumerate() {
            assert_eq!(
                day.date,
                d("2025-02-24") + chrono::Duration::days(offset as i64)
            );
            assert!(!day.in_target_month);
        }
        assert_eq!(grid[0].date, d("2025-02-24"));
        assert_eq!(grid[4].date, d("2025-02-28"));
        assert_eq!(grid[5].date, d("2025-03-01"));
        assert!(grid[5].in_target_month);
        assert_eq!(grid[35].date, d("2025-03-31"));
        assert!(grid[35].in_target_month);

        let current_count = grid.iter().filter(|day| day.in_target_month).count();
        assert_eq!(current_count, 31);

        for (offset, day) in grid[36..].iter().enumerate() {
            assert_eq!(day.date, d("2025-04-01") + chrono::Duration::days(offset as i64));
            assert!(!day.in_target_month);
        }
        assert_eq!(grid[41].date, d("2025-04-06"));
    }

    #[test]
    fn month_starting_on_monday_has_no_leading_padding() {
        // September 1, 2025 is a Monday.
        let grid = build_month_grid(m(2025, 9), &ScheduleIndex::default());
        assert_eq!(grid[0].date, d("2025-09-01"));
        assert!(grid[0].in_target_month);
        assert_eq!(grid[29].date, d("2025-09-30"));
        assert_eq!(grid[30].date, d("2025-10-01"));
        assert!(!grid[30].in_target_month);
        assert_eq!(grid[41].date, d("2025-10-12"));
    }

    #[test]
    fn leading_padding_counts_back_from_previous_month_end() {
        // May 1, 2025 is a Thursday: three leading cells.
        let month = m(2025, 5);
        let grid = build_month_grid(month, &ScheduleIndex::default());
        let leading: Vec<NaiveDate> = grid
            .iter()
            .take_while(|day| !day.in_target_month)
            .map(|day| day.date)
            .collect();

        assert_eq!(leading, vec![d("2025-04-28"), d("2025-04-29"), d("2025-04-30")]);
        assert_eq!(
            *leading.last().unwrap(),
            month.prev().last_day(),
            "Leading padding must end at the previous month's final day"
        );
    }

    #[test]
    fn grid_embeds_day_assignments() {
        let records = vec![
            record("a1", "2025-03-10", "Morning", Some(("7", "Carol"))),
            record("a2", "2025-03-10", "Night", Some(("3", "Ann"))),
        ];
        let index = aggregate(&records);
        let grid = build_month_grid(m(2025, 3), &index);

        let day = grid
            .iter()
            .find(|day| day.date == d("2025-03-10"))
            .expect("2025-03-10 must be in the March grid");
        assert_eq!(day.shifts.len(), 2);
        assert_eq!(day.shifts[&ShiftKind::Morning][0].employee.name, "Carol");
        assert_eq!(day.shifts[&ShiftKind::Night][0].employee.name, "Ann");

        let other = grid
            .iter()
            .find(|day| day.date == d("2025-03-11"))
            .expect("2025-03-11 must be in the March grid");
        assert!(other.shifts.is_empty());
    }

    #[test]
    fn month_arithmetic_wraps_year_boundaries() {
        assert_eq!(m(2025, 12).next(), m(2026, 1));
        assert_eq!(m(2026, 1).prev(), m(2025, 12));
        assert_eq!(m(2025, 3).first_day(), d("2025-03-01"));
        assert_eq!(m(2025, 3).last_day(), d("2025-03-31"));
        assert_eq!(m(2024, 2).last_day(), d("2024-02-29"));
        assert_eq!(ScheduleMonth::new(2025, 13), None);
        assert_eq!(ScheduleMonth::new(2025, 0), None);
        assert_eq!(ScheduleMonth::from_date(d("2025-03-10")), m(2025, 3));
    }

    #[test]
    fn years_outside_the_accepted_range_are_rejected() {
        assert_eq!(ScheduleMonth::new(MIN_YEAR - 1, 6), None);
        assert_eq!(ScheduleMonth::new(MAX_YEAR + 1, 1), None);
        assert_eq!(ScheduleMonth::new(262142, 12), None);
        assert_eq!(ScheduleMonth::new(-4000, 3), None);
        assert!(ScheduleMonth::new(MIN_YEAR, 1).is_some());
        assert!(ScheduleMonth::new(MAX_YEAR, 12).is_some());
    }

    #[test]
    fn grid_stays_total_at_the_accepted_year_bounds() {
        let empty = ScheduleIndex::default();
        for month in [m(MIN_YEAR, 1), m(MAX_YEAR, 12)] {
            let grid = build_month_grid(month, &empty);
            assert_eq!(grid.len(), GRID_CELLS, "Grid for {} must be 6 weeks", month);
            for pair in grid.windows(2) {
                assert_eq!(
                    pair[1].date,
                    pair[0].date.succ_opt().unwrap(),
                    "Grid dates for {} must ascend one day at a time",
                    month
                );
            }
            let current_count = grid.iter().filter(|day| day.in_target_month).count();
            assert_eq!(
                current_count, 31,
                "Both boundary months are 31 days long"
            );
        }

        assert_eq!(m(MAX_YEAR, 12).last_day(), d("9999-12-31"));
        assert_eq!(m(MAX_YEAR, 12).days_in_month(), 31);
        assert_eq!(m(MIN_YEAR, 1).first_day(), d("0001-01-01"));
    }

    // --- Assignment Aggregation ---

    #[test]
    fn aggregation_counts_every_well_formed_record() {
        let records = vec![
            record("a1", "2025-03-03", "Morning", Some(("1", "Ann"))),
            record("a2", "2025-03-03", "Morning", Some(("2", "Ben"))),
            record("a3", "2025-03-03", "Night", Some(("3", "Carol"))),
            record("a4", "2025-03-04", "Intermediate", Some(("1", "Ann"))),
            record("a5", "2025-03-05", "Night", Some(("4", "Dana"))),
        ];
        let index = aggregate(&records);

        assert_eq!(index.entry_count(), 5);
        assert_eq!(index.skipped(), 0);

        let march3 = index.shifts_on(d("2025-03-03"));
        assert_eq!(march3[&ShiftKind::Morning].len(), 2);
        assert_eq!(march3[&ShiftKind::Night].len(), 1);
        assert_eq!(
            march3[&ShiftKind::Morning][0].assignment_id, "a1",
            "Bucket order must follow input order"
        );
        assert_eq!(march3[&ShiftKind::Morning][1].assignment_id, "a2");

        assert_eq!(index.assigned_on(d("2025-03-03")), Some(&ids(&["1", "2", "3"])));
        assert_eq!(index.assigned_on(d("2025-03-04")), Some(&ids(&["1"])));
        assert_eq!(index.assigned_on(d("2025-03-06")), None);
    }

    #[test]
    fn same_employee_on_two_shifts_indexes_once() {
        let records = vec![
            record("a1", "2025-03-10", "Morning", Some(("7", "Carol"))),
            record("a2", "2025-03-10", "Night", Some(("7", "Carol"))),
        ];
        let index = aggregate(&records);

        let assigned = index
            .assigned_on(d("2025-03-10"))
            .expect("Date must be indexed");
        assert_eq!(assigned.len(), 1, "Employee index is a set, not a list");
        assert!(assigned.contains("7"));

        let shifts = index.shifts_on(d("2025-03-10"));
        assert_eq!(shifts.len(), 2, "Both shift buckets must exist");
        assert_eq!(shifts[&ShiftKind::Morning].len(), 1);
        assert_eq!(shifts[&ShiftKind::Night].len(), 1);
        assert_eq!(index.entry_count(), 2);
    }

    #[test]
    fn malformed_records_are_dropped_not_fatal() {
        let records = vec![
            record("a1", "2025-03-10", "Morning", Some(("1", "Ann"))),
            record("a2", "2025-03-10", "Morning", None), // no employee
            record("a3", "2025-13-45", "Morning", Some(("2", "Ben"))), // bad date
            record("a4", "March 10", "Night", Some(("3", "Carol"))), // bad date format
            record("a5", "2025-03-10", "Dusk", Some(("4", "Dana"))), // unknown shift
        ];
        let index = aggregate(&records);

        assert_eq!(index.entry_count(), 1);
        assert_eq!(index.skipped(), 4);
        assert_eq!(index.assigned_on(d("2025-03-10")), Some(&ids(&["1"])));
    }

    #[test]
    fn duplicate_records_are_each_kept_once() {
        // Two distinct records for the same employee and shift: both are
        // aggregated, neither is merged away.
        let records = vec![
            record("a1", "2025-03-10", "Morning", Some(("7", "Carol"))),
            record("a2", "2025-03-10", "Morning", Some(("7", "Carol"))),
        ];
        let index = aggregate(&records);

        assert_eq!(index.entry_count(), 2);
        let shifts = index.shifts_on(d("2025-03-10"));
        assert_eq!(shifts[&ShiftKind::Morning].len(), 2);
        assert_eq!(
            index.assigned_on(d("2025-03-10")).map(|s| s.len()),
            Some(1)
        );
    }

    #[test]
    fn empty_input_aggregates_to_empty_index() {
        let index = aggregate(&[]);
        assert_eq!(index.entry_count(), 0);
        assert_eq!(index.skipped(), 0);
        assert!(index.shifts_on(d("2025-03-10")).is_empty());
    }

    // --- Conflict Guard ---

    #[test]
    fn conflicts_return_only_overlapping_ids() {
        let records = vec![record("a1", "2025-03-10", "Morning", Some(("7", "Carol")))];
        let index = aggregate(&records);

        let conflicts = check_conflicts(d("2025-03-10"), &ids(&["3", "7"]), &index);
        assert_eq!(conflicts, ids(&["7"]));

        let clean = check_conflicts(d("2025-03-10"), &ids(&["3"]), &index);
        assert!(clean.is_empty(), "Unassigned employees must pass");
    }

    #[test]
    fn conflicts_cross_shift_boundaries() {
        // Assigned to Morning; proposing Night the same day still counts.
        let records = vec![record("a1", "2025-03-10", "Morning", Some(("7", "Carol")))];
        let index = aggregate(&records);

        let conflicts = check_conflicts(d("2025-03-10"), &ids(&["7"]), &index);
        assert_eq!(conflicts, ids(&["7"]));

        let other_day = check_conflicts(d("2025-03-11"), &ids(&["7"]), &index);
        assert!(other_day.is_empty(), "Conflicts are scoped to one date");
    }

    #[test]
    fn conflict_check_is_idempotent_and_pure() {
        let records = vec![
            record("a1", "2025-03-10", "Morning", Some(("7", "Carol"))),
            record("a2", "2025-03-10", "Night", Some(("8", "Erik"))),
        ];
        let index = aggregate(&records);
        let proposed = ids(&["7", "8", "9"]);

        let first = check_conflicts(d("2025-03-10"), &proposed, &index);
        let second = check_conflicts(d("2025-03-10"), &proposed, &index);
        assert_eq!(first, second);
        assert_eq!(first, ids(&["7", "8"]));
        assert_eq!(
            index.entry_count(),
            2,
            "Checking must not mutate the index"
        );
    }

    #[test]
    fn conflicts_on_empty_date_are_empty() {
        let index = ScheduleIndex::default();
        let conflicts = check_conflicts(d("2025-03-10"), &ids(&["1", "2"]), &index);
        assert!(conflicts.is_empty());

        let no_proposal = check_conflicts(d("2025-03-10"), &ids(&[]), &index);
        assert!(no_proposal.is_empty());
    }

    // --- Assignment Draft ---

    #[test]
    fn draft_tracks_selection_as_a_set() {
        let mut draft = AssignmentDraft::new(d("2025-03-10"), ShiftKind::Night);
        assert!(draft.is_empty());

        draft.toggle("3");
        draft.toggle("7");
        assert!(draft.is_selected("3"));
        assert!(draft.is_selected("7"));
        assert_eq!(draft.selected_ids().len(), 2);

        draft.toggle("3");
        assert!(!draft.is_selected("3"), "Toggling twice deselects");

        draft.select("7");
        assert_eq!(
            draft.selected_ids().len(),
            1,
            "Selecting an already-selected employee is a no-op"
        );
        assert_eq!(draft.date, d("2025-03-10"));
        assert_eq!(draft.shift, ShiftKind::Night);
    }
}
