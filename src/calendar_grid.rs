// src/calendar_grid.rs

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::assignments::{AssignedShift, ScheduleIndex};
use crate::shift_catalog::ShiftKind;

/// Cells in the fixed month grid: six full weeks, Monday through Sunday.
pub const GRID_CELLS: usize = 42;

/// Years accepted by `ScheduleMonth::new`. Inside these bounds the grid
/// and the neighbouring months it spills into always stay within chrono's
/// representable dates.
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

/// A year/month pair that is valid by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleMonth {
    first: NaiveDate,
}

impl ScheduleMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, 1).map(|first| Self { first })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            first: date.with_day(1).unwrap_or(date),
        }
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().first_day().pred_opt().unwrap_or(self.first)
    }

    pub fn days_in_month(&self) -> u32 {
        self.last_day().day()
    }

    pub fn next(&self) -> ScheduleMonth {
        let first = if self.month() == 12 {
            NaiveDate::from_ymd_opt(self.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(self.year(), self.month() + 1, 1)
        };
        // Representable for every accepted month; MAX_YEAR sits far
        // below chrono's ceiling.
        ScheduleMonth {
            first: first.unwrap_or(self.first),
        }
    }

    pub fn prev(&self) -> ScheduleMonth {
        match self.first.pred_opt() {
            Some(last_of_prev) => ScheduleMonth::from_date(last_of_prev),
            None => *self,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year() && date.month() == self.month()
    }
}

impl std::fmt::Display for ScheduleMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

/// One cell of the month grid. Padding cells from the neighbouring months
/// carry `in_target_month = false` but are otherwise fully populated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub in_target_month: bool,
    pub shifts: BTreeMap<ShiftKind, Vec<AssignedShift>>,
}

/// Builds the fixed 42-cell grid for `month`. The first cell is the Monday
/// of the week containing the 1st; leading cells count back through the
/// previous month, trailing cells run into the next month from day 1. The
/// function is total for every valid month and never fails.
pub fn build_month_grid(month: ScheduleMonth, index: &ScheduleIndex) -> Vec<CalendarDay> {
    let first = month.first_day();
    let lead_days = first.weekday().num_days_from_monday() as i64;
    let grid_start = first - Duration::days(lead_days);

    (0..GRID_CELLS as i64)
        .map(|offset| {
            let date = grid_start + Duration::days(offset);
            CalendarDay {
                date,
                in_target_month: month.contains(date),
                shifts: index.shifts_on(date),
            }
        })
        .collect()
}
