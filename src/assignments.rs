// src/assignments.rs

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::hr_api::AssignmentRecord;
use crate::shift_catalog::ShiftKind;

pub type EmployeeId = String;

/// Roster entry as the rest of the crate sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
}

/// One resolved assignment inside a per-date, per-shift bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedShift {
    pub assignment_id: String,
    pub employee: Employee,
}

/// Aggregated view over a batch of assignment records: per-date shift
/// buckets for rendering, plus a shift-agnostic employee index for
/// conflict checks. Built by [`aggregate`]; read-only afterwards so the
/// two structures cannot drift apart.
#[derive(Debug, Clone, Default)]
pub struct ScheduleIndex {
    by_date_and_shift: HashMap<NaiveDate, BTreeMap<ShiftKind, Vec<AssignedShift>>>,
    assigned: HashMap<NaiveDate, BTreeSet<EmployeeId>>,
    skipped: usize,
}

impl ScheduleIndex {
    /// Shift buckets for one date, cloned for embedding into a grid cell
    /// or a day panel. Dates without assignments yield an empty map.
    pub fn shifts_on(&self, date: NaiveDate) -> BTreeMap<ShiftKind, Vec<AssignedShift>> {
        self.by_date_and_shift
            .get(&date)
            .cloned()
            .unwrap_or_default()
    }

    /// Employee ids already assigned on `date`, regardless of shift.
    pub fn assigned_on(&self, date: NaiveDate) -> Option<&BTreeSet<EmployeeId>> {
        self.assigned.get(&date)
    }

    /// Records dropped during aggregation because they could not be
    /// resolved.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Total resolved entries across all dates and shifts.
    pub fn entry_count(&self) -> usize {
        self.by_date_and_shift
            .values()
            .flat_map(|buckets| buckets.values())
            .map(Vec::len)
            .sum()
    }
}

/// Folds raw HR API records into a [`ScheduleIndex`]. Each well-formed
/// record lands in exactly one bucket, in input order, and contributes its
/// employee to the per-date index. A record with an unparsable date, an
/// unknown shift label or no employee reference is dropped from both
/// structures and only counted; one bad record never sinks the batch.
pub fn aggregate(records: &[AssignmentRecord]) -> ScheduleIndex {
    let mut index = ScheduleIndex::default();

    for record in records {
        let date = match NaiveDate::parse_from_str(&record.date, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                index.skipped += 1;
                continue;
            }
        };
        let shift = match ShiftKind::from_label(&record.shift_type) {
            Some(shift) => shift,
            None => {
                index.skipped += 1;
                continue;
            }
        };
        let employee = match &record.employee {
            Some(employee) => Employee {
                id: employee.id.clone(),
                name: employee.name.clone(),
            },
            None => {
                index.skipped += 1;
                continue;
            }
        };

        index
            .assigned
            .entry(date)
            .or_default()
            .insert(employee.id.clone());
        index
            .by_date_and_shift
            .entry(date)
            .or_default()
            .entry(shift)
            .or_default()
            .push(AssignedShift {
                assignment_id: record.id.clone(),
                employee,
            });
    }

    index
}

/// Returns the subset of `proposed` already assigned on `date`, on any
/// shift. Pure and repeatable; never contacts the repository. An empty
/// result means the submission may proceed.
pub fn check_conflicts(
    date: NaiveDate,
    proposed: &BTreeSet<EmployeeId>,
    index: &ScheduleIndex,
) -> BTreeSet<EmployeeId> {
    match index.assigned_on(date) {
        Some(taken) => proposed.intersection(taken).cloned().collect(),
        None => BTreeSet::new(),
    }
}

/// Employee selection while a new assignment request is being put
/// together. Selection state lives here for the lifetime of the request
/// and is never persisted.
#[derive(Debug, Clone)]
pub struct AssignmentDraft {
    pub date: NaiveDate,
    pub shift: ShiftKind,
    selected: BTreeSet<EmployeeId>,
}

impl AssignmentDraft {
    pub fn new(date: NaiveDate, shift: ShiftKind) -> Self {
        Self {
            date,
            shift,
            selected: BTreeSet::new(),
        }
    }

    /// Adds one employee to the selection. Selecting twice is a no-op.
    pub fn select(&mut self, id: &str) {
        self.selected.insert(id.to_string());
    }

    /// Flips one employee in or out of the selection.
    pub fn toggle(&mut self, id: &str) {
        if !self.selected.remove(id) {
            self.selected.insert(id.to_string());
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn selected_ids(&self) -> &BTreeSet<EmployeeId> {
        &self.selected
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}
