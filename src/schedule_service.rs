// src/schedule_service.rs

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::assignments::{
    aggregate, check_conflicts, AssignedShift, AssignmentDraft, Employee, EmployeeId,
    ScheduleIndex,
};
use crate::calendar_grid::{build_month_grid, CalendarDay, ScheduleMonth};
use crate::hr_api::{AssignmentRepository, HrApiError, NewAssignment};
use crate::shift_catalog::ShiftKind;

// --- View State ---

/// Lifecycle of one fetched view. A failed fetch replaces the previous
/// payload; retrying runs the full load again.
#[derive(Debug, Clone)]
pub enum ViewState<T> {
    Idle,
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> ViewState<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, ViewState::Ready(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            ViewState::Ready(view) => Some(view),
            _ => None,
        }
    }
}

/// The month grid plus everything needed to act on it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub days: Vec<CalendarDay>,
    pub skipped_records: usize,
    #[serde(skip)]
    pub index: ScheduleIndex,
}

impl MonthView {
    /// True when `date` falls inside this view's target month.
    pub fn covers(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

/// Single-date detail panel: assignments grouped by shift.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayView {
    pub date: NaiveDate,
    pub shifts: BTreeMap<ShiftKind, Vec<AssignedShift>>,
    pub skipped_records: usize,
}

/// Roster entry annotated for the new-assignment picker.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentCandidate {
    pub employee: Employee,
    pub already_assigned: bool,
}

// --- Errors ---

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("HR API request failed")]
    Api(#[from] HrApiError),

    #[error("No loaded schedule covers {date}; load the month first")]
    ViewNotReady { date: NaiveDate },

    #[error("Nothing selected for {date}")]
    EmptySelection { date: NaiveDate },

    #[error("Already assigned on {date}: {}", .names.join(", "))]
    AssignmentConflict {
        date: NaiveDate,
        names: Vec<String>,
    },

    #[error("Another submission is still in flight")]
    SubmissionInFlight,

    #[error("Submission failed")]
    SubmissionFailed {
        #[source]
        source: HrApiError,
    },
}

// --- Scheduling Service ---

/// Owns every piece of scheduling state: the cached roster, the month and
/// day view slots and the submission gate. Every slot write is gated on a
/// sequence token so a slow request can never overwrite the state of a
/// newer one; the last requested view wins.
pub struct ScheduleService {
    repository: Arc<dyn AssignmentRepository>,
    roster: Mutex<Vec<Employee>>,
    month_view: Mutex<ViewState<MonthView>>,
    day_view: Mutex<ViewState<DayView>>,
    month_seq: AtomicU64,
    day_seq: AtomicU64,
    submission_gate: Mutex<()>,
}

impl ScheduleService {
    pub fn new(repository: Arc<dyn AssignmentRepository>) -> Self {
        Self {
            repository,
            roster: Mutex::new(Vec::new()),
            month_view: Mutex::new(ViewState::Idle),
            day_view: Mutex::new(ViewState::Idle),
            month_seq: AtomicU64::new(0),
            day_seq: AtomicU64::new(0),
            submission_gate: Mutex::new(()),
        }
    }

    // --- Roster ---

    /// Re-fetches the employee roster into the shared cache. Also run by
    /// the periodic background task.
    pub async fn refresh_roster(&self) -> Result<usize, ScheduleError> {
        info!("Refreshing employee roster...");
        let employees = self.repository.list_employees().await?;
        let mut cache = self.roster.lock().await;
        *cache = employees
            .into_iter()
            .map(|e| Employee {
                id: e.id,
                name: e.name,
            })
            .collect();
        info!("Roster refresh complete: {} employees.", cache.len());
        Ok(cache.len())
    }

    pub async fn roster(&self) -> Vec<Employee> {
        self.roster.lock().await.clone()
    }

    // --- Month View ---

    /// Loads the grid for `month`: roster plus that month's assignments,
    /// aggregated and laid out. Publishes `Loading` first and `Ready` or
    /// `Failed` on completion, unless a newer request has started in the
    /// meantime.
    pub async fn load_month(&self, month: ScheduleMonth) -> Result<MonthView, ScheduleError> {
        let token = self.month_seq.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut slot = self.month_view.lock().await;
            if self.month_seq.load(Ordering::SeqCst) == token {
                *slot = ViewState::Loading;
            }
        }
        info!("Loading schedule for {} (request #{})...", month, token);

        match self.fetch_month(month).await {
            Ok(view) => {
                let mut slot = self.month_view.lock().await;
                if self.month_seq.load(Ordering::SeqCst) == token {
                    info!(
                        "Schedule for {} ready: {} assignment entries, {} skipped.",
                        month,
                        view.index.entry_count(),
                        view.skipped_records
                    );
                    *slot = ViewState::Ready(view.clone());
                } else {
                    debug!(
                        "Discarding stale schedule response for {} (request #{}).",
                        month, token
                    );
                }
                Ok(view)
            }
            Err(e) => {
                let mut slot = self.month_view.lock().await;
                if self.month_seq.load(Ordering::SeqCst) == token {
                    error!("Loading schedule for {} failed: {}", month, e);
                    *slot = ViewState::Failed(e.to_string());
                } else {
                    debug!(
                        "Discarding stale schedule failure for {} (request #{}).",
                        month, token
                    );
                }
                Err(e)
            }
        }
    }

    async fn fetch_month(&self, month: ScheduleMonth) -> Result<MonthView, ScheduleError> {
        self.refresh_roster().await?;
        let records = self
            .repository
            .list_assignments(month.first_day(), month.last_day())
            .await?;
        let index = aggregate(&records);
        if index.skipped() > 0 {
            warn!(
                "Dropped {} malformed assignment record(s) for {}.",
                index.skipped(),
                month
            );
        }
        let days = build_month_grid(month, &index);
        Ok(MonthView {
            year: month.year(),
            month: month.month(),
            days,
            skipped_records: index.skipped(),
            index,
        })
    }

    pub async fn month_view(&self) -> ViewState<MonthView> {
        self.month_view.lock().await.clone()
    }

    // --- Day View ---

    /// Loads the detail panel for one date. Same sequence-token rules as
    /// the month view, on its own counter.
    pub async fn open_day(&self, date: NaiveDate) -> Result<DayView, ScheduleError> {
        let token = self.day_seq.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut slot = self.day_view.lock().await;
            if self.day_seq.load(Ordering::SeqCst) == token {
                *slot = ViewState::Loading;
            }
        }
        info!("Loading day detail for {} (request #{})...", date, token);

        match self.fetch_day(date).await {
            Ok(view) => {
                let mut slot = self.day_view.lock().await;
                if self.day_seq.load(Ordering::SeqCst) == token {
                    *slot = ViewState::Ready(view.clone());
                } else {
                    debug!(
                        "Discarding stale day response for {} (request #{}).",
                        date, token
                    );
                }
                Ok(view)
            }
            Err(e) => {
                let mut slot = self.day_view.lock().await;
                if self.day_seq.load(Ordering::SeqCst) == token {
                    error!("Loading day detail for {} failed: {}", date, e);
                    *slot = ViewState::Failed(e.to_string());
                } else {
                    debug!(
                        "Discarding stale day failure for {} (request #{}).",
                        date, token
                    );
                }
                Err(e)
            }
        }
    }

    async fn fetch_day(&self, date: NaiveDate) -> Result<DayView, ScheduleError> {
        let records = self.repository.list_day_assignments(date).await?;
        let index = aggregate(&records);
        if index.skipped() > 0 {
            warn!(
                "Dropped {} malformed assignment record(s) for {}.",
                index.skipped(),
                date
            );
        }
        Ok(DayView {
            date,
            shifts: index.shifts_on(date),
            skipped_records: index.skipped(),
        })
    }

    /// Closes the detail panel. Bumps the sequence so an in-flight day
    /// fetch cannot resurrect it; a reopen that has already started keeps
    /// the slot instead.
    pub async fn close_day(&self) {
        let token = self.day_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let mut slot = self.day_view.lock().await;
        if self.day_seq.load(Ordering::SeqCst) == token {
            *slot = ViewState::Idle;
        }
    }

    pub async fn day_view(&self) -> ViewState<DayView> {
        self.day_view.lock().await.clone()
    }

    // --- Submission ---

    /// Roster annotated with who is already assigned on `date`, for
    /// building a draft. Requires a ready month view covering the date.
    pub async fn assignment_candidates(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<AssignmentCandidate>, ScheduleError> {
        let taken: BTreeSet<EmployeeId> = {
            let slot = self.month_view.lock().await;
            let view = match slot.ready() {
                Some(view) if view.covers(date) => view,
                _ => return Err(ScheduleError::ViewNotReady { date }),
            };
            view.index.assigned_on(date).cloned().unwrap_or_default()
        };

        let roster = self.roster.lock().await;
        Ok(roster
            .iter()
            .map(|employee| AssignmentCandidate {
                already_assigned: taken.contains(&employee.id),
                employee: employee.clone(),
            })
            .collect())
    }

    /// Submits a drafted assignment. The conflict check runs against the
    /// loaded month before anything goes on the wire; a conflicting draft
    /// is blocked locally. After an accepted create the month (and an open
    /// day panel) are re-fetched rather than patched in place, so the
    /// views always show what the HR API accepted. One submission at a
    /// time; the create call is never retried.
    pub async fn submit_assignment(&self, draft: &AssignmentDraft) -> Result<(), ScheduleError> {
        let _gate = self
            .submission_gate
            .try_lock()
            .map_err(|_| ScheduleError::SubmissionInFlight)?;

        if draft.is_empty() {
            return Err(ScheduleError::EmptySelection { date: draft.date });
        }

        let conflicts = {
            let slot = self.month_view.lock().await;
            let view = match slot.ready() {
                Some(view) if view.covers(draft.date) => view,
                _ => return Err(ScheduleError::ViewNotReady { date: draft.date }),
            };
            check_conflicts(draft.date, draft.selected_ids(), &view.index)
        };

        if !conflicts.is_empty() {
            let names = self.names_for(&conflicts).await;
            warn!(
                "Blocked assignment on {}: already assigned that day: {}.",
                draft.date,
                names.join(", ")
            );
            return Err(ScheduleError::AssignmentConflict {
                date: draft.date,
                names,
            });
        }

        let new_assignment = NewAssignment {
            date: draft.date,
            shift_type: draft.shift.label().to_string(),
            employee_ids: draft.selected_ids().iter().cloned().collect(),
        };
        info!(
            "Submitting {} assignment(s) on {} for shift '{}'...",
            new_assignment.employee_ids.len(),
            draft.date,
            draft.shift
        );

        if let Err(e) = self.repository.create_assignment(&new_assignment).await {
            error!("Submission for {} failed: {}", draft.date, e);
            return Err(ScheduleError::SubmissionFailed { source: e });
        }

        info!("Submission for {} accepted; refreshing views...", draft.date);

        // The create succeeded, so refresh failures are reported through
        // the view slots rather than failing the submission.
        if let Err(e) = self.load_month(ScheduleMonth::from_date(draft.date)).await {
            error!("Post-submission month refresh failed: {}", e);
        }
        let open_day = self.day_view.lock().await.ready().map(|view| view.date);
        if let Some(date) = open_day {
            if let Err(e) = self.open_day(date).await {
                error!("Post-submission day refresh failed: {}", e);
            }
        }

        Ok(())
    }

    async fn names_for(&self, ids: &BTreeSet<EmployeeId>) -> Vec<String> {
        let roster = self.roster.lock().await;
        ids.iter()
            .map(|id| {
                roster
                    .iter()
                    .find(|employee| &employee.id == id)
                    .map(|employee| employee.name.clone())
                    .unwrap_or_else(|| id.clone())
            })
            .collect()
    }
}
