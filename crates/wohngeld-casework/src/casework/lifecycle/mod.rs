//! Deadline state machine: operator transitions, clock-driven escalation and follow-ups.
//!
//! Every mutation, whether requested by an operator or by the scheduled sweep, goes through
//! [`DeadlineLifecycleManager::mutate`], which re-reads the record and writes it back with a
//! version check. A lost race is retried a bounded number of times.

mod config;
mod policy;

pub use config::LifecycleConfig;
pub use policy::FollowUpPolicy;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{
    ClientId, Deadline, DeadlineId, DeadlineKind, DeadlineStatus, InvalidStatus, NewDeadline,
};
use super::store::{ClientStore, DeadlineStore, DeadlineUpdate, StoreError};

/// Status a deadline should carry at `now`, ignoring who changed it last.
///
/// A deadline is due through the end of its due date and falls overdue from the following day.
/// Only `OFFEN` is promoted to `ERINNERUNG`; statuses an operator advanced are left alone.
pub fn evaluate_time_driven(deadline: &Deadline, now: NaiveDateTime) -> DeadlineStatus {
    let today = now.date();

    if deadline.status == DeadlineStatus::Completed {
        return DeadlineStatus::Completed;
    }

    if today > deadline.due_date {
        return DeadlineStatus::Overdue;
    }

    match (deadline.status, deadline.reminder_date) {
        (DeadlineStatus::Open, Some(reminder)) if today >= reminder => DeadlineStatus::Reminder,
        (status, _) => status,
    }
}

/// Operator request for a new deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDeadline {
    pub client_id: ClientId,
    pub kind: DeadlineKind,
    pub due_date: NaiveDate,
    pub reminder_date: Option<NaiveDate>,
    pub description: Option<String>,
}

/// Result of completing a deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOutcome {
    #[serde(rename = "frist")]
    pub completed: Deadline,
    #[serde(rename = "folgefrist", skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<Deadline>,
    /// Problems after the completion was committed, such as a follow-up that could not be
    /// stored. The completion itself stands.
    #[serde(rename = "warnungen", skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Counters reported by one pass of the scheduled sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub reminded: usize,
    pub overdue: usize,
    pub conflicts: usize,
    pub interrupted: bool,
}

/// Errors raised by lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("deadline {0} not found")]
    DeadlineNotFound(DeadlineId),
    #[error("client {0} not found")]
    ClientNotFound(ClientId),
    #[error("deadline {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: DeadlineId,
        from: DeadlineStatus,
        to: DeadlineStatus,
    },
    #[error(transparent)]
    InvalidStatus(#[from] InvalidStatus),
    #[error("reminder date {reminder} lies after due date {due}")]
    InvalidReminder { reminder: NaiveDate, due: NaiveDate },
    #[error("deadline {id} is already reopened as pending deadline {existing}")]
    AlreadyReopened { id: DeadlineId, existing: DeadlineId },
    #[error("deadline {id} kept changing concurrently ({attempts} attempts)")]
    VersionConflict { id: DeadlineId, attempts: u32 },
    #[error(transparent)]
    Store(StoreError),
}

impl LifecycleError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LifecycleError::DeadlineNotFound(_) | LifecycleError::ClientNotFound(_)
        )
    }
}

impl From<StoreError> for LifecycleError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::ClientNotFound(id) => Self::ClientNotFound(id),
            StoreError::DeadlineNotFound(id) => Self::DeadlineNotFound(id),
            StoreError::VersionConflict { id, .. } => Self::VersionConflict { id, attempts: 1 },
            other => Self::Store(other),
        }
    }
}

/// Owns every status change a deadline goes through.
pub struct DeadlineLifecycleManager<C, D> {
    clients: Arc<C>,
    deadlines: Arc<D>,
    policy: FollowUpPolicy,
    max_attempts: u32,
}

impl<C, D> DeadlineLifecycleManager<C, D>
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
{
    pub fn new(clients: Arc<C>, deadlines: Arc<D>, config: &LifecycleConfig) -> Self {
        Self {
            clients,
            deadlines,
            policy: FollowUpPolicy::from(config),
            max_attempts: config.max_transition_retries.saturating_add(1),
        }
    }

    pub fn policy(&self) -> &FollowUpPolicy {
        &self.policy
    }

    pub fn get(&self, id: DeadlineId) -> Result<Deadline, LifecycleError> {
        Ok(self.deadlines.get(id)?)
    }

    /// Deadlines of one client ordered by due date.
    pub fn list_for_client(&self, client_id: ClientId) -> Result<Vec<Deadline>, LifecycleError> {
        self.clients.get(client_id)?;
        let mut deadlines = self.deadlines.list_by_client(client_id)?;
        deadlines.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
        Ok(deadlines)
    }

    /// Register an operator-created deadline in status `OFFEN`.
    pub fn create(
        &self,
        request: CreateDeadline,
        now: NaiveDateTime,
    ) -> Result<Deadline, LifecycleError> {
        self.clients.get(request.client_id)?;

        if let Some(reminder) = request.reminder_date {
            if reminder > request.due_date {
                return Err(LifecycleError::InvalidReminder {
                    reminder,
                    due: request.due_date,
                });
            }
        }

        let reminder_date = request
            .reminder_date
            .or_else(|| self.policy.default_reminder(request.due_date, now.date()));

        let id = self.deadlines.create(NewDeadline {
            client_id: request.client_id,
            kind: request.kind,
            due_date: request.due_date,
            reminder_date,
            status: DeadlineStatus::Open,
            description: request.description,
            created_at: now,
        })?;

        info!(
            deadline = %id,
            client = %request.client_id,
            kind = %request.kind,
            due = %request.due_date,
            "deadline created"
        );
        self.get(id)
    }

    /// Operator-driven transition. Completion is routed through [`Self::complete`] without a
    /// follow-up.
    pub fn set_status(
        &self,
        id: DeadlineId,
        target: DeadlineStatus,
        now: NaiveDateTime,
    ) -> Result<Deadline, LifecycleError> {
        if target == DeadlineStatus::Completed {
            return self.complete(id, false, now).map(|outcome| outcome.completed);
        }

        let (deadline, changed) = self.mutate(id, |current| {
            if current.is_completed() || !target.is_operator_target() {
                return Err(LifecycleError::InvalidTransition {
                    id,
                    from: current.status,
                    to: target,
                });
            }
            if current.status == target {
                return Ok(None);
            }
            Ok(Some(DeadlineUpdate::status(target)))
        })?;

        if changed {
            info!(deadline = %id, status = %deadline.status, "deadline status set by operator");
        }
        Ok(deadline)
    }

    /// Mark a deadline completed and, for renewal-class kinds, schedule the next occurrence.
    pub fn complete(
        &self,
        id: DeadlineId,
        create_follow_up: bool,
        now: NaiveDateTime,
    ) -> Result<CompletionOutcome, LifecycleError> {
        let (completed, _) = self.mutate(id, |current| {
            if current.is_completed() {
                return Err(LifecycleError::InvalidTransition {
                    id,
                    from: current.status,
                    to: DeadlineStatus::Completed,
                });
            }
            Ok(Some(DeadlineUpdate {
                status: Some(DeadlineStatus::Completed),
                completed_at: Some(now),
                draft_path: None,
            }))
        })?;

        info!(deadline = %id, client = %completed.client_id, kind = %completed.kind, "deadline completed");

        let mut warnings = Vec::new();
        let follow_up = if create_follow_up && completed.kind.is_renewal_class() {
            match self.spawn_follow_up(&completed, now) {
                Ok(follow_up) => Some(follow_up),
                Err(err) => {
                    warn!(deadline = %id, error = %err, "follow-up deadline could not be created");
                    warnings.push(format!(
                        "Folgefrist zu Frist #{id} konnte nicht angelegt werden: {err}"
                    ));
                    None
                }
            }
        } else {
            if create_follow_up {
                debug!(deadline = %id, kind = %completed.kind, "kind does not recur, no follow-up");
            }
            None
        };

        Ok(CompletionOutcome {
            completed,
            follow_up,
            warnings,
        })
    }

    fn spawn_follow_up(
        &self,
        completed: &Deadline,
        now: NaiveDateTime,
    ) -> Result<Deadline, LifecycleError> {
        let Some(due_date) =
            self.policy
                .follow_up_due(completed.kind, now.date(), completed.due_date)
        else {
            return Err(LifecycleError::InvalidTransition {
                id: completed.id,
                from: completed.status,
                to: DeadlineStatus::Open,
            });
        };

        let id = self.deadlines.create(NewDeadline {
            client_id: completed.client_id,
            kind: DeadlineKind::Renewal,
            due_date,
            reminder_date: self.policy.default_reminder(due_date, now.date()),
            status: DeadlineStatus::Open,
            description: Some(format!("Folgefrist zu Frist #{}", completed.id)),
            created_at: now,
        })?;

        info!(
            deadline = %id,
            previous = %completed.id,
            client = %completed.client_id,
            due = %due_date,
            "follow-up deadline scheduled"
        );
        self.get(id)
    }

    /// Open a fresh deadline mirroring a completed one; the completed record stays untouched.
    ///
    /// Refused while the client still has a pending deadline of the same kind and due date.
    pub fn reopen(&self, id: DeadlineId, now: NaiveDateTime) -> Result<Deadline, LifecycleError> {
        let previous = self.get(id)?;
        if !previous.is_completed() {
            return Err(LifecycleError::InvalidTransition {
                id,
                from: previous.status,
                to: DeadlineStatus::Open,
            });
        }

        let pending_copy = self
            .deadlines
            .list_by_client(previous.client_id)?
            .into_iter()
            .find(|other| {
                !other.is_completed()
                    && other.kind == previous.kind
                    && other.due_date == previous.due_date
            });
        if let Some(existing) = pending_copy {
            return Err(LifecycleError::AlreadyReopened {
                id,
                existing: existing.id,
            });
        }

        let description = previous
            .description
            .clone()
            .unwrap_or_else(|| format!("Wiedereröffnung von Frist #{id}"));

        let reopened = self.deadlines.create(NewDeadline {
            client_id: previous.client_id,
            kind: previous.kind,
            due_date: previous.due_date,
            reminder_date: previous.reminder_date,
            status: DeadlineStatus::Open,
            description: Some(description),
            created_at: now,
        })?;

        info!(deadline = %reopened, previous = %id, "completed deadline reopened as new record");
        self.get(reopened)
    }

    /// Attach a generated document path to a pending deadline.
    pub fn record_draft_path(
        &self,
        id: DeadlineId,
        path: &str,
    ) -> Result<Deadline, LifecycleError> {
        let (deadline, _) = self.mutate(id, |current| {
            if current.is_completed() {
                return Err(LifecycleError::InvalidTransition {
                    id,
                    from: current.status,
                    to: current.status,
                });
            }
            Ok(Some(DeadlineUpdate {
                draft_path: Some(path.to_string()),
                ..DeadlineUpdate::default()
            }))
        })?;
        Ok(deadline)
    }

    /// Administrative override: remove a deadline outright.
    pub fn purge(&self, id: DeadlineId) -> Result<(), LifecycleError> {
        self.deadlines.delete(id)?;
        warn!(deadline = %id, "deadline purged by administrative override");
        Ok(())
    }

    /// Deadlines currently marked overdue, optionally for a single client.
    pub fn overdue_for(
        &self,
        client: Option<ClientId>,
    ) -> Result<impl Iterator<Item = Deadline>, LifecycleError> {
        if let Some(client_id) = client {
            self.clients.get(client_id)?;
        }

        let overdue = self.deadlines.list_by_status(DeadlineStatus::Overdue)?;
        Ok(overdue
            .into_iter()
            .filter(move |deadline| client.map_or(true, |id| deadline.client_id == id)))
    }

    /// Apply the clock-driven rule to one deadline. Returns the new status if it changed.
    pub fn refresh(
        &self,
        id: DeadlineId,
        now: NaiveDateTime,
    ) -> Result<Option<DeadlineStatus>, LifecycleError> {
        let (deadline, changed) = self.mutate(id, |current| {
            let next = evaluate_time_driven(current, now);
            if next == current.status {
                Ok(None)
            } else {
                Ok(Some(DeadlineUpdate::status(next)))
            }
        })?;

        if changed {
            debug!(deadline = %id, status = %deadline.status, "time-driven transition");
        }
        Ok(changed.then_some(deadline.status))
    }

    /// Re-evaluate every pending deadline against `now`.
    ///
    /// `cancel` is checked between deadlines, never in the middle of one.
    pub fn sweep(
        &self,
        now: NaiveDateTime,
        cancel: &AtomicBool,
    ) -> Result<SweepReport, LifecycleError> {
        let mut candidates = Vec::new();
        for status in DeadlineStatus::pending() {
            candidates.extend(self.deadlines.list_by_status(status)?);
        }

        let mut report = SweepReport::default();
        for deadline in candidates {
            if cancel.load(Ordering::Acquire) {
                report.interrupted = true;
                break;
            }

            report.examined += 1;
            match self.refresh(deadline.id, now) {
                Ok(Some(DeadlineStatus::Reminder)) => report.reminded += 1,
                Ok(Some(DeadlineStatus::Overdue)) => report.overdue += 1,
                Ok(_) => {}
                Err(LifecycleError::DeadlineNotFound(_)) => {}
                Err(LifecycleError::VersionConflict { id, attempts }) => {
                    warn!(deadline = %id, attempts, "sweep gave up on contended deadline");
                    report.conflicts += 1;
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            examined = report.examined,
            reminded = report.reminded,
            overdue = report.overdue,
            conflicts = report.conflicts,
            interrupted = report.interrupted,
            "deadline sweep finished"
        );
        Ok(report)
    }

    /// Single mutation entry point: read, plan, compare-and-swap, retry on conflict.
    fn mutate<F>(&self, id: DeadlineId, mut plan: F) -> Result<(Deadline, bool), LifecycleError>
    where
        F: FnMut(&Deadline) -> Result<Option<DeadlineUpdate>, LifecycleError>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let current = self.deadlines.get(id)?;
            let update = match plan(&current)? {
                Some(update) if !update.is_empty() => update,
                _ => return Ok((current, false)),
            };

            match self.deadlines.update(id, current.version, update) {
                Ok(updated) => return Ok((updated, true)),
                Err(StoreError::VersionConflict { .. }) if attempt < self.max_attempts => {
                    debug!(deadline = %id, attempt, "version conflict, re-reading");
                }
                Err(StoreError::VersionConflict { .. }) => {
                    return Err(LifecycleError::VersionConflict {
                        id,
                        attempts: attempt,
                    });
                }
                Err(other) => return Err(other.into()),
            }
        }
    }
}
