use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::domain::{Client, Deadline, DeadlineKind, DeadlineStatus};
use super::lifecycle::evaluate_time_driven;
use super::readiness::ReadinessEvaluator;
use super::store::{ClientStore, DeadlineStore, StoreError};

const DAYS_PER_WEEK: u64 = 7;

/// Dashboard counters. Field names are stable for API consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub aktive_klienten: usize,
    pub klienten_mit_unvollstaendigen_daten: usize,
    pub fristen_ueberfaellig: usize,
    pub fristen_faellig_heute: usize,
    pub fristen_faellig_diese_woche: usize,
    pub fristen_faellig_diesen_monat: usize,
    pub erinnerungen_offen: usize,
}

/// Read-only rollup over the client and deadline stores, recomputed per call.
pub struct DashboardAggregator<C, D> {
    clients: Arc<C>,
    deadlines: Arc<D>,
    evaluator: Arc<ReadinessEvaluator>,
}

impl<C, D> DashboardAggregator<C, D>
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
{
    pub fn new(clients: Arc<C>, deadlines: Arc<D>, evaluator: Arc<ReadinessEvaluator>) -> Self {
        Self {
            clients,
            deadlines,
            evaluator,
        }
    }

    pub fn summary(&self, now: NaiveDateTime) -> Result<DashboardSummary, StoreError> {
        let today = now.date();
        // Seven calendar days including today.
        let week_end = today
            .checked_add_days(Days::new(DAYS_PER_WEEK - 1))
            .unwrap_or(NaiveDate::MAX);

        let active = self.clients.list(true)?;
        let mut incomplete = 0;
        for client in &active {
            let deadlines = self.deadlines.list_by_client(client.id)?;
            let kind = most_relevant_kind(client, &deadlines);
            if !self.evaluator.evaluate(client, kind).ready {
                incomplete += 1;
            }
        }

        let mut summary = DashboardSummary {
            aktive_klienten: active.len(),
            klienten_mit_unvollstaendigen_daten: incomplete,
            fristen_ueberfaellig: self.deadlines.list_by_status(DeadlineStatus::Overdue)?.len(),
            erinnerungen_offen: self.deadlines.list_by_status(DeadlineStatus::Reminder)?.len(),
            ..DashboardSummary::default()
        };

        for deadline in self.upcoming(now)? {
            let due = deadline.due_date;
            if due == today {
                summary.fristen_faellig_heute += 1;
            }
            if due <= week_end {
                summary.fristen_faellig_diese_woche += 1;
            }
            if due.year() == today.year() && due.month() == today.month() {
                summary.fristen_faellig_diesen_monat += 1;
            }
        }

        Ok(summary)
    }

    /// Pending deadlines due between today and `days` days ahead, earliest first.
    pub fn due_within(&self, days: u32, now: NaiveDateTime) -> Result<Vec<Deadline>, StoreError> {
        let horizon = now
            .date()
            .checked_add_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MAX);

        let mut due: Vec<Deadline> = self
            .upcoming(now)?
            .into_iter()
            .filter(|deadline| deadline.due_date <= horizon)
            .collect();
        due.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
        Ok(due)
    }

    /// Pending deadlines the clock has not yet pushed past their due date.
    fn upcoming(&self, now: NaiveDateTime) -> Result<Vec<Deadline>, StoreError> {
        let today = now.date();
        let mut upcoming = Vec::new();
        for status in DeadlineStatus::pending() {
            upcoming.extend(
                self.deadlines
                    .list_by_status(status)?
                    .into_iter()
                    .filter(|deadline| {
                        !matches!(
                            evaluate_time_driven(deadline, now),
                            DeadlineStatus::Completed | DeadlineStatus::Overdue
                        ) && deadline.due_date >= today
                    }),
            );
        }
        Ok(upcoming)
    }
}

/// Document type a client's readiness is judged against on the dashboard: the earliest
/// pending deadline, otherwise renewal for known recipients and first application for new ones.
pub fn most_relevant_kind(client: &Client, deadlines: &[Deadline]) -> DeadlineKind {
    deadlines
        .iter()
        .filter(|deadline| !deadline.is_completed())
        .min_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)))
        .map(|deadline| deadline.kind)
        .unwrap_or_else(|| {
            let known_recipient = client
                .benefit_number
                .as_deref()
                .is_some_and(|number| !number.trim().is_empty());
            if known_recipient {
                DeadlineKind::Renewal
            } else {
                DeadlineKind::FirstApplication
            }
        })
}
