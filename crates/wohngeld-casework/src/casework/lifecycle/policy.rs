use std::collections::BTreeMap;

use chrono::{Days, Months, NaiveDate};

use super::super::domain::DeadlineKind;
use super::config::{LifecycleConfig, DEFAULT_FOLLOW_UP_MONTHS};

/// Scheduling rules for follow-up deadlines and derived reminders.
#[derive(Debug, Clone)]
pub struct FollowUpPolicy {
    intervals: BTreeMap<DeadlineKind, u32>,
    reminder_lead_days: u32,
}

impl FollowUpPolicy {
    pub fn new(intervals: BTreeMap<DeadlineKind, u32>, reminder_lead_days: u32) -> Self {
        let intervals = intervals
            .into_iter()
            .filter(|(kind, _)| kind.is_renewal_class())
            .map(|(kind, months)| {
                let sanitized = if months == 0 {
                    DEFAULT_FOLLOW_UP_MONTHS
                } else {
                    months
                };
                (kind, sanitized)
            })
            .collect();

        Self {
            intervals,
            reminder_lead_days,
        }
    }

    pub fn interval_months(&self, kind: DeadlineKind) -> Option<u32> {
        if !kind.is_renewal_class() {
            return None;
        }
        Some(
            self.intervals
                .get(&kind)
                .copied()
                .unwrap_or(DEFAULT_FOLLOW_UP_MONTHS),
        )
    }

    /// Due date of the next occurrence after completing a deadline of `kind`.
    ///
    /// Counted from the completion day. An early completion never schedules the follow-up on
    /// or before the original due date; in that case the interval runs from the original due
    /// date instead.
    pub fn follow_up_due(
        &self,
        kind: DeadlineKind,
        completed_on: NaiveDate,
        original_due: NaiveDate,
    ) -> Option<NaiveDate> {
        let months = Months::new(self.interval_months(kind)?);
        let from_completion = completed_on.checked_add_months(months)?;
        if from_completion > original_due {
            Some(from_completion)
        } else {
            original_due.checked_add_months(months)
        }
    }

    /// Reminder for a deadline created on `today` without an explicit reminder date.
    pub fn default_reminder(&self, due: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
        if self.reminder_lead_days == 0 {
            return None;
        }

        let lead = due.checked_sub_days(Days::new(u64::from(self.reminder_lead_days)))?;
        Some(lead.max(today.min(due)))
    }
}

impl Default for FollowUpPolicy {
    fn default() -> Self {
        Self::from(&LifecycleConfig::default())
    }
}

impl From<&LifecycleConfig> for FollowUpPolicy {
    fn from(config: &LifecycleConfig) -> Self {
        Self::new(config.follow_up_months.clone(), config.reminder_lead_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn renewal_follow_up_uses_statutory_interval() {
        let policy = FollowUpPolicy::default();
        assert_eq!(
            policy.follow_up_due(DeadlineKind::Renewal, date(2025, 3, 1), date(2025, 2, 28)),
            Some(date(2026, 3, 1))
        );
    }

    #[test]
    fn non_recurring_kinds_have_no_interval() {
        let policy = FollowUpPolicy::default();
        assert_eq!(policy.interval_months(DeadlineKind::DocumentResubmission), None);
        assert_eq!(policy.interval_months(DeadlineKind::Other), None);
        assert_eq!(
            policy.follow_up_due(DeadlineKind::Other, date(2025, 3, 1), date(2025, 3, 1)),
            None
        );
    }

    #[test]
    fn early_completion_still_lands_after_original_due() {
        let mut intervals = BTreeMap::new();
        intervals.insert(DeadlineKind::Increase, 1);
        let policy = FollowUpPolicy::new(intervals, 14);

        let due = policy
            .follow_up_due(DeadlineKind::Increase, date(2025, 1, 5), date(2025, 6, 30))
            .expect("follow-up due");
        assert_eq!(due, date(2025, 7, 30));
    }

    #[test]
    fn zero_interval_falls_back_to_default() {
        let mut intervals = BTreeMap::new();
        intervals.insert(DeadlineKind::FirstApplication, 0);
        let policy = FollowUpPolicy::new(intervals, 14);
        assert_eq!(
            policy.interval_months(DeadlineKind::FirstApplication),
            Some(DEFAULT_FOLLOW_UP_MONTHS)
        );
    }

    #[test]
    fn derived_reminder_is_clamped_between_today_and_due() {
        let policy = FollowUpPolicy::default();
        assert_eq!(
            policy.default_reminder(date(2025, 6, 30), date(2025, 1, 1)),
            Some(date(2025, 6, 16))
        );
        assert_eq!(
            policy.default_reminder(date(2025, 1, 10), date(2025, 1, 5)),
            Some(date(2025, 1, 5))
        );
        assert_eq!(
            policy.default_reminder(date(2025, 1, 10), date(2025, 2, 1)),
            Some(date(2025, 1, 10))
        );
    }
}
