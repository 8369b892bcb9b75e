use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::super::domain::DeadlineKind;

pub const DEFAULT_FOLLOW_UP_MONTHS: u32 = 12;
pub const DEFAULT_REMINDER_LEAD_DAYS: u32 = 14;
pub const DEFAULT_MAX_TRANSITION_RETRIES: u32 = 3;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Tunables for deadline transitions and follow-up scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Statutory renewal interval per renewal-class kind, in months.
    pub follow_up_months: BTreeMap<DeadlineKind, u32>,
    /// Days before the due date at which a derived reminder fires.
    pub reminder_lead_days: u32,
    /// Re-read and retry budget after losing a concurrent write.
    pub max_transition_retries: u32,
    pub sweep_interval_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        let follow_up_months = DeadlineKind::ordered()
            .into_iter()
            .filter(|kind| kind.is_renewal_class())
            .map(|kind| (kind, DEFAULT_FOLLOW_UP_MONTHS))
            .collect();

        Self {
            follow_up_months,
            reminder_lead_days: DEFAULT_REMINDER_LEAD_DAYS,
            max_transition_retries: DEFAULT_MAX_TRANSITION_RETRIES,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}
