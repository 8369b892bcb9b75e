use chrono::NaiveDateTime;

use super::domain::{Client, ClientId, Deadline, DeadlineId, DeadlineStatus, NewDeadline};

/// Read-only view of the client case records.
pub trait ClientStore: Send + Sync {
    fn get(&self, id: ClientId) -> Result<Client, StoreError>;
    fn list(&self, active_only: bool) -> Result<Vec<Client>, StoreError>;
}

/// Storage abstraction for deadlines. `update` is a compare-and-swap on `Deadline::version`
/// so concurrent writers to the same deadline cannot interleave.
pub trait DeadlineStore: Send + Sync {
    fn get(&self, id: DeadlineId) -> Result<Deadline, StoreError>;
    fn list_by_client(&self, client_id: ClientId) -> Result<Vec<Deadline>, StoreError>;
    fn list_by_status(&self, status: DeadlineStatus) -> Result<Vec<Deadline>, StoreError>;
    fn create(&self, deadline: NewDeadline) -> Result<DeadlineId, StoreError>;
    fn update(
        &self,
        id: DeadlineId,
        expected_version: u64,
        update: DeadlineUpdate,
    ) -> Result<Deadline, StoreError>;
    fn delete(&self, id: DeadlineId) -> Result<(), StoreError>;
}

/// Field changes applied by a single store update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeadlineUpdate {
    pub status: Option<DeadlineStatus>,
    pub completed_at: Option<NaiveDateTime>,
    pub draft_path: Option<String>,
}

impl DeadlineUpdate {
    pub fn status(status: DeadlineStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.completed_at.is_none() && self.draft_path.is_none()
    }

    pub(crate) fn apply(self, deadline: &mut Deadline) {
        if let Some(status) = self.status {
            deadline.status = status;
        }
        if let Some(completed_at) = self.completed_at {
            deadline.completed_at = Some(completed_at);
        }
        if let Some(path) = self.draft_path {
            deadline.draft_path = Some(path);
        }
    }
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("client {0} not found")]
    ClientNotFound(ClientId),
    #[error("deadline {0} not found")]
    DeadlineNotFound(DeadlineId),
    #[error("deadline {id} changed concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        id: DeadlineId,
        expected: u64,
        found: u64,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
