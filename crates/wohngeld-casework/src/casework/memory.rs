use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

use super::domain::{Client, ClientId, Deadline, DeadlineId, DeadlineStatus, NewDeadline};
use super::store::{ClientStore, DeadlineStore, DeadlineUpdate, StoreError};

fn poisoned() -> StoreError {
    StoreError::Unavailable("store lock poisoned".to_string())
}

/// Client store backed by a process-local map.
#[derive(Debug, Default, Clone)]
pub struct InMemoryClientStore {
    clients: Arc<RwLock<BTreeMap<ClientId, Client>>>,
}

impl InMemoryClientStore {
    pub fn with_clients(clients: impl IntoIterator<Item = Client>) -> Self {
        let store = Self::default();
        for client in clients {
            store.upsert(client);
        }
        store
    }

    /// Insert or replace a client record. Stands in for the CRUD surface that owns clients.
    pub fn upsert(&self, client: Client) {
        if let Ok(mut guard) = self.clients.write() {
            guard.insert(client.id, client);
        }
    }
}

impl ClientStore for InMemoryClientStore {
    fn get(&self, id: ClientId) -> Result<Client, StoreError> {
        let guard = self.clients.read().map_err(|_| poisoned())?;
        guard.get(&id).cloned().ok_or(StoreError::ClientNotFound(id))
    }

    fn list(&self, active_only: bool) -> Result<Vec<Client>, StoreError> {
        let guard = self.clients.read().map_err(|_| poisoned())?;
        Ok(guard
            .values()
            .filter(|client| !active_only || client.active)
            .cloned()
            .collect())
    }
}

/// Deadline store with sequential ids and version-checked updates.
#[derive(Debug, Clone)]
pub struct InMemoryDeadlineStore {
    deadlines: Arc<RwLock<BTreeMap<DeadlineId, Deadline>>>,
    sequence: Arc<AtomicU64>,
}

impl Default for InMemoryDeadlineStore {
    fn default() -> Self {
        Self {
            deadlines: Arc::default(),
            sequence: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl InMemoryDeadlineStore {
    pub fn len(&self) -> usize {
        self.deadlines.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(
        &self,
        deadline: NewDeadline,
        completed_at: Option<NaiveDateTime>,
    ) -> Result<DeadlineId, StoreError> {
        let id = DeadlineId(self.sequence.fetch_add(1, Ordering::Relaxed));
        let record = Deadline {
            id,
            client_id: deadline.client_id,
            kind: deadline.kind,
            due_date: deadline.due_date,
            reminder_date: deadline.reminder_date,
            status: deadline.status,
            description: deadline.description,
            draft_path: None,
            created_at: deadline.created_at,
            completed_at,
            version: 0,
        };

        let mut guard = self.deadlines.write().map_err(|_| poisoned())?;
        guard.insert(id, record);
        Ok(id)
    }
}

impl DeadlineStore for InMemoryDeadlineStore {
    fn get(&self, id: DeadlineId) -> Result<Deadline, StoreError> {
        let guard = self.deadlines.read().map_err(|_| poisoned())?;
        guard.get(&id).cloned().ok_or(StoreError::DeadlineNotFound(id))
    }

    fn list_by_client(&self, client_id: ClientId) -> Result<Vec<Deadline>, StoreError> {
        let guard = self.deadlines.read().map_err(|_| poisoned())?;
        Ok(guard
            .values()
            .filter(|deadline| deadline.client_id == client_id)
            .cloned()
            .collect())
    }

    fn list_by_status(&self, status: DeadlineStatus) -> Result<Vec<Deadline>, StoreError> {
        let guard = self.deadlines.read().map_err(|_| poisoned())?;
        Ok(guard
            .values()
            .filter(|deadline| deadline.status == status)
            .cloned()
            .collect())
    }

    fn create(&self, deadline: NewDeadline) -> Result<DeadlineId, StoreError> {
        self.insert(deadline, None)
    }

    fn update(
        &self,
        id: DeadlineId,
        expected_version: u64,
        update: DeadlineUpdate,
    ) -> Result<Deadline, StoreError> {
        let mut guard = self.deadlines.write().map_err(|_| poisoned())?;
        let record = guard.get_mut(&id).ok_or(StoreError::DeadlineNotFound(id))?;

        if record.version != expected_version {
            return Err(StoreError::VersionConflict {
                id,
                expected: expected_version,
                found: record.version,
            });
        }

        update.apply(record);
        record.version += 1;
        Ok(record.clone())
    }

    fn delete(&self, id: DeadlineId) -> Result<(), StoreError> {
        let mut guard = self.deadlines.write().map_err(|_| poisoned())?;
        guard
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::DeadlineNotFound(id))
    }
}

/// Seed document accepted by [`load_seed`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedDocument {
    #[serde(rename = "klienten")]
    pub clients: Vec<Client>,
    #[serde(rename = "fristen")]
    pub deadlines: Vec<SeedDeadline>,
}

/// Seeded deadline; completed records may carry their completion time.
#[derive(Debug, Deserialize)]
pub struct SeedDeadline {
    #[serde(flatten)]
    pub deadline: NewDeadline,
    #[serde(rename = "erledigtAm", default)]
    pub completed_at: Option<NaiveDateTime>,
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("unable to read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("seed file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("fristen[{index}] refers to unknown client {client}")]
    UnknownClient { index: usize, client: ClientId },
    #[error("fristen[{index}] has reminder date {reminder} after due date {due}")]
    InvalidReminder {
        index: usize,
        reminder: NaiveDate,
        due: NaiveDate,
    },
    #[error("fristen[{index}] carries a completion time but status {status}")]
    UnexpectedCompletion {
        index: usize,
        status: DeadlineStatus,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Populate fresh in-memory stores from a JSON seed file.
///
/// Seeded deadlines pass the same checks as operator-created ones. A completed record without
/// `erledigtAm` is stamped with its creation time.
pub fn load_seed(
    path: impl AsRef<Path>,
) -> Result<(InMemoryClientStore, InMemoryDeadlineStore), SeedError> {
    let raw = fs::read_to_string(path)?;
    let document: SeedDocument = serde_json::from_str(&raw)?;

    let clients = InMemoryClientStore::with_clients(document.clients);
    let deadlines = InMemoryDeadlineStore::default();
    for (index, seed) in document.deadlines.into_iter().enumerate() {
        let completed_at = validate_seed(&clients, index, &seed)?;
        deadlines.insert(seed.deadline, completed_at)?;
    }

    Ok((clients, deadlines))
}

fn validate_seed(
    clients: &InMemoryClientStore,
    index: usize,
    seed: &SeedDeadline,
) -> Result<Option<NaiveDateTime>, SeedError> {
    let deadline = &seed.deadline;
    match clients.get(deadline.client_id) {
        Ok(_) => {}
        Err(StoreError::ClientNotFound(client)) => {
            return Err(SeedError::UnknownClient { index, client })
        }
        Err(err) => return Err(err.into()),
    }

    if let Some(reminder) = deadline.reminder_date {
        if reminder > deadline.due_date {
            return Err(SeedError::InvalidReminder {
                index,
                reminder,
                due: deadline.due_date,
            });
        }
    }

    match (deadline.status, seed.completed_at) {
        (DeadlineStatus::Completed, completed_at) => {
            Ok(Some(completed_at.unwrap_or(deadline.created_at)))
        }
        (_, None) => Ok(None),
        (status, Some(_)) => Err(SeedError::UnexpectedCompletion { index, status }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casework::domain::DeadlineKind;
    use chrono::NaiveDate;

    fn new_deadline(client: u64) -> NewDeadline {
        NewDeadline {
            client_id: ClientId(client),
            kind: DeadlineKind::Renewal,
            due_date: NaiveDate::from_ymd_opt(2025, 6, 30).expect("valid"),
            reminder_date: None,
            status: DeadlineStatus::Open,
            description: None,
            created_at: NaiveDate::from_ymd_opt(2025, 1, 1)
                .and_then(|date| date.and_hms_opt(8, 0, 0))
                .expect("valid"),
        }
    }

    #[test]
    fn update_rejects_stale_version() {
        let store = InMemoryDeadlineStore::default();
        let id = store.create(new_deadline(1)).expect("create");

        let updated = store
            .update(id, 0, DeadlineUpdate::status(DeadlineStatus::InProgress))
            .expect("first update");
        assert_eq!(updated.version, 1);

        let err = store
            .update(id, 0, DeadlineUpdate::status(DeadlineStatus::Completed))
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::VersionConflict {
                id,
                expected: 0,
                found: 1
            }
        );
        assert_eq!(
            store.get(id).expect("get").status,
            DeadlineStatus::InProgress
        );
    }

    #[test]
    fn ids_are_sequential_and_listing_filters() {
        let store = InMemoryDeadlineStore::default();
        let first = store.create(new_deadline(1)).expect("create");
        let second = store.create(new_deadline(2)).expect("create");
        assert_eq!(first, DeadlineId(1));
        assert_eq!(second, DeadlineId(2));

        assert_eq!(store.list_by_client(ClientId(2)).expect("list").len(), 1);
        assert_eq!(
            store
                .list_by_status(DeadlineStatus::Open)
                .expect("list")
                .len(),
            2
        );

        store.delete(first).expect("delete");
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.delete(first),
            Err(StoreError::DeadlineNotFound(first))
        );
    }

    #[test]
    fn client_listing_respects_active_flag() {
        let mut inactive = Client::new(ClientId(2), "Alt", "Otto");
        inactive.active = false;
        let store = InMemoryClientStore::with_clients([
            Client::new(ClientId(1), "Beispiel", "Maria"),
            inactive,
        ]);

        assert_eq!(store.list(true).expect("list").len(), 1);
        assert_eq!(store.list(false).expect("list").len(), 2);
        assert_eq!(
            store.get(ClientId(9)),
            Err(StoreError::ClientNotFound(ClientId(9)))
        );
    }

    fn write_seed(dir: &Path, fristen: serde_json::Value) -> std::path::PathBuf {
        let path = dir.join("seed.json");
        fs::write(
            &path,
            serde_json::json!({
                "klienten": [
                    { "id": 1, "familienname": "Beispiel", "vorname": "Maria" }
                ],
                "fristen": fristen
            })
            .to_string(),
        )
        .expect("write seed");
        path
    }

    #[test]
    fn seed_file_populates_both_stores() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_seed(
            dir.path(),
            serde_json::json!([
                {
                    "klientId": 1,
                    "typ": "WOHNGELD_WEITERBEWILLIGUNG",
                    "faelligAm": "2025-06-30",
                    "status": "OFFEN",
                    "beschreibung": "Weiterbewilligung 2025",
                    "erstelltAm": "2025-01-01T08:00:00"
                },
                {
                    "id": 17,
                    "klientId": 1,
                    "typ": "WOHNGELD_ERSTANTRAG",
                    "faelligAm": "2024-06-30",
                    "erinnerungAm": "2024-06-16",
                    "status": "ERLEDIGT",
                    "erstelltAm": "2024-01-02T09:00:00",
                    "version": 4
                }
            ]),
        );

        let (clients, deadlines) = load_seed(&path).expect("seed loads");
        assert_eq!(clients.list(true).expect("list").len(), 1);
        assert_eq!(deadlines.len(), 2);

        let open = deadlines.get(DeadlineId(1)).expect("first");
        assert_eq!(open.description.as_deref(), Some("Weiterbewilligung 2025"));
        assert_eq!(open.completed_at, None);

        let completed = deadlines.get(DeadlineId(2)).expect("second");
        assert_eq!(completed.status, DeadlineStatus::Completed);
        assert_eq!(completed.completed_at, Some(completed.created_at));
        assert_eq!(completed.version, 0);
    }

    #[test]
    fn seed_keeps_explicit_completion_time() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_seed(
            dir.path(),
            serde_json::json!([{
                "klientId": 1,
                "typ": "WOHNGELD_ERHOEHUNG",
                "faelligAm": "2024-09-30",
                "status": "ERLEDIGT",
                "erstelltAm": "2024-01-02T09:00:00",
                "erledigtAm": "2024-09-12T11:30:00"
            }]),
        );

        let (_, deadlines) = load_seed(&path).expect("seed loads");
        let completed_at = NaiveDate::from_ymd_opt(2024, 9, 12)
            .and_then(|date| date.and_hms_opt(11, 30, 0));
        assert_eq!(
            deadlines.get(DeadlineId(1)).expect("deadline").completed_at,
            completed_at
        );
    }

    #[test]
    fn seed_rejects_deadlines_lifecycle_would_refuse() {
        let dir = tempfile::tempdir().expect("tempdir");

        let unknown_client = write_seed(
            dir.path(),
            serde_json::json!([{
                "klientId": 99,
                "typ": "WOHNGELD_WEITERBEWILLIGUNG",
                "faelligAm": "2025-01-10",
                "status": "OFFEN",
                "erstelltAm": "2025-01-01T08:00:00"
            }]),
        );
        assert!(matches!(
            load_seed(&unknown_client),
            Err(SeedError::UnknownClient {
                index: 0,
                client: ClientId(99)
            })
        ));

        let late_reminder = write_seed(
            dir.path(),
            serde_json::json!([{
                "klientId": 1,
                "typ": "WOHNGELD_WEITERBEWILLIGUNG",
                "faelligAm": "2025-01-10",
                "erinnerungAm": "2025-02-01",
                "status": "ERLEDIGT",
                "erstelltAm": "2025-01-01T08:00:00"
            }]),
        );
        assert!(matches!(
            load_seed(&late_reminder),
            Err(SeedError::InvalidReminder { index: 0, .. })
        ));

        let pending_with_completion = write_seed(
            dir.path(),
            serde_json::json!([{
                "klientId": 1,
                "typ": "WOHNGELD_WEITERBEWILLIGUNG",
                "faelligAm": "2025-01-10",
                "status": "IN_BEARBEITUNG",
                "erstelltAm": "2025-01-01T08:00:00",
                "erledigtAm": "2025-01-05T08:00:00"
            }]),
        );
        assert!(matches!(
            load_seed(&pending_with_completion),
            Err(SeedError::UnexpectedCompletion {
                index: 0,
                status: DeadlineStatus::InProgress
            })
        ));
    }
}
