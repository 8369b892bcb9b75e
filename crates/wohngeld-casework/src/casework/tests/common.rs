use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::casework::domain::{
    Client, ClientId, Deadline, DeadlineId, DeadlineKind, DeadlineStatus, NewDeadline,
};
use crate::casework::drafting::{DocumentTemplateEngine, RenderedDraft, TemplateError};
use crate::casework::lifecycle::{CreateDeadline, DeadlineLifecycleManager, LifecycleConfig};
use crate::casework::memory::{InMemoryClientStore, InMemoryDeadlineStore};
use crate::casework::service::CaseworkService;
use crate::casework::store::{ClientStore, DeadlineStore, DeadlineUpdate, StoreError};

pub(super) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub(super) fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(10, 15, 0).expect("valid time")
}

/// Client with every field the standard rules ask for, heating included in the rent.
pub(super) fn complete_client(id: u64) -> Client {
    let mut client = Client::new(ClientId(id), "Beispiel", "Maria");
    client.birth_date = Some(date(1962, 5, 23));
    client.nationality = Some("deutsch".to_string());
    client.marital_status = Some("verwitwet".to_string());
    client.gender = Some("weiblich".to_string());
    client.employment_status = Some("Rentnerin".to_string());
    client.phone = Some("0331 123456".to_string());
    client.street = "Heilig-Geist-Straße".to_string();
    client.house_number = "3".to_string();
    client.postal_code = "14467".to_string();
    client.city = "Potsdam".to_string();
    client.living_area_sqm = Some(54.5);
    client.tenancy = Some("Hauptmieter".to_string());
    client.moved_in_on = Some(date(2011, 4, 1));
    client.landlord_name = Some("Pro Potsdam GmbH".to_string());
    client.total_rent = Some(463.25);
    client.heating_included = Some(true);
    client.hot_water_included = Some(true);
    client.income_type = Some("Altersrente".to_string());
    client.gross_income = Some(1124.0);
    client.income_frequency = Some("monatlich".to_string());
    client.pays_health_care_insurance = Some(true);
    client.iban = Some("DE89 3704 0044 0532 0130 00".to_string());
    client.bank_name = Some("Mittelbrandenburgische Sparkasse".to_string());
    client.account_holder = Some("Maria Beispiel".to_string());
    client.disability_or_care = Some(false);
    client.benefit_number = Some("WG-2024-0815".to_string());
    client
}

/// Client holding only the identity and address core.
pub(super) fn sparse_client(id: u64) -> Client {
    let mut client = Client::new(ClientId(id), "Neumann", "Jonas");
    client.street = "Breite Straße".to_string();
    client.house_number = "12a".to_string();
    client.postal_code = "14467".to_string();
    client.city = "Potsdam".to_string();
    client
}

pub(super) fn stores(
    clients: impl IntoIterator<Item = Client>,
) -> (Arc<InMemoryClientStore>, Arc<InMemoryDeadlineStore>) {
    (
        Arc::new(InMemoryClientStore::with_clients(clients)),
        Arc::new(InMemoryDeadlineStore::default()),
    )
}

pub(super) fn manager<D: DeadlineStore + 'static>(
    clients: Arc<InMemoryClientStore>,
    deadlines: Arc<D>,
) -> DeadlineLifecycleManager<InMemoryClientStore, D> {
    DeadlineLifecycleManager::new(clients, deadlines, &LifecycleConfig::default())
}

pub(super) fn create_request(
    client: u64,
    kind: DeadlineKind,
    due: NaiveDate,
    reminder: Option<NaiveDate>,
) -> CreateDeadline {
    CreateDeadline {
        client_id: ClientId(client),
        kind,
        due_date: due,
        reminder_date: reminder,
        description: None,
    }
}

/// Insert a deadline directly, bypassing operator validation.
pub(super) fn insert_deadline(
    store: &InMemoryDeadlineStore,
    client: u64,
    kind: DeadlineKind,
    due: NaiveDate,
    status: DeadlineStatus,
) -> DeadlineId {
    store
        .create(NewDeadline {
            client_id: ClientId(client),
            kind,
            due_date: due,
            reminder_date: None,
            status,
            description: None,
            created_at: at(2024, 11, 1),
        })
        .expect("insert deadline")
}

/// Stub engine counting invocations.
pub(super) struct RecordingEngine {
    calls: AtomicUsize,
    outcome: Result<RenderedDraft, TemplateError>,
}

impl RecordingEngine {
    pub(super) fn succeeding() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            outcome: Ok(RenderedDraft {
                output_path: "output/wohngeldantrag_Beispiel_20250301_101500.json".to_string(),
                filename: "wohngeldantrag_Beispiel_20250301_101500.json".to_string(),
                fields_found: 120,
                fields_filled: 87,
            }),
        }
    }

    pub(super) fn failing(error: TemplateError) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            outcome: Err(error),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DocumentTemplateEngine for RecordingEngine {
    fn fill(&self, _client: &Client, _kind: DeadlineKind) -> Result<RenderedDraft, TemplateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Deadline store that loses the next `conflicts` writes to an invisible competitor.
pub(super) struct FlakyDeadlineStore {
    inner: InMemoryDeadlineStore,
    conflicts: Mutex<u32>,
    attempts: AtomicUsize,
}

impl FlakyDeadlineStore {
    pub(super) fn new(inner: InMemoryDeadlineStore, conflicts: u32) -> Self {
        Self {
            inner,
            conflicts: Mutex::new(conflicts),
            attempts: AtomicUsize::new(0),
        }
    }

    pub(super) fn update_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl DeadlineStore for FlakyDeadlineStore {
    fn get(&self, id: DeadlineId) -> Result<Deadline, StoreError> {
        self.inner.get(id)
    }

    fn list_by_client(&self, client_id: ClientId) -> Result<Vec<Deadline>, StoreError> {
        self.inner.list_by_client(client_id)
    }

    fn list_by_status(&self, status: DeadlineStatus) -> Result<Vec<Deadline>, StoreError> {
        self.inner.list_by_status(status)
    }

    fn create(&self, deadline: NewDeadline) -> Result<DeadlineId, StoreError> {
        self.inner.create(deadline)
    }

    fn update(
        &self,
        id: DeadlineId,
        expected_version: u64,
        update: DeadlineUpdate,
    ) -> Result<Deadline, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let mut conflicts = self.conflicts.lock().expect("conflict mutex poisoned");
        if *conflicts > 0 {
            *conflicts -= 1;
            return Err(StoreError::VersionConflict {
                id,
                expected: expected_version,
                found: expected_version + 1,
            });
        }
        drop(conflicts);
        self.inner.update(id, expected_version, update)
    }

    fn delete(&self, id: DeadlineId) -> Result<(), StoreError> {
        self.inner.delete(id)
    }
}

/// Deadline store whose inserts fail while reads and updates keep working.
pub(super) struct InsertFailingDeadlineStore {
    inner: InMemoryDeadlineStore,
}

impl InsertFailingDeadlineStore {
    pub(super) fn new(inner: InMemoryDeadlineStore) -> Self {
        Self { inner }
    }
}

impl DeadlineStore for InsertFailingDeadlineStore {
    fn get(&self, id: DeadlineId) -> Result<Deadline, StoreError> {
        self.inner.get(id)
    }

    fn list_by_client(&self, client_id: ClientId) -> Result<Vec<Deadline>, StoreError> {
        self.inner.list_by_client(client_id)
    }

    fn list_by_status(&self, status: DeadlineStatus) -> Result<Vec<Deadline>, StoreError> {
        self.inner.list_by_status(status)
    }

    fn create(&self, _deadline: NewDeadline) -> Result<DeadlineId, StoreError> {
        Err(StoreError::Unavailable("deadline table is read-only".to_string()))
    }

    fn update(
        &self,
        id: DeadlineId,
        expected_version: u64,
        update: DeadlineUpdate,
    ) -> Result<Deadline, StoreError> {
        self.inner.update(id, expected_version, update)
    }

    fn delete(&self, id: DeadlineId) -> Result<(), StoreError> {
        self.inner.delete(id)
    }
}

pub(super) struct UnavailableClients;

impl ClientStore for UnavailableClients {
    fn get(&self, _id: ClientId) -> Result<Client, StoreError> {
        Err(StoreError::Unavailable("client database offline".to_string()))
    }

    fn list(&self, _active_only: bool) -> Result<Vec<Client>, StoreError> {
        Err(StoreError::Unavailable("client database offline".to_string()))
    }
}

pub(super) fn fixed_now() -> NaiveDateTime {
    at(2025, 1, 6)
}

pub(super) type TestService = CaseworkService<InMemoryClientStore, InMemoryDeadlineStore, RecordingEngine>;

pub(super) fn build_service(
    clients: impl IntoIterator<Item = Client>,
    engine: RecordingEngine,
) -> (Arc<TestService>, Arc<InMemoryDeadlineStore>, Arc<RecordingEngine>) {
    let (clients, deadlines) = stores(clients);
    let engine = Arc::new(engine);
    let service = CaseworkService::new(
        clients,
        Arc::clone(&deadlines),
        Arc::clone(&engine),
        &LifecycleConfig::default(),
    )
    .with_clock(fixed_now);
    (Arc::new(service), deadlines, engine)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
