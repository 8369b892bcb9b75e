use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use super::domain::{ClientId, DeadlineId, DeadlineKind, DeadlineStatus, InvalidKind};
use super::drafting::{DocumentTemplateEngine, DraftError, DraftRequest, TemplateError};
use super::lifecycle::{CreateDeadline, LifecycleError};
use super::service::CaseworkService;
use super::store::{ClientStore, DeadlineStore, StoreError};

const DEFAULT_DUE_WINDOW_DAYS: u32 = 30;

/// Envelope wrapped around every API payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

/// Failure rendered into the response envelope with a matching status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    data: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status, error = %self.message, "request failed");
        }
        let payload = json!({
            "success": false,
            "message": self.message,
            "data": self.data,
        });
        (self.status, Json(payload)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        let status = match value {
            StoreError::ClientNotFound(_) | StoreError::DeadlineNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            StoreError::VersionConflict { .. } => StatusCode::CONFLICT,
            StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self::new(status, value.to_string())
    }
}

impl From<LifecycleError> for ApiError {
    fn from(value: LifecycleError) -> Self {
        let status = match &value {
            LifecycleError::DeadlineNotFound(_) | LifecycleError::ClientNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            LifecycleError::InvalidStatus(_) | LifecycleError::InvalidReminder { .. } => {
                StatusCode::BAD_REQUEST
            }
            LifecycleError::InvalidTransition { .. }
            | LifecycleError::AlreadyReopened { .. }
            | LifecycleError::VersionConflict { .. } => StatusCode::CONFLICT,
            LifecycleError::Store(store) => return Self::from(store.clone()),
        };
        Self::new(status, value.to_string())
    }
}

impl From<DraftError> for ApiError {
    fn from(value: DraftError) -> Self {
        match value {
            DraftError::ClientNotFound(_) => Self::new(StatusCode::NOT_FOUND, value.to_string()),
            DraftError::NotReady { missing_fields } => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: "Klientendaten sind für diesen Antrag unvollständig".to_string(),
                data: Some(json!({ "fehlendeFelder": missing_fields })),
            },
            DraftError::Template(err) => Self::new(StatusCode::BAD_GATEWAY, err.to_string()),
            DraftError::Store(store) => Self::from(store),
        }
    }
}

impl From<TemplateError> for ApiError {
    fn from(value: TemplateError) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, value.to_string())
    }
}

impl From<InvalidKind> for ApiError {
    fn from(value: InvalidKind) -> Self {
        Self::new(StatusCode::BAD_REQUEST, value.to_string())
    }
}

type SharedService<C, D, E> = Arc<CaseworkService<C, D, E>>;

/// Router exposing dashboard, client and deadline endpoints under `/api`.
pub fn casework_router<C, D, E>(service: SharedService<C, D, E>) -> Router
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
    E: DocumentTemplateEngine + 'static,
{
    Router::new()
        .route("/api/dashboard", get(dashboard_handler::<C, D, E>))
        .route(
            "/api/dashboard/faellige-fristen",
            get(due_deadlines_handler::<C, D, E>),
        )
        .route("/api/klienten", get(clients_handler::<C, D, E>))
        .route("/api/klienten/:id", get(client_handler::<C, D, E>))
        .route("/api/klienten/:id/check", get(check_handler::<C, D, E>))
        .route("/api/klienten/:id/entwurf", post(draft_handler::<C, D, E>))
        .route(
            "/api/vorlage/felder",
            get(template_slots_handler::<C, D, E>),
        )
        .route(
            "/api/fristen",
            post(create_deadline_handler::<C, D, E>),
        )
        .route(
            "/api/fristen/klient/:id",
            get(client_deadlines_handler::<C, D, E>),
        )
        .route(
            "/api/fristen/ueberfaellig",
            get(overdue_handler::<C, D, E>),
        )
        .route(
            "/api/fristen/:id",
            axum::routing::delete(purge_handler::<C, D, E>),
        )
        .route(
            "/api/fristen/:id/status",
            patch(status_handler::<C, D, E>),
        )
        .route(
            "/api/fristen/:id/erledigen",
            post(complete_handler::<C, D, E>),
        )
        .route(
            "/api/fristen/:id/wiedereroeffnen",
            post(reopen_handler::<C, D, E>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct DueWindowQuery {
    tage: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClientListQuery {
    alle: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KindQuery {
    typ: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DraftQuery {
    erstantrag: Option<bool>,
    typ: Option<String>,
    frist_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateDeadlineQuery {
    klient_id: u64,
    typ: String,
    faellig_am: NaiveDate,
    erinnerung_am: Option<NaiveDate>,
    beschreibung: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusQuery {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompleteQuery {
    folgefrist_erstellen: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OverdueQuery {
    klient_id: Option<u64>,
}

fn parse_kind(raw: Option<&str>) -> Result<Option<DeadlineKind>, ApiError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => Ok(Some(value.parse::<DeadlineKind>()?)),
        None => Ok(None),
    }
}

pub(crate) async fn dashboard_handler<C, D, E>(
    State(service): State<SharedService<C, D, E>>,
) -> Result<Response, ApiError>
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
    E: DocumentTemplateEngine + 'static,
{
    let summary = service.dashboard().summary(service.now())?;
    Ok(Json(ApiResponse::ok(summary)).into_response())
}

pub(crate) async fn due_deadlines_handler<C, D, E>(
    State(service): State<SharedService<C, D, E>>,
    Query(query): Query<DueWindowQuery>,
) -> Result<Response, ApiError>
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
    E: DocumentTemplateEngine + 'static,
{
    let days = query.tage.unwrap_or(DEFAULT_DUE_WINDOW_DAYS);
    let due = service.dashboard().due_within(days, service.now())?;
    Ok(Json(ApiResponse::ok(due)).into_response())
}

pub(crate) async fn clients_handler<C, D, E>(
    State(service): State<SharedService<C, D, E>>,
    Query(query): Query<ClientListQuery>,
) -> Result<Response, ApiError>
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
    E: DocumentTemplateEngine + 'static,
{
    let active_only = !query.alle.unwrap_or(false);
    let clients = service.clients(active_only)?;
    Ok(Json(ApiResponse::ok(clients)).into_response())
}

pub(crate) async fn client_handler<C, D, E>(
    State(service): State<SharedService<C, D, E>>,
    Path(id): Path<u64>,
) -> Result<Response, ApiError>
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
    E: DocumentTemplateEngine + 'static,
{
    let detail = service.client_detail(ClientId(id))?;
    Ok(Json(ApiResponse::ok(detail)).into_response())
}

pub(crate) async fn check_handler<C, D, E>(
    State(service): State<SharedService<C, D, E>>,
    Path(id): Path<u64>,
    Query(query): Query<KindQuery>,
) -> Result<Response, ApiError>
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
    E: DocumentTemplateEngine + 'static,
{
    let kind = parse_kind(query.typ.as_deref())?;
    let (kind, verdict) = service.check(ClientId(id), kind)?;
    let message = format!("Vollständigkeit für {}", kind.label());
    Ok(Json(ApiResponse::with_message(message, verdict)).into_response())
}

pub(crate) async fn draft_handler<C, D, E>(
    State(service): State<SharedService<C, D, E>>,
    Path(id): Path<u64>,
    Query(query): Query<DraftQuery>,
) -> Result<Response, ApiError>
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
    E: DocumentTemplateEngine + 'static,
{
    let deadline = query.frist_id.map(DeadlineId);
    let kind = match (parse_kind(query.typ.as_deref())?, deadline) {
        (Some(kind), _) => kind,
        (None, Some(deadline_id)) => service.lifecycle().get(deadline_id)?.kind,
        (None, None) if query.erstantrag.unwrap_or(true) => DeadlineKind::FirstApplication,
        (None, None) => DeadlineKind::Renewal,
    };

    let request = DraftRequest {
        client_id: ClientId(id),
        kind,
        deadline,
    };
    let worker = Arc::clone(&service);
    let result = tokio::task::spawn_blocking(move || worker.drafts().generate_draft(request))
        .await
        .map_err(|err| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let draft = result?;
    let message = format!(
        "Entwurf erstellt ({} von {} Feldern ausgefüllt)",
        draft.fields_filled, draft.fields_found
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(message, draft)),
    )
        .into_response())
}

/// Slots of the configured template, flagging those no client data maps onto.
pub(crate) async fn template_slots_handler<C, D, E>(
    State(service): State<SharedService<C, D, E>>,
) -> Result<Response, ApiError>
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
    E: DocumentTemplateEngine + 'static,
{
    let worker = Arc::clone(&service);
    let slots = tokio::task::spawn_blocking(move || worker.drafts().engine().slots())
        .await
        .map_err(|err| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))??;

    let mapped = slots.iter().filter(|slot| slot.mapped).count();
    let message = format!("{} Felder in der Vorlage, {} zugeordnet", slots.len(), mapped);
    Ok(Json(ApiResponse::with_message(message, slots)).into_response())
}

pub(crate) async fn client_deadlines_handler<C, D, E>(
    State(service): State<SharedService<C, D, E>>,
    Path(id): Path<u64>,
) -> Result<Response, ApiError>
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
    E: DocumentTemplateEngine + 'static,
{
    let deadlines = service.lifecycle().list_for_client(ClientId(id))?;
    Ok(Json(ApiResponse::ok(deadlines)).into_response())
}

pub(crate) async fn create_deadline_handler<C, D, E>(
    State(service): State<SharedService<C, D, E>>,
    Query(query): Query<CreateDeadlineQuery>,
) -> Result<Response, ApiError>
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
    E: DocumentTemplateEngine + 'static,
{
    let kind = query.typ.parse::<DeadlineKind>()?;
    let deadline = service.lifecycle().create(
        CreateDeadline {
            client_id: ClientId(query.klient_id),
            kind,
            due_date: query.faellig_am,
            reminder_date: query.erinnerung_am,
            description: query.beschreibung.filter(|text| !text.trim().is_empty()),
        },
        service.now(),
    )?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Frist angelegt", deadline)),
    )
        .into_response())
}

pub(crate) async fn status_handler<C, D, E>(
    State(service): State<SharedService<C, D, E>>,
    Path(id): Path<u64>,
    Query(query): Query<StatusQuery>,
) -> Result<Response, ApiError>
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
    E: DocumentTemplateEngine + 'static,
{
    let status = query
        .status
        .parse::<DeadlineStatus>()
        .map_err(LifecycleError::from)?;
    let deadline = service
        .lifecycle()
        .set_status(DeadlineId(id), status, service.now())?;
    Ok(Json(ApiResponse::ok(deadline)).into_response())
}

pub(crate) async fn complete_handler<C, D, E>(
    State(service): State<SharedService<C, D, E>>,
    Path(id): Path<u64>,
    Query(query): Query<CompleteQuery>,
) -> Result<Response, ApiError>
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
    E: DocumentTemplateEngine + 'static,
{
    let create_follow_up = query.folgefrist_erstellen.unwrap_or(true);
    let outcome = service
        .lifecycle()
        .complete(DeadlineId(id), create_follow_up, service.now())?;
    let message = match &outcome.follow_up {
        Some(follow_up) => format!(
            "Frist erledigt, Folgefrist zum {} angelegt",
            follow_up.due_date.format("%d.%m.%Y")
        ),
        None if !outcome.warnings.is_empty() => {
            "Frist erledigt, Folgefrist konnte nicht angelegt werden".to_string()
        }
        None => "Frist erledigt".to_string(),
    };
    Ok(Json(ApiResponse::with_message(message, outcome)).into_response())
}

pub(crate) async fn reopen_handler<C, D, E>(
    State(service): State<SharedService<C, D, E>>,
    Path(id): Path<u64>,
) -> Result<Response, ApiError>
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
    E: DocumentTemplateEngine + 'static,
{
    let reopened = service.lifecycle().reopen(DeadlineId(id), service.now())?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Frist wiedereröffnet", reopened)),
    )
        .into_response())
}

pub(crate) async fn purge_handler<C, D, E>(
    State(service): State<SharedService<C, D, E>>,
    Path(id): Path<u64>,
) -> Result<Response, ApiError>
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
    E: DocumentTemplateEngine + 'static,
{
    service.lifecycle().purge(DeadlineId(id))?;
    Ok(Json(ApiResponse::<()>::with_message("Frist gelöscht", ())).into_response())
}

pub(crate) async fn overdue_handler<C, D, E>(
    State(service): State<SharedService<C, D, E>>,
    Query(query): Query<OverdueQuery>,
) -> Result<Response, ApiError>
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
    E: DocumentTemplateEngine + 'static,
{
    let overdue: Vec<_> = service
        .lifecycle()
        .overdue_for(query.klient_id.map(ClientId))?
        .collect();
    Ok(Json(ApiResponse::ok(overdue)).into_response())
}
