use crate::infra::{safe_file_name, AppState, Casework};
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use serde_json::json;
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::debug;
use wohngeld_casework::casework::{casework_router, ApiError};

pub(crate) fn with_casework_routes(service: Arc<Casework>) -> axum::Router {
    casework_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/entwuerfe/:filename",
            axum::routing::get(draft_download_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Serve a generated draft from the output directory.
pub(crate) async fn draft_download_endpoint(
    Extension(state): Extension<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let Some(name) = safe_file_name(&filename) else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("ungültiger Dateiname '{filename}'"),
        ));
    };

    let path = state.output_dir.join(name);
    let content_type = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();
    let disposition = format!("attachment; filename=\"{name}\"");

    let read_path = path.clone();
    let bytes = tokio::task::spawn_blocking(move || std::fs::read(read_path))
        .await
        .map_err(|err| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .map_err(|err| match err.kind() {
            ErrorKind::NotFound => {
                ApiError::new(StatusCode::NOT_FOUND, format!("Entwurf '{name}' nicht gefunden"))
            }
            _ => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        })?;

    debug!(file = %path.display(), size = bytes.len(), "draft downloaded");
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
