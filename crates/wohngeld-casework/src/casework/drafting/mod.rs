//! Draft generation: readiness gate, document engine call, best-effort path recording.

mod engine;
mod form;

pub use engine::{
    DocumentTemplateEngine, ManifestTemplateEngine, RenderedDraft, TemplateError, TemplateSlot,
};
pub use form::{normalize_slot_name, FormFieldMapper, FormValue};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{ClientId, DeadlineId, DeadlineKind};
use super::lifecycle::DeadlineLifecycleManager;
use super::readiness::ReadinessEvaluator;
use super::store::{ClientStore, DeadlineStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRequest {
    pub client_id: ClientId,
    pub kind: DeadlineKind,
    /// Deadline the draft belongs to; its path is recorded there when set.
    pub deadline: Option<DeadlineId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftResult {
    pub output_path: String,
    pub filename: String,
    pub fields_found: usize,
    pub fields_filled: usize,
    #[serde(rename = "warnungen")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("client {0} not found")]
    ClientNotFound(ClientId),
    #[error("client data incomplete: {}", missing_fields.join(", "))]
    NotReady { missing_fields: Vec<String> },
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for DraftError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::ClientNotFound(id) => Self::ClientNotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Coordinates the readiness check and the document engine.
pub struct ApplicationDraftOrchestrator<C, D, E> {
    clients: Arc<C>,
    lifecycle: Arc<DeadlineLifecycleManager<C, D>>,
    evaluator: Arc<ReadinessEvaluator>,
    engine: Arc<E>,
}

impl<C, D, E> ApplicationDraftOrchestrator<C, D, E>
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
    E: DocumentTemplateEngine + 'static,
{
    pub fn new(
        clients: Arc<C>,
        lifecycle: Arc<DeadlineLifecycleManager<C, D>>,
        evaluator: Arc<ReadinessEvaluator>,
        engine: Arc<E>,
    ) -> Self {
        Self {
            clients,
            lifecycle,
            evaluator,
            engine,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Render a draft for a ready client. Never calls the engine for an incomplete record.
    ///
    /// The engine runs without any deadline held; recording the path on the deadline happens
    /// afterwards and only degrades to a warning when it fails.
    pub fn generate_draft(&self, request: DraftRequest) -> Result<DraftResult, DraftError> {
        let client = self.clients.get(request.client_id)?;

        let verdict = self.evaluator.evaluate(&client, request.kind);
        if !verdict.ready {
            info!(
                client = %client.id,
                kind = %request.kind,
                missing = verdict.missing_fields.len(),
                "draft refused, client data incomplete"
            );
            return Err(DraftError::NotReady {
                missing_fields: verdict.missing_fields,
            });
        }

        let rendered = self.engine.fill(&client, request.kind)?;
        let mut warnings = verdict.warnings;

        if rendered.fields_found > 0 && rendered.fields_filled == 0 {
            warnings.push("Vorlage enthält keine zuordenbaren Felder".to_string());
        }

        if let Some(deadline_id) = request.deadline {
            if let Some(warning) =
                self.record_path(deadline_id, client.id, &rendered.output_path)
            {
                warnings.push(warning);
            }
        }

        Ok(DraftResult {
            output_path: rendered.output_path,
            filename: rendered.filename,
            fields_found: rendered.fields_found,
            fields_filled: rendered.fields_filled,
            warnings,
        })
    }

    fn record_path(&self, deadline_id: DeadlineId, client_id: ClientId, path: &str) -> Option<String> {
        let outcome = self.lifecycle.get(deadline_id).and_then(|deadline| {
            if deadline.client_id != client_id {
                return Ok(Some(format!(
                    "Frist #{deadline_id} gehört nicht zu Klient #{client_id}, Pfad nicht gespeichert"
                )));
            }
            self.lifecycle
                .record_draft_path(deadline_id, path)
                .map(|_| None)
        });

        match outcome {
            Ok(warning) => warning,
            Err(err) => {
                warn!(deadline = %deadline_id, error = %err, "unable to record draft path");
                Some(format!(
                    "Pfad des Entwurfs konnte nicht an Frist #{deadline_id} gespeichert werden: {err}"
                ))
            }
        }
    }
}
