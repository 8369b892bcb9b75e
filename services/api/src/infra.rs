use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;
use wohngeld_casework::casework::{
    load_seed, CaseworkService, InMemoryClientStore, InMemoryDeadlineStore,
    ManifestTemplateEngine,
};
use wohngeld_casework::config::AppConfig;
use wohngeld_casework::error::AppError;

pub(crate) type Casework =
    CaseworkService<InMemoryClientStore, InMemoryDeadlineStore, ManifestTemplateEngine>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    /// Only files directly inside this directory are served as drafts.
    pub(crate) output_dir: Arc<PathBuf>,
}

/// Empty stores, or stores populated from the configured seed document.
pub(crate) fn load_stores(
    seed: Option<&Path>,
) -> Result<(InMemoryClientStore, InMemoryDeadlineStore), AppError> {
    match seed {
        Some(path) => {
            let (clients, deadlines) = load_seed(path)?;
            info!(path = %path.display(), deadlines = deadlines.len(), "seed data loaded");
            Ok((clients, deadlines))
        }
        None => Ok((
            InMemoryClientStore::default(),
            InMemoryDeadlineStore::default(),
        )),
    }
}

pub(crate) fn build_casework(
    config: &AppConfig,
    clients: InMemoryClientStore,
    deadlines: InMemoryDeadlineStore,
) -> Casework {
    let engine =
        ManifestTemplateEngine::new(&config.drafting.template, &config.drafting.output_dir);
    CaseworkService::new(
        Arc::new(clients),
        Arc::new(deadlines),
        Arc::new(engine),
        &config.lifecycle,
    )
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Accept a bare file name; anything that could walk out of the output directory is refused.
pub(crate) fn safe_file_name(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let acceptable = !trimmed.is_empty()
        && !trimmed.starts_with('.')
        && !trimmed.contains(['/', '\\', '\0'])
        && !trimmed.contains("..");
    acceptable.then_some(trimmed)
}
