use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::super::domain::{Client, ClientId, DeadlineKind};
use super::form::{normalize_slot_name, FormFieldMapper, FormValue};

/// Document renderer behind the draft orchestrator. Implementations may block.
pub trait DocumentTemplateEngine: Send + Sync {
    fn fill(&self, client: &Client, kind: DeadlineKind) -> Result<RenderedDraft, TemplateError>;

    /// Slots the current template exposes. Engines that cannot list them report none.
    fn slots(&self) -> Result<Vec<TemplateSlot>, TemplateError> {
        Ok(Vec::new())
    }
}

/// One slot of the template and whether client data can ever reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSlot {
    pub name: String,
    #[serde(rename = "zugeordnet")]
    pub mapped: bool,
}

/// What the engine produced. `fields_found` counts template slots, `fields_filled` the slots
/// that actually received a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDraft {
    pub output_path: String,
    pub filename: String,
    pub fields_found: usize,
    pub fields_filled: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("document template {0} not found")]
    TemplateMissing(String),
    #[error("unable to render document: {0}")]
    Render(String),
}

#[derive(Debug, Deserialize)]
struct TemplateManifest {
    fields: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DraftDocument<'a> {
    dokument_typ: DeadlineKind,
    klient_id: ClientId,
    erstellt_am: NaiveDateTime,
    vorlage: String,
    felder: BTreeMap<&'a str, &'a FormValue>,
    leere_felder: Vec<&'a str>,
}

/// Fills the slots listed in a JSON template manifest and writes the draft as JSON.
#[derive(Debug, Clone)]
pub struct ManifestTemplateEngine {
    template: PathBuf,
    output_dir: PathBuf,
    mapper: FormFieldMapper,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl ManifestTemplateEngine {
    pub fn new(template: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
            output_dir: output_dir.into(),
            mapper: FormFieldMapper,
            clock: local_now,
        }
    }

    /// Replace the timestamp source used for output file names.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn load_manifest(&self) -> Result<TemplateManifest, TemplateError> {
        if !self.template.is_file() {
            return Err(TemplateError::TemplateMissing(
                self.template.display().to_string(),
            ));
        }
        let raw = fs::read_to_string(&self.template).map_err(|err| {
            TemplateError::Render(format!("reading {}: {err}", self.template.display()))
        })?;
        serde_json::from_str(&raw).map_err(|err| {
            TemplateError::Render(format!("parsing {}: {err}", self.template.display()))
        })
    }

    fn output_path(&self, client: &Client, created_at: NaiveDateTime) -> (PathBuf, String) {
        let mut name = normalize_slot_name(client.last_name.trim());
        if name.is_empty() {
            name = "unbekannt".to_string();
        }
        let filename = format!(
            "wohngeldantrag_{}_{}.json",
            name,
            created_at.format("%Y%m%d_%H%M%S")
        );
        (self.output_dir.join(&filename), filename)
    }
}

impl DocumentTemplateEngine for ManifestTemplateEngine {
    fn fill(&self, client: &Client, kind: DeadlineKind) -> Result<RenderedDraft, TemplateError> {
        let manifest = self.load_manifest()?;
        let values = self.mapper.map(client, kind);
        let by_normalized: HashMap<String, &FormValue> = values
            .iter()
            .map(|(name, value)| (normalize_slot_name(name), value))
            .collect();

        let mut felder = BTreeMap::new();
        let mut leere_felder = Vec::new();
        for slot in &manifest.fields {
            let value = values
                .get(slot)
                .or_else(|| by_normalized.get(&normalize_slot_name(slot)).copied());
            match value {
                Some(value) if value.is_filled() => {
                    felder.insert(slot.as_str(), value);
                }
                _ => leere_felder.push(slot.as_str()),
            }
        }

        let created_at = (self.clock)();
        let (path, filename) = self.output_path(client, created_at);
        let fields_found = manifest.fields.len();
        let fields_filled = felder.len();

        let document = DraftDocument {
            dokument_typ: kind,
            klient_id: client.id,
            erstellt_am: created_at,
            vorlage: self.template.display().to_string(),
            felder,
            leere_felder,
        };
        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|err| TemplateError::Render(err.to_string()))?;

        fs::create_dir_all(&self.output_dir).map_err(|err| {
            TemplateError::Render(format!("creating {}: {err}", self.output_dir.display()))
        })?;
        fs::write(&path, bytes)
            .map_err(|err| TemplateError::Render(format!("writing {}: {err}", path.display())))?;

        debug!(slots = values.len(), "form mapping prepared");
        info!(
            file = %filename,
            fields_found,
            fields_filled,
            "draft document written"
        );

        Ok(RenderedDraft {
            output_path: path.display().to_string(),
            filename,
            fields_found,
            fields_filled,
        })
    }

    fn slots(&self) -> Result<Vec<TemplateSlot>, TemplateError> {
        let manifest = self.load_manifest()?;
        let known = self.mapper.known_slots();
        Ok(manifest
            .fields
            .into_iter()
            .map(|name| {
                let mapped = known.contains(&normalize_slot_name(&name));
                TemplateSlot { name, mapped }
            })
            .collect())
    }
}
