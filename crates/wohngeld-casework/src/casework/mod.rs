//! Housing-benefit casework: deadline lifecycle, readiness checks, draft generation and the
//! dashboard rollup, plus the store contracts they run against.

pub mod dashboard;
pub mod domain;
pub mod drafting;
pub mod lifecycle;
pub mod memory;
pub mod readiness;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use dashboard::{most_relevant_kind, DashboardAggregator, DashboardSummary};
pub use domain::{
    Client, ClientId, Deadline, DeadlineId, DeadlineKind, DeadlineStatus, InvalidKind,
    InvalidStatus, NewDeadline,
};
pub use drafting::{
    ApplicationDraftOrchestrator, DocumentTemplateEngine, DraftError, DraftRequest, DraftResult,
    FormFieldMapper, FormValue, ManifestTemplateEngine, RenderedDraft, TemplateError, TemplateSlot,
};
pub use lifecycle::{
    evaluate_time_driven, CompletionOutcome, CreateDeadline, DeadlineLifecycleManager,
    FollowUpPolicy, LifecycleConfig, LifecycleError, SweepReport,
};
pub use memory::{
    load_seed, InMemoryClientStore, InMemoryDeadlineStore, SeedDeadline, SeedDocument, SeedError,
};
pub use readiness::{ClientField, FieldRule, ReadinessEvaluator, ReadinessVerdict, RuleSet};
pub use router::{casework_router, ApiError, ApiResponse};
pub use service::{CaseworkService, ClientDetail};
pub use store::{ClientStore, DeadlineStore, DeadlineUpdate, StoreError};
