use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;

use super::dashboard::{most_relevant_kind, DashboardAggregator};
use super::domain::{Client, ClientId, Deadline, DeadlineKind};
use super::drafting::{ApplicationDraftOrchestrator, DocumentTemplateEngine};
use super::lifecycle::{DeadlineLifecycleManager, LifecycleConfig, LifecycleError};
use super::readiness::{ReadinessEvaluator, ReadinessVerdict, RuleSet};
use super::store::{ClientStore, DeadlineStore, StoreError};

/// Client record together with its deadlines, as shown on the case detail page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientDetail {
    #[serde(flatten)]
    pub client: Client,
    #[serde(rename = "fristen")]
    pub deadlines: Vec<Deadline>,
}

/// Facade bundling the casework components over one pair of stores.
pub struct CaseworkService<C, D, E> {
    clients: Arc<C>,
    lifecycle: Arc<DeadlineLifecycleManager<C, D>>,
    evaluator: Arc<ReadinessEvaluator>,
    drafts: ApplicationDraftOrchestrator<C, D, E>,
    dashboard: DashboardAggregator<C, D>,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl<C, D, E> CaseworkService<C, D, E>
where
    C: ClientStore + 'static,
    D: DeadlineStore + 'static,
    E: DocumentTemplateEngine + 'static,
{
    pub fn new(clients: Arc<C>, deadlines: Arc<D>, engine: Arc<E>, config: &LifecycleConfig) -> Self {
        Self::with_rules(clients, deadlines, engine, config, RuleSet::standard())
    }

    pub fn with_rules(
        clients: Arc<C>,
        deadlines: Arc<D>,
        engine: Arc<E>,
        config: &LifecycleConfig,
        rules: RuleSet,
    ) -> Self {
        let evaluator = Arc::new(ReadinessEvaluator::new(rules));
        let lifecycle = Arc::new(DeadlineLifecycleManager::new(
            Arc::clone(&clients),
            Arc::clone(&deadlines),
            config,
        ));
        let drafts = ApplicationDraftOrchestrator::new(
            Arc::clone(&clients),
            Arc::clone(&lifecycle),
            Arc::clone(&evaluator),
            engine,
        );
        let dashboard =
            DashboardAggregator::new(Arc::clone(&clients), deadlines, Arc::clone(&evaluator));

        Self {
            clients,
            lifecycle,
            evaluator,
            drafts,
            dashboard,
            clock: local_now,
        }
    }

    /// Pin the wall clock, mostly for tests and demos.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    pub fn lifecycle(&self) -> &DeadlineLifecycleManager<C, D> {
        &self.lifecycle
    }

    pub fn drafts(&self) -> &ApplicationDraftOrchestrator<C, D, E> {
        &self.drafts
    }

    pub fn dashboard(&self) -> &DashboardAggregator<C, D> {
        &self.dashboard
    }

    pub fn evaluator(&self) -> &ReadinessEvaluator {
        &self.evaluator
    }

    pub fn clients(&self, active_only: bool) -> Result<Vec<Client>, StoreError> {
        self.clients.list(active_only)
    }

    pub fn client_detail(&self, id: ClientId) -> Result<ClientDetail, LifecycleError> {
        let client = self.clients.get(id)?;
        let deadlines = self.lifecycle.list_for_client(id)?;
        Ok(ClientDetail { client, deadlines })
    }

    /// Readiness for `kind`, or for the client's most relevant pending deadline type.
    pub fn check(
        &self,
        id: ClientId,
        kind: Option<DeadlineKind>,
    ) -> Result<(DeadlineKind, ReadinessVerdict), LifecycleError> {
        let client = self.clients.get(id)?;
        let kind = match kind {
            Some(kind) => kind,
            None => most_relevant_kind(&client, &self.lifecycle.list_for_client(id)?),
        };
        Ok((kind, self.evaluator.evaluate(&client, kind)))
    }
}
