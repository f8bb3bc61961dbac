//! Capability orchestrator
//!
//! Drives each capability through validate → fetch → merge, strictly in
//! declaration order, stopping at the first failure. Capabilities that
//! completed before the failure stay merged.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::state::{validate_transition, CapabilityState};
use accrete_capability::{Capability, CapabilityId};
use accrete_composition::{AccretionStore, Contributor};
use accrete_fetch::{ArtifactFetcher, ArtifactSource, FetchOutcome, HttpSource};
use accrete_validation::PreconditionValidator;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What happened to one capability
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityRecord {
    /// Capability id
    pub id: CapabilityId,
    /// Last state reached
    pub state: CapabilityState,
    /// Already contributed on an earlier run
    pub skipped: bool,
    /// Artifact fetch result, if it has an artifact and got that far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch: Option<FetchOutcome>,
    /// Failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CapabilityRecord {
    fn new(id: CapabilityId) -> Self {
        Self {
            id,
            state: CapabilityState::Pending,
            skipped: false,
            fetch: None,
            error: None,
        }
    }

    fn advance(&mut self, to: CapabilityState) -> Result<(), EngineError> {
        validate_transition(self.state, to).map_err(|source| EngineError::State {
            capability: self.id.clone(),
            source,
        })?;
        tracing::debug!(capability = %self.id, from = %self.state, %to, "state transition");
        self.state = to;
        Ok(())
    }

    fn fail(&mut self, error: &EngineError) {
        self.error = Some(error.to_string());
        if validate_transition(self.state, CapabilityState::Failed).is_ok() {
            self.state = CapabilityState::Failed;
        }
    }
}

/// Outcome of one orchestrator run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end, unset while running
    pub finished_at: Option<DateTime<Utc>>,
    /// Capabilities reached, in declaration order
    pub capabilities: Vec<CapabilityRecord>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            capabilities: Vec::new(),
        }
    }
}

impl RunReport {
    /// Record for `id`
    #[must_use]
    pub fn get(&self, id: &CapabilityId) -> Option<&CapabilityRecord> {
        self.capabilities.iter().find(|r| &r.id == id)
    }

    /// Number of capabilities that ended in `state`
    #[must_use]
    pub fn count(&self, state: CapabilityState) -> usize {
        self.capabilities.iter().filter(|r| r.state == state).count()
    }

    /// Number of capabilities skipped as already contributed
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.capabilities.iter().filter(|r| r.skipped).count()
    }

    /// Number of artifacts actually downloaded
    #[must_use]
    pub fn downloads(&self) -> usize {
        self.capabilities
            .iter()
            .filter(|r| r.fetch.as_ref().is_some_and(FetchOutcome::downloaded))
            .count()
    }

    /// Failed capability, if any
    #[must_use]
    pub fn failed(&self) -> Option<&CapabilityRecord> {
        self.capabilities
            .iter()
            .find(|r| r.state == CapabilityState::Failed)
    }
}

/// Sequential validate → fetch → merge driver
#[derive(Debug)]
pub struct CapabilityOrchestrator<S: ArtifactSource> {
    validator: PreconditionValidator,
    fetcher: ArtifactFetcher<S>,
    store: AccretionStore,
    force_refresh: bool,
    report: RunReport,
}

impl CapabilityOrchestrator<HttpSource> {
    /// Build orchestrator with an HTTP source from engine configuration
    ///
    /// # Errors
    /// Returns [`EngineError::Setup`] if the HTTP client cannot be built
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let source = HttpSource::new(config.http_timeout(), &config.user_agent)
            .map_err(EngineError::Setup)?;
        Ok(Self::with_config(source, config))
    }
}

impl<S: ArtifactSource> CapabilityOrchestrator<S> {
    /// Create orchestrator around a fetcher
    #[must_use]
    pub fn new(fetcher: ArtifactFetcher<S>) -> Self {
        Self {
            validator: PreconditionValidator::new(),
            fetcher,
            store: AccretionStore::new(),
            force_refresh: false,
            report: RunReport::default(),
        }
    }

    /// Create orchestrator for `source` configured by `config`
    #[must_use]
    pub fn with_config(source: S, config: &EngineConfig) -> Self {
        let fetcher = ArtifactFetcher::new(source, config.extension_dir.clone())
            .with_default_owner(config.service_uid, config.service_gid)
            .with_default_mode(config.artifact_mode);
        Self::new(fetcher).with_force_refresh(config.force_refresh)
    }

    /// Start from a previously accreted store
    #[must_use]
    pub fn with_store(mut self, store: AccretionStore) -> Self {
        self.store = store;
        self
    }

    /// Force every artifact to be re-downloaded
    #[must_use]
    pub fn with_force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    /// Process capabilities in declaration order
    ///
    /// # Errors
    /// Returns the first [`EngineError`]. Capabilities before the failing
    /// one remain merged; later ones are not touched.
    pub async fn run(&mut self, capabilities: &[Capability]) -> Result<&AccretionStore, EngineError> {
        self.report = RunReport::default();
        tracing::info!(capabilities = capabilities.len(), "accretion run started");

        for capability in capabilities {
            let mut record = CapabilityRecord::new(capability.id.clone());
            let result = self.process(capability, &mut record).await;

            if let Err(error) = result {
                tracing::error!(capability = %capability.id, %error, "capability failed");
                record.fail(&error);
                self.report.capabilities.push(record);
                self.report.finished_at = Some(Utc::now());
                return Err(error);
            }

            self.report.capabilities.push(record);
        }

        self.report.finished_at = Some(Utc::now());
        tracing::info!(
            done = self.report.count(CapabilityState::Done),
            skipped = self.report.skipped(),
            disabled = self.report.count(CapabilityState::Disabled),
            downloads = self.report.downloads(),
            "accretion run finished"
        );
        Ok(&self.store)
    }

    async fn process(
        &mut self,
        capability: &Capability,
        record: &mut CapabilityRecord,
    ) -> Result<(), EngineError> {
        if !capability.enabled {
            record.advance(CapabilityState::Disabled)?;
            tracing::info!(capability = %capability.id, "capability disabled");
            return Ok(());
        }

        let request = capability
            .artifact
            .as_ref()
            .map(|spec| self.fetcher.request_for(spec, self.force_refresh));

        // An artifact that is missing, stale or has drifted attributes sends an
        // already contributed capability through fetch again
        if self.store.has_contributed(&capability.id) {
            let artifact_ready = match &request {
                None => true,
                Some(request) => matches!(self.fetcher.is_present(request).await, Ok(true)),
            };
            if artifact_ready {
                record.skipped = true;
                record.advance(CapabilityState::Done)?;
                tracing::info!(capability = %capability.id, "already contributed, skipping");
                return Ok(());
            }
        }

        record.advance(CapabilityState::Validating)?;
        self.validator.validate(capability)?;

        record.advance(CapabilityState::Fetching)?;
        if let Some(request) = &request {
            let outcome = self
                .fetcher
                .fetch(request)
                .await
                .map_err(|source| EngineError::fetch(&capability.id, source))?;
            record.fetch = Some(outcome);
        }

        record.advance(CapabilityState::Merging)?;
        let outcome = self
            .store
            .merge(&Contributor::from(capability), &capability.contributions)?;

        record.advance(CapabilityState::Done)?;
        tracing::info!(capability = %capability.id, ?outcome, "capability accreted");
        Ok(())
    }

    /// Report of the last run
    #[inline]
    #[must_use]
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Current store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &AccretionStore {
        &self.store
    }

    /// Consume orchestrator, keeping the store
    #[must_use]
    pub fn into_store(self) -> AccretionStore {
        self.store
    }
}
