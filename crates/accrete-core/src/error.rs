//! Error types for the orchestrator
//!
//! Every stage error rolls up into [`EngineError`]. None is recovered
//! locally: the first error aborts the run.

use crate::manifest::ManifestError;
use crate::state::IllegalTransition;
use accrete_capability::CapabilityId;
use accrete_composition::MergeError;
use accrete_fetch::{FetchError, FetchErrorKind};
use accrete_validation::ValidationError;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Required setting missing or malformed
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Artifact could not be placed
    #[error("capability '{capability}': artifact fetch failed: {source}")]
    Fetch {
        /// Capability whose artifact failed
        capability: CapabilityId,
        /// Underlying error
        #[source]
        source: FetchError,
    },

    /// Contributions conflict with an earlier capability
    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    /// Manifest unreadable or inconsistent
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Engine could not be set up
    #[error("engine setup failed: {0}")]
    Setup(#[source] FetchError),

    /// Lifecycle violated
    #[error("capability '{capability}': {source}")]
    State {
        /// Capability being processed
        capability: CapabilityId,
        /// Rejected transition
        #[source]
        source: IllegalTransition,
    },
}

impl EngineError {
    /// Create fetch error for `capability`
    #[inline]
    pub fn fetch(capability: &CapabilityId, source: FetchError) -> Self {
        Self::Fetch {
            capability: capability.clone(),
            source,
        }
    }

    /// Capability the error is attributed to
    #[must_use]
    pub fn capability(&self) -> Option<&CapabilityId> {
        match self {
            Self::Validation(e) => Some(&e.capability),
            Self::Fetch { capability, .. } | Self::State { capability, .. } => Some(capability),
            Self::Merge(e) => Some(e.incoming_owner()),
            Self::Manifest(ManifestError::DuplicateCapability(id)) => Some(id),
            Self::Manifest(_) | Self::Setup(_) => None,
        }
    }

    /// Whether re-running unchanged may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch { source, .. } if source.is_retryable())
    }

    /// Whether the operator can fix this by changing configuration
    #[must_use]
    pub fn is_operator_fixable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::Merge(_) | Self::Manifest(_) => true,
            Self::Fetch { source, .. } => matches!(
                source.kind(),
                FetchErrorKind::InvalidDestination
                    | FetchErrorKind::Integrity
                    | FetchErrorKind::PermissionDenied
            ),
            Self::Setup(_) | Self::State { .. } => false,
        }
    }
}
