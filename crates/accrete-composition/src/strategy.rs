//! Facet strategy trait and core types
//!
//! Provides the [`FacetStrategy`] trait: each configuration facet decides how
//! incoming contributions combine with what earlier capabilities accreted.

use accrete_capability::{Capability, CapabilityId, LogLevel, MountSpec};
use std::path::PathBuf;

/// Merge strategy for one configuration facet
///
/// `validate` must catch every conflict without mutating anything, so the
/// store can check all facets before touching any of them.
pub trait FacetStrategy: Send + Sync + std::fmt::Debug {
    /// Contribution item type
    type Item;

    /// Check that `items` can be merged under this strategy
    ///
    /// # Errors
    /// Returns a [`MergeError`] naming both sides of the first conflict
    fn validate(&self, contributor: &Contributor, items: &[Self::Item]) -> Result<(), MergeError>;

    /// Merge `items` into the facet
    ///
    /// # Preconditions
    /// `validate()` must have returned `Ok` for these items
    fn compose(&mut self, contributor: &Contributor, items: &[Self::Item]);

    /// Strategy name (for logging)
    fn name(&self) -> &'static str;
}

/// Identity and ordering key of the capability whose turn it is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributor {
    /// Capability id
    pub id: CapabilityId,
    /// Launch argument priority (lower first)
    pub priority: i64,
    /// Declaration position (tiebreaker)
    pub declaration_index: usize,
}

impl Contributor {
    /// Create contributor
    #[inline]
    #[must_use]
    pub fn new(id: CapabilityId, priority: i64, declaration_index: usize) -> Self {
        Self {
            id,
            priority,
            declaration_index,
        }
    }

    /// Ordering key for launch arguments
    #[inline]
    #[must_use]
    pub fn sort_key(&self) -> (i64, usize) {
        (self.priority, self.declaration_index)
    }
}

impl From<&Capability> for Contributor {
    fn from(capability: &Capability) -> Self {
        Self::new(
            capability.id.clone(),
            capability.priority,
            capability.declaration_index,
        )
    }
}

/// Conflicting contributions between capabilities
///
/// Never auto-resolved: the operator disables or reconciles one side.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MergeError {
    /// Two different mounts target the same container path
    #[error(
        "mount conflict at {}: '{existing_owner}' mounts {existing}, '{incoming_owner}' mounts {incoming}",
        .destination.display()
    )]
    MountConflict {
        /// Contested container path
        destination: PathBuf,
        /// Capability that declared it first
        existing_owner: CapabilityId,
        /// Its mount
        existing: MountSpec,
        /// Capability being merged
        incoming_owner: CapabilityId,
        /// Its mount
        incoming: MountSpec,
    },

    /// Same logger declared with different levels
    #[error(
        "logger conflict for '{name}': '{existing_owner}' sets {existing}, '{incoming_owner}' sets {incoming}"
    )]
    LoggerConflict {
        /// Logger name
        name: String,
        /// Capability that declared it first
        existing_owner: CapabilityId,
        /// Its level
        existing: LogLevel,
        /// Capability being merged
        incoming_owner: CapabilityId,
        /// Its level
        incoming: LogLevel,
    },

    /// Same feature flag set to different values
    #[error(
        "flag conflict for '{name}': '{existing_owner}' sets {existing}, '{incoming_owner}' sets {incoming}"
    )]
    FlagConflict {
        /// Flag name
        name: String,
        /// Capability that set it first
        existing_owner: CapabilityId,
        /// Its value
        existing: bool,
        /// Capability being merged
        incoming_owner: CapabilityId,
        /// Its value
        incoming: bool,
    },

    /// Same homeserver module registered with different configuration
    #[error(
        "module conflict for '{module}': '{existing_owner}' and '{incoming_owner}' register it with different config"
    )]
    ModuleConflict {
        /// Module path
        module: String,
        /// Capability that registered it first
        existing_owner: CapabilityId,
        /// Its configuration
        existing: serde_json::Value,
        /// Capability being merged
        incoming_owner: CapabilityId,
        /// Its configuration
        incoming: serde_json::Value,
    },
}

impl MergeError {
    /// Capability whose merge was rejected
    #[must_use]
    pub fn incoming_owner(&self) -> &CapabilityId {
        match self {
            Self::MountConflict { incoming_owner, .. }
            | Self::LoggerConflict { incoming_owner, .. }
            | Self::FlagConflict { incoming_owner, .. }
            | Self::ModuleConflict { incoming_owner, .. } => incoming_owner,
        }
    }

    /// Capability that already holds the contested entry
    #[must_use]
    pub fn existing_owner(&self) -> &CapabilityId {
        match self {
            Self::MountConflict { existing_owner, .. }
            | Self::LoggerConflict { existing_owner, .. }
            | Self::FlagConflict { existing_owner, .. }
            | Self::ModuleConflict { existing_owner, .. } => existing_owner,
        }
    }

    /// Facet the conflict occurred in
    #[must_use]
    pub fn facet(&self) -> &'static str {
        match self {
            Self::MountConflict { .. } => "mounts",
            Self::LoggerConflict { .. } => "loggers",
            Self::FlagConflict { .. } => "flags",
            Self::ModuleConflict { .. } => "modules",
        }
    }
}
