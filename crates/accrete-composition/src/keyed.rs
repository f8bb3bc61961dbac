//! Keys for single-writer facets
//!
//! Each contribution type names the slot it writes to and builds the
//! conflict error for a differing second writer.

use crate::strategy::MergeError;
use accrete_capability::{CapabilityId, LoggerSpec, ModuleSpec, MountSpec};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Contribution addressed by a unique key
pub trait Keyed: Clone + PartialEq + std::fmt::Debug + Send + Sync {
    /// Slot identifier
    type Key: Ord + Clone + std::fmt::Debug + Send + Sync;

    /// Slot this item writes to
    fn key(&self) -> Self::Key;

    /// Error for two different items claiming the same slot
    fn conflict(
        existing_owner: &CapabilityId,
        existing: &Self,
        incoming_owner: &CapabilityId,
        incoming: &Self,
    ) -> MergeError;
}

impl Keyed for MountSpec {
    type Key = PathBuf;

    fn key(&self) -> PathBuf {
        self.destination.clone()
    }

    fn conflict(
        existing_owner: &CapabilityId,
        existing: &Self,
        incoming_owner: &CapabilityId,
        incoming: &Self,
    ) -> MergeError {
        MergeError::MountConflict {
            destination: incoming.destination.clone(),
            existing_owner: existing_owner.clone(),
            existing: existing.clone(),
            incoming_owner: incoming_owner.clone(),
            incoming: incoming.clone(),
        }
    }
}

impl Keyed for LoggerSpec {
    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }

    fn conflict(
        existing_owner: &CapabilityId,
        existing: &Self,
        incoming_owner: &CapabilityId,
        incoming: &Self,
    ) -> MergeError {
        MergeError::LoggerConflict {
            name: incoming.name.clone(),
            existing_owner: existing_owner.clone(),
            existing: existing.level,
            incoming_owner: incoming_owner.clone(),
            incoming: incoming.level,
        }
    }
}

impl Keyed for ModuleSpec {
    type Key = String;

    fn key(&self) -> String {
        self.module.clone()
    }

    fn conflict(
        existing_owner: &CapabilityId,
        existing: &Self,
        incoming_owner: &CapabilityId,
        incoming: &Self,
    ) -> MergeError {
        MergeError::ModuleConflict {
            module: incoming.module.clone(),
            existing_owner: existing_owner.clone(),
            existing: existing.config.clone(),
            incoming_owner: incoming_owner.clone(),
            incoming: incoming.config.clone(),
        }
    }
}

/// A single feature flag assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSpec {
    /// Flag name
    pub name: String,
    /// Value
    pub enabled: bool,
}

impl FlagSpec {
    /// Create flag assignment
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
        }
    }
}

impl Keyed for FlagSpec {
    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }

    fn conflict(
        existing_owner: &CapabilityId,
        existing: &Self,
        incoming_owner: &CapabilityId,
        incoming: &Self,
    ) -> MergeError {
        MergeError::FlagConflict {
            name: incoming.name.clone(),
            existing_owner: existing_owner.clone(),
            existing: existing.enabled,
            incoming_owner: incoming_owner.clone(),
            incoming: incoming.enabled,
        }
    }
}
