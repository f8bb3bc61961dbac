//! Accretion store
//!
//! Shared configuration assembled from every merged capability. Merging is
//! two-phase: all facets validate before any facet is mutated.

use crate::keyed::FlagSpec;
use crate::ordered::{ArgBlock, OrderedArgs};
use crate::single_writer::{Attributed, SingleWriterFacet};
use crate::strategy::{Contributor, FacetStrategy, MergeError};
use accrete_capability::{
    CapabilityId, ContentHash, Contributions, LogLevel, LoggerSpec, ModuleSpec, MountSpec,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mount facet: one mount per container path
pub type MountFacet = SingleWriterFacet<MountSpec>;

/// Result of a successful merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    /// Contributions were added
    Merged,
    /// Capability had already contributed; nothing changed
    AlreadyMerged,
}

/// Capability recorded as having contributed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorRecord {
    /// Capability id
    pub id: CapabilityId,
    /// Digest of the contributions it merged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<ContentHash>,
}

/// Serializable form of the whole store
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSnapshot {
    /// Mounts in destination order
    pub mounts: Vec<Attributed<MountSpec>>,
    /// Argument blocks in launch order
    pub extra_args: Vec<ArgBlock>,
    /// Loggers in name order
    pub loggers: Vec<Attributed<LoggerSpec>>,
    /// Flags in name order
    pub flags: Vec<Attributed<FlagSpec>>,
    /// Modules in module path order
    pub modules: Vec<Attributed<ModuleSpec>>,
    /// Contributors in id order
    pub contributors: Vec<ContributorRecord>,
}

/// Flattened configuration for the renderer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderedConfig {
    /// Mount strings (`source:destination:mode`)
    pub mounts: Vec<String>,
    /// Launch arguments in order
    pub extra_args: Vec<String>,
    /// Logger levels by name
    pub loggers: BTreeMap<String, LogLevel>,
    /// Feature flags by name
    pub flags: BTreeMap<String, bool>,
    /// Homeserver modules
    pub modules: Vec<ModuleSpec>,
}

/// Conflict-checked configuration accumulated across capabilities
///
/// # Invariants
/// - Each mount destination, logger, flag and module appears once
/// - Argument order depends only on `(priority, declaration_index)`
/// - A rejected merge leaves the store unchanged
/// - A capability contributes at most once
#[derive(Debug, Clone, PartialEq)]
pub struct AccretionStore {
    mounts: MountFacet,
    extra_args: OrderedArgs,
    loggers: SingleWriterFacet<LoggerSpec>,
    flags: SingleWriterFacet<FlagSpec>,
    modules: SingleWriterFacet<ModuleSpec>,
    contributors: IndexMap<CapabilityId, Option<ContentHash>>,
}

impl Default for AccretionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AccretionStore {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            mounts: SingleWriterFacet::new("mounts"),
            extra_args: OrderedArgs::new(),
            loggers: SingleWriterFacet::new("loggers"),
            flags: SingleWriterFacet::new("flags"),
            modules: SingleWriterFacet::new("modules"),
            contributors: IndexMap::new(),
        }
    }

    /// Merge one capability's contributions
    ///
    /// # Errors
    /// Returns [`MergeError`] on the first conflict; the store is unchanged
    pub fn merge(
        &mut self,
        contributor: &Contributor,
        contributions: &Contributions,
    ) -> Result<MergeOutcome, MergeError> {
        let fingerprint = ContentHash::compute_serializable(contributions).ok();

        if let Some(recorded) = self.contributors.get(&contributor.id) {
            if *recorded != fingerprint {
                tracing::warn!(
                    capability = %contributor.id,
                    "capability contributions changed since it was merged; keeping the merged ones"
                );
            } else {
                tracing::debug!(capability = %contributor.id, "already merged");
            }
            return Ok(MergeOutcome::AlreadyMerged);
        }

        let flags: Vec<FlagSpec> = contributions
            .flags
            .iter()
            .map(|(name, enabled)| FlagSpec::new(name.clone(), *enabled))
            .collect();

        // Phase 1: validate every facet
        self.mounts.validate(contributor, &contributions.mounts)?;
        self.extra_args
            .validate(contributor, &contributions.extra_args)?;
        self.loggers.validate(contributor, &contributions.loggers)?;
        self.flags.validate(contributor, &flags)?;
        self.modules.validate(contributor, &contributions.modules)?;

        // Phase 2: compose
        self.mounts.compose(contributor, &contributions.mounts);
        self.extra_args
            .compose(contributor, &contributions.extra_args);
        self.loggers.compose(contributor, &contributions.loggers);
        self.flags.compose(contributor, &flags);
        self.modules.compose(contributor, &contributions.modules);

        self.contributors
            .insert(contributor.id.clone(), fingerprint);

        tracing::debug!(
            capability = %contributor.id,
            mounts = contributions.mounts.len(),
            args = contributions.extra_args.len(),
            loggers = contributions.loggers.len(),
            flags = flags.len(),
            modules = contributions.modules.len(),
            "merged contributions"
        );

        Ok(MergeOutcome::Merged)
    }

    /// Mount facet
    #[must_use]
    pub fn mounts(&self) -> &MountFacet {
        &self.mounts
    }

    /// Launch argument facet
    #[must_use]
    pub fn extra_args(&self) -> &OrderedArgs {
        &self.extra_args
    }

    /// Logger facet
    #[must_use]
    pub fn loggers(&self) -> &SingleWriterFacet<LoggerSpec> {
        &self.loggers
    }

    /// Flag facet
    #[must_use]
    pub fn flags(&self) -> &SingleWriterFacet<FlagSpec> {
        &self.flags
    }

    /// Module facet
    #[must_use]
    pub fn modules(&self) -> &SingleWriterFacet<ModuleSpec> {
        &self.modules
    }

    /// Contributing capabilities in merge order
    pub fn contributors(&self) -> impl Iterator<Item = &CapabilityId> {
        self.contributors.keys()
    }

    /// Whether `id` has contributed
    #[must_use]
    pub fn has_contributed(&self, id: &CapabilityId) -> bool {
        self.contributors.contains_key(id)
    }

    /// Whether nothing has been merged
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }

    /// Serializable copy of the store
    ///
    /// Equal stores give equal snapshots whatever order they were merged in.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        let mut contributors: Vec<ContributorRecord> = self
            .contributors
            .iter()
            .map(|(id, fingerprint)| ContributorRecord {
                id: id.clone(),
                fingerprint: *fingerprint,
            })
            .collect();
        contributors.sort_by(|a, b| a.id.cmp(&b.id));

        StoreSnapshot {
            mounts: self.mounts.iter().cloned().collect(),
            extra_args: self.extra_args.blocks().to_vec(),
            loggers: self.loggers.iter().cloned().collect(),
            flags: self.flags.iter().cloned().collect(),
            modules: self.modules.iter().cloned().collect(),
            contributors,
        }
    }

    /// Restore a store from a snapshot
    ///
    /// # Errors
    /// Returns [`MergeError`] if the snapshot holds two differing entries for
    /// one key, as only a hand-edited snapshot can
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self, MergeError> {
        Ok(Self {
            mounts: SingleWriterFacet::from_entries("mounts", snapshot.mounts)?,
            extra_args: OrderedArgs::from_blocks(snapshot.extra_args),
            loggers: SingleWriterFacet::from_entries("loggers", snapshot.loggers)?,
            flags: SingleWriterFacet::from_entries("flags", snapshot.flags)?,
            modules: SingleWriterFacet::from_entries("modules", snapshot.modules)?,
            contributors: snapshot
                .contributors
                .into_iter()
                .map(|r| (r.id, r.fingerprint))
                .collect(),
        })
    }

    /// Flatten into renderer input
    #[must_use]
    pub fn render(&self) -> RenderedConfig {
        RenderedConfig {
            mounts: self.mounts.items().map(ToString::to_string).collect(),
            extra_args: self.extra_args.args().map(str::to_owned).collect(),
            loggers: self
                .loggers
                .items()
                .map(|l| (l.name.clone(), l.level))
                .collect(),
            flags: self
                .flags
                .items()
                .map(|f| (f.name.clone(), f.enabled))
                .collect(),
            modules: self.modules.items().cloned().collect(),
        }
    }
}
