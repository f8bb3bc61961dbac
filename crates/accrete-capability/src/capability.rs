//! Capability definitions
//!
//! A [`Capability`] is an optional feature of the deployment. When enabled it
//! may require some settings, may need an executable artifact fetched onto
//! the host, and contributes configuration fragments.

use crate::facet::Contributions;
use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

/// Stable capability identifier
///
/// Non-empty, used in every diagnostic so operators can locate the
/// offending block in their configuration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CapabilityId(String);

impl CapabilityId {
    /// Create identifier
    ///
    /// # Errors
    /// Returns error if `id` is empty or only whitespace
    pub fn new(id: impl Into<String>) -> Result<Self, CapabilityError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CapabilityError::EmptyId);
        }
        Ok(Self(id))
    }

    /// Identifier as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CapabilityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CapabilityId {
    type Err = CapabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CapabilityId {
    type Error = CapabilityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CapabilityId> for String {
    fn from(id: CapabilityId) -> Self {
        id.0
    }
}

/// Shape a required setting's value must have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKind {
    /// Any non-blank text
    #[default]
    Text,
    /// Absolute URL
    Url,
    /// Absolute filesystem path
    AbsolutePath,
}

/// A setting the capability cannot work without
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredSetting {
    /// Setting name as the operator knows it
    pub name: String,
    /// Resolved value; `None` when the operator never defined it
    pub value: Option<String>,
    /// Expected value shape
    #[serde(default)]
    pub kind: SettingKind,
}

impl RequiredSetting {
    /// Create text setting
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
            kind: SettingKind::Text,
        }
    }

    /// Override kind
    #[inline]
    #[must_use]
    pub fn with_kind(mut self, kind: SettingKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Executable artifact a capability needs on the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Where to download it from
    pub source: Url,
    /// Destination, relative to the extension directory or absolute under it
    pub dest: PathBuf,
    /// Owning uid (engine default when unset)
    #[serde(default)]
    pub owner: Option<u32>,
    /// Owning gid (engine default when unset)
    #[serde(default)]
    pub group: Option<u32>,
    /// Permission bits (engine default when unset)
    #[serde(default)]
    pub mode: Option<u32>,
    /// Expected BLAKE3 digest of the content
    #[serde(default)]
    pub checksum: Option<ContentHash>,
    /// Always re-download
    #[serde(default)]
    pub force: bool,
}

impl ArtifactSpec {
    /// Create artifact spec with engine defaults for ownership and mode
    #[inline]
    #[must_use]
    pub fn new(source: Url, dest: impl Into<PathBuf>) -> Self {
        Self {
            source,
            dest: dest.into(),
            owner: None,
            group: None,
            mode: None,
            checksum: None,
            force: false,
        }
    }

    /// With owner uid/gid
    #[inline]
    #[must_use]
    pub fn with_owner(mut self, uid: u32, gid: u32) -> Self {
        self.owner = Some(uid);
        self.group = Some(gid);
        self
    }

    /// With permission bits
    #[inline]
    #[must_use]
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// With expected checksum
    #[inline]
    #[must_use]
    pub fn with_checksum(mut self, checksum: ContentHash) -> Self {
        self.checksum = Some(checksum);
        self
    }

    /// Force refresh on every run
    #[inline]
    #[must_use]
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// An optional feature of the deployed system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Identifier
    pub id: CapabilityId,
    /// Whether the operator turned it on
    pub enabled: bool,
    /// Sort key for launch arguments (lower first)
    pub priority: i64,
    /// Position in the source configuration, breaks priority ties
    pub declaration_index: usize,
    /// Settings checked before any side effect
    pub required_settings: Vec<RequiredSetting>,
    /// Artifact to fetch, if any
    pub artifact: Option<ArtifactSpec>,
    /// Configuration fragments
    pub contributions: Contributions,
}

impl Capability {
    /// Create enabled capability with no requirements or contributions
    #[must_use]
    pub fn new(id: CapabilityId) -> Self {
        Self {
            id,
            enabled: true,
            priority: 0,
            declaration_index: 0,
            required_settings: Vec::new(),
            artifact: None,
            contributions: Contributions::default(),
        }
    }

    /// Set enabled flag
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set launch-argument priority
    #[must_use]
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Set declaration position
    #[must_use]
    pub fn with_declaration_index(mut self, index: usize) -> Self {
        self.declaration_index = index;
        self
    }

    /// Add required setting
    #[must_use]
    pub fn with_setting(mut self, setting: RequiredSetting) -> Self {
        self.required_settings.push(setting);
        self
    }

    /// Set artifact
    #[must_use]
    pub fn with_artifact(mut self, artifact: ArtifactSpec) -> Self {
        self.artifact = Some(artifact);
        self
    }

    /// Set contributions
    #[must_use]
    pub fn with_contributions(mut self, contributions: Contributions) -> Self {
        self.contributions = contributions;
        self
    }

    /// Ordering key for launch arguments
    #[inline]
    #[must_use]
    pub fn sort_key(&self) -> (i64, usize) {
        (self.priority, self.declaration_index)
    }
}

/// Errors constructing capability values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// Identifier was blank
    #[error("capability id must not be empty")]
    EmptyId,
}
