//! Engine configuration

use accrete_fetch::DEFAULT_ARTIFACT_MODE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default extension directory on the host
pub const DEFAULT_EXTENSION_DIR: &str = "/matrix/synapse/ext";

/// Default HTTP timeout in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Directory all artifacts are placed under
    pub extension_dir: PathBuf,
    /// Service account uid owning artifacts
    pub service_uid: Option<u32>,
    /// Service account gid owning artifacts
    pub service_gid: Option<u32>,
    /// Permission bits for artifacts that do not declare a mode
    pub artifact_mode: u32,
    /// Per-request download timeout
    pub http_timeout_secs: u64,
    /// User agent sent with downloads
    pub user_agent: String,
    /// Re-download every artifact
    pub force_refresh: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            extension_dir: PathBuf::from(DEFAULT_EXTENSION_DIR),
            service_uid: None,
            service_gid: None,
            artifact_mode: DEFAULT_ARTIFACT_MODE,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            user_agent: format!("accrete/{}", crate::VERSION),
            force_refresh: false,
        }
    }
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set extension directory
    #[inline]
    #[must_use]
    pub fn with_extension_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extension_dir = dir.into();
        self
    }

    /// Set service account ownership
    #[inline]
    #[must_use]
    pub fn with_service_owner(mut self, uid: u32, gid: u32) -> Self {
        self.service_uid = Some(uid);
        self.service_gid = Some(gid);
        self
    }

    /// Set default artifact mode
    #[inline]
    #[must_use]
    pub fn with_artifact_mode(mut self, mode: u32) -> Self {
        self.artifact_mode = mode;
        self
    }

    /// Set HTTP timeout
    #[inline]
    #[must_use]
    pub fn with_http_timeout_secs(mut self, secs: u64) -> Self {
        self.http_timeout_secs = secs;
        self
    }

    /// Set user agent
    #[inline]
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Force artifact refresh
    #[inline]
    #[must_use]
    pub fn with_force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    /// HTTP timeout as a duration
    #[inline]
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
