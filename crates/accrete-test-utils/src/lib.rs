//! Testing utilities for the accrete workspace
//!
//! Shared fixtures: an in-memory artifact source that counts downloads and
//! builders for the capabilities used across test suites.

#![allow(missing_docs)]

use accrete_capability::{
    ArtifactSpec, Capability, CapabilityId, Contributions, LogLevel, LoggerSpec, ModuleSpec,
    MountSpec, RequiredSetting, SettingKind, Url,
};
use accrete_fetch::{ArtifactSource, FetchError};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory artifact source; unknown URLs fail with a network error
#[derive(Debug, Clone, Default)]
pub struct CountingSource {
    artifacts: Arc<Mutex<HashMap<Url, Bytes>>>,
    downloads: Arc<AtomicUsize>,
}

impl CountingSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_artifact(self, url: &str, content: impl Into<Bytes>) -> Self {
        self.insert(url, content);
        self
    }

    /// Serve `content` at `url` from now on
    pub fn insert(&self, url: &str, content: impl Into<Bytes>) {
        self.artifacts
            .lock()
            .unwrap()
            .insert(url_of(url), content.into());
    }

    /// Stop serving `url`
    pub fn remove(&self, url: &str) {
        self.artifacts.lock().unwrap().remove(&url_of(url));
    }

    /// Download attempts so far, failed ones included
    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactSource for CountingSource {
    async fn download(&self, url: &Url) -> Result<Bytes, FetchError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.artifacts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::network(url, "connection refused"))
    }
}

pub fn url_of(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub fn id(s: &str) -> CapabilityId {
    CapabilityId::new(s).unwrap()
}

/// Capability with only an extra argument
pub fn arg_capability(name: &str, priority: i64, index: usize) -> Capability {
    Capability::new(id(name))
        .with_priority(priority)
        .with_declaration_index(index)
        .with_contributions(Contributions::new().with_arg(format!("--{name}")))
}

pub const REST_AUTH_URL: &str = "https://artifacts.example.org/rest_auth_provider.py";
pub const REST_AUTH_SOURCE: &[u8] = b"class RestAuthProvider:\n    pass\n";

/// Password provider capability with one artifact, mount, logger and module
pub fn rest_auth_capability(endpoint: Option<&str>, index: usize) -> Capability {
    Capability::new(id("password_provider_rest_auth"))
        .with_priority(10)
        .with_declaration_index(index)
        .with_setting(
            RequiredSetting::new("endpoint", endpoint.map(str::to_owned)).with_kind(SettingKind::Url),
        )
        .with_artifact(ArtifactSpec::new(url_of(REST_AUTH_URL), "rest_auth_provider.py"))
        .with_contributions(
            Contributions::new()
                .with_mount(MountSpec::read_only(
                    "/matrix/synapse/ext/rest_auth_provider.py",
                    "/usr/local/lib/python3/site-packages/rest_auth_provider.py",
                ))
                .with_logger(LoggerSpec::new("rest_auth_provider", LogLevel::Info))
                .with_module(ModuleSpec::new(
                    "rest_auth_provider.RestAuthProvider",
                    json!({ "endpoint": endpoint.unwrap_or_default() }),
                )),
        )
}

pub const ROOM_RULES_URL: &str = "https://artifacts.example.org/epmatrix.py";
pub const ROOM_RULES_SOURCE: &[u8] = b"class SuperRulesSet:\n    pass\n";

/// Room rules module capability requiring an identity server
pub fn room_rules_capability(id_server: Option<&str>, index: usize) -> Capability {
    Capability::new(id("room_rules"))
        .with_priority(20)
        .with_declaration_index(index)
        .with_setting(RequiredSetting::new("id_server", id_server.map(str::to_owned)))
        .with_artifact(ArtifactSpec::new(url_of(ROOM_RULES_URL), "epmatrix.py"))
        .with_contributions(
            Contributions::new()
                .with_mount(MountSpec::read_only(
                    "/matrix/synapse/ext/epmatrix.py",
                    "/usr/local/lib/python3/site-packages/epmatrix.py",
                ))
                .with_flag("third_party_rules", true)
                .with_module(ModuleSpec::new(
                    "epmatrix.SuperRulesSet",
                    json!({ "id_server": id_server.unwrap_or_default() }),
                )),
        )
}

/// Source serving both standard fixture artifacts
pub fn standard_source() -> CountingSource {
    CountingSource::new()
        .with_artifact(REST_AUTH_URL, REST_AUTH_SOURCE)
        .with_artifact(ROOM_RULES_URL, ROOM_RULES_SOURCE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counting_source_counts_every_attempt() {
        let source = CountingSource::new().with_artifact("https://a.example/x", &b"x"[..]);

        assert_eq!(&source.download(&url_of("https://a.example/x")).await.unwrap()[..], b"x");
        assert!(source.download(&url_of("https://a.example/y")).await.is_err());
        assert_eq!(source.downloads(), 2);

        let clone = source.clone();
        clone.remove("https://a.example/x");
        assert!(source.download(&url_of("https://a.example/x")).await.is_err());
        assert_eq!(source.downloads(), 3);
    }

    #[test]
    fn fixtures_are_well_formed() {
        let cap = rest_auth_capability(Some("https://auth.example.org"), 0);
        assert_eq!(cap.contributions.mounts.len(), 1);
        assert!(cap.artifact.is_some());
    }
}
