//! Deployment manifest
//!
//! A manifest holds the engine configuration, the operator's settings and
//! the ordered capability list. Capabilities reference settings by key; an
//! unset key resolves to `None` and is reported by validation.
//!
//! ```yaml
//! engine:
//!   service_uid: 991
//!   service_gid: 991
//! settings:
//!   rest_auth_endpoint: https://auth.example.org
//! capabilities:
//!   - id: password_provider_rest_auth
//!     priority: 10
//!     settings:
//!       - name: endpoint
//!         key: rest_auth_endpoint
//!         kind: url
//!     artifact:
//!       source: https://example.org/rest_auth_provider.py
//!       dest: rest_auth_provider.py
//!     contributions:
//!       mounts:
//!         - source: /matrix/synapse/ext/rest_auth_provider.py
//!           destination: /usr/local/lib/python3/site-packages/rest_auth_provider.py
//! ```

use crate::config::EngineConfig;
use accrete_capability::{
    ArtifactSpec, Capability, CapabilityId, Contributions, RequiredSetting, SettingKind,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Manifest loading errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// File could not be read
    #[error("cannot read manifest {path}: {source}")]
    Io {
        /// Manifest path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Extension does not name a known format
    #[error("unsupported manifest format for {path} (expected .yaml, .yml, .json or .toml)")]
    UnsupportedFormat {
        /// Manifest path
        path: PathBuf,
    },

    /// YAML parse failure
    #[error("invalid YAML manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parse failure
    #[error("invalid JSON manifest: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse failure
    #[error("invalid TOML manifest: {0}")]
    Toml(#[from] toml::de::Error),

    /// Two capabilities share an id
    #[error("capability '{0}' is declared more than once")]
    DuplicateCapability(CapabilityId),
}

/// Reference from a capability to one operator setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingRef {
    /// Name reported in errors
    pub name: String,
    /// Key in the manifest `settings` map (defaults to `name`)
    #[serde(default)]
    pub key: Option<String>,
    /// Inline value, used when the key is not set
    #[serde(default)]
    pub value: Option<String>,
    /// Expected value shape
    #[serde(default)]
    pub kind: SettingKind,
}

impl SettingRef {
    /// Settings map key
    #[must_use]
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.name)
    }

    fn resolve(&self, settings: &BTreeMap<String, String>) -> RequiredSetting {
        let value = settings
            .get(self.key())
            .cloned()
            .or_else(|| self.value.clone());
        RequiredSetting::new(self.name.clone(), value).with_kind(self.kind)
    }
}

fn enabled_by_default() -> bool {
    true
}

/// Capability as written in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilityEntry {
    /// Capability id
    pub id: CapabilityId,
    /// Whether the operator turned it on
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Launch argument priority
    #[serde(default)]
    pub priority: i64,
    /// Required settings
    #[serde(default)]
    pub settings: Vec<SettingRef>,
    /// Artifact to place on the host
    #[serde(default)]
    pub artifact: Option<ArtifactSpec>,
    /// Configuration contributions
    #[serde(default)]
    pub contributions: Contributions,
}

/// Parsed manifest
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
    /// Engine configuration
    pub engine: EngineConfig,
    /// Operator settings
    pub settings: BTreeMap<String, String>,
    /// Capabilities in declaration order
    pub capabilities: Vec<CapabilityEntry>,
}

impl Manifest {
    /// Load manifest, choosing the format from the file extension
    ///
    /// # Errors
    /// Returns [`ManifestError`] if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let parse: fn(&str) -> Result<Self, ManifestError> = match extension.as_deref() {
            Some("yaml" | "yml") => Self::from_yaml,
            Some("json") => Self::from_json,
            Some("toml") => Self::from_toml,
            _ => {
                return Err(ManifestError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };

        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let manifest = parse(&text)?;
        tracing::debug!(
            path = %path.display(),
            capabilities = manifest.capabilities.len(),
            "manifest loaded"
        );
        Ok(manifest)
    }

    /// Parse YAML manifest
    ///
    /// # Errors
    /// Returns [`ManifestError::Yaml`] on malformed input
    pub fn from_yaml(text: &str) -> Result<Self, ManifestError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Parse JSON manifest
    ///
    /// # Errors
    /// Returns [`ManifestError::Json`] on malformed input
    pub fn from_json(text: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse TOML manifest
    ///
    /// # Errors
    /// Returns [`ManifestError::Toml`] on malformed input
    pub fn from_toml(text: &str) -> Result<Self, ManifestError> {
        Ok(toml::from_str(text)?)
    }

    /// Build capabilities with settings resolved and declaration order fixed
    ///
    /// # Errors
    /// Returns [`ManifestError::DuplicateCapability`] if an id repeats
    pub fn capabilities(&self) -> Result<Vec<Capability>, ManifestError> {
        let mut seen = HashSet::new();

        self.capabilities
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                if !seen.insert(&entry.id) {
                    return Err(ManifestError::DuplicateCapability(entry.id.clone()));
                }

                let mut capability = Capability::new(entry.id.clone())
                    .with_enabled(entry.enabled)
                    .with_priority(entry.priority)
                    .with_declaration_index(index)
                    .with_contributions(entry.contributions.clone());

                for setting in &entry.settings {
                    capability = capability.with_setting(setting.resolve(&self.settings));
                }
                if let Some(artifact) = &entry.artifact {
                    capability = capability.with_artifact(artifact.clone());
                }

                Ok(capability)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accrete_capability::{LogLevel, MountMode};

    const YAML: &str = r#"
engine:
  extension_dir: /srv/ext
  service_uid: 991
  service_gid: 991
settings:
  rest_auth_endpoint: https://auth.example.org
capabilities:
  - id: password_provider_rest_auth
    priority: 10
    settings:
      - name: endpoint
        key: rest_auth_endpoint
        kind: url
    artifact:
      source: https://example.org/rest_auth_provider.py
      dest: rest_auth_provider.py
    contributions:
      mounts:
        - source: /srv/ext/rest_auth_provider.py
          destination: /usr/lib/rest_auth_provider.py
      loggers:
        - name: rest_auth_provider
          level: DEBUG
  - id: room_rules
    enabled: false
    settings:
      - name: id_server
"#;

    #[test]
    fn yaml_manifest_resolves_settings() {
        let manifest = Manifest::from_yaml(YAML).unwrap();
        assert_eq!(manifest.engine.service_uid, Some(991));

        let caps = manifest.capabilities().unwrap();
        assert_eq!(caps.len(), 2);

        let rest = &caps[0];
        assert_eq!(rest.id.as_str(), "password_provider_rest_auth");
        assert_eq!(rest.declaration_index, 0);
        assert_eq!(rest.priority, 10);
        assert_eq!(
            rest.required_settings[0].value.as_deref(),
            Some("https://auth.example.org")
        );
        assert_eq!(rest.required_settings[0].kind, SettingKind::Url);
        assert_eq!(rest.contributions.mounts[0].mode, MountMode::ReadOnly);
        assert_eq!(rest.contributions.loggers[0].level, LogLevel::Debug);

        let rules = &caps[1];
        assert!(!rules.enabled);
        assert_eq!(rules.declaration_index, 1);
        assert_eq!(rules.required_settings[0].value, None);
    }

    #[test]
    fn inline_value_is_fallback() {
        let manifest = Manifest::from_yaml(
            "capabilities:\n  - id: a\n    settings:\n      - name: x\n        value: inline\n",
        )
        .unwrap();
        let caps = manifest.capabilities().unwrap();
        assert_eq!(caps[0].required_settings[0].value.as_deref(), Some("inline"));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let manifest =
            Manifest::from_yaml("capabilities:\n  - id: a\n  - id: b\n  - id: a\n").unwrap();
        let err = manifest.capabilities().unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateCapability(id) if id.as_str() == "a"));
    }

    #[test]
    fn empty_id_rejected() {
        assert!(Manifest::from_yaml("capabilities:\n  - id: \"  \"\n").is_err());
    }

    #[test]
    fn toml_and_json_parse() {
        let toml = r#"
[settings]
endpoint = "https://auth.example.org"

[[capabilities]]
id = "rest_auth"
priority = 5

[[capabilities.settings]]
name = "endpoint"
"#;
        let manifest = Manifest::from_toml(toml).unwrap();
        let caps = manifest.capabilities().unwrap();
        assert_eq!(caps[0].priority, 5);
        assert_eq!(
            caps[0].required_settings[0].value.as_deref(),
            Some("https://auth.example.org")
        );

        let json = r#"{"capabilities":[{"id":"metrics","contributions":{"extra_args":["--metrics"]}}]}"#;
        let manifest = Manifest::from_json(json).unwrap();
        assert_eq!(manifest.capabilities[0].contributions.extra_args, vec!["--metrics"]);
    }

    #[test]
    fn load_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.yml");
        std::fs::write(&path, YAML).unwrap();
        assert_eq!(Manifest::load(&path).unwrap().capabilities.len(), 2);

        let bad = dir.path().join("deploy.ini");
        std::fs::write(&bad, "").unwrap();
        assert!(matches!(
            Manifest::load(&bad),
            Err(ManifestError::UnsupportedFormat { .. })
        ));

        assert!(matches!(
            Manifest::load(dir.path().join("absent.json")),
            Err(ManifestError::Io { .. })
        ));
    }
}
