//! Precondition checks for capability settings
//!
//! Every required setting of a capability is inspected and every problem is
//! reported together, so an operator can fix the configuration in one pass.

use accrete_capability::{ArtifactSpec, Capability, CapabilityId, RequiredSetting, SettingKind, Url};
use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path};

/// Setting name used when the artifact source is unusable
pub const ARTIFACT_SOURCE_SETTING: &str = "artifact.source";

/// Setting name used when the artifact destination is unusable
pub const ARTIFACT_DEST_SETTING: &str = "artifact.dest";

/// Side-effect free precondition validator
#[derive(Debug, Clone, Copy, Default)]
pub struct PreconditionValidator;

impl PreconditionValidator {
    /// Create new validator instance
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate one capability
    ///
    /// # Errors
    /// Returns a [`ValidationError`] listing every missing or malformed
    /// setting, in declaration order, followed by artifact problems.
    pub fn validate(&self, capability: &Capability) -> Result<(), ValidationError> {
        let mut failures: Vec<SettingFailure> = capability
            .required_settings
            .iter()
            .filter_map(|setting| {
                Self::check_setting(setting).map(|reason| SettingFailure {
                    setting: setting.name.clone(),
                    reason,
                })
            })
            .collect();

        if let Some(artifact) = &capability.artifact {
            failures.extend(Self::check_artifact(artifact));
        }

        if failures.is_empty() {
            tracing::debug!(capability = %capability.id, "preconditions satisfied");
            Ok(())
        } else {
            Err(ValidationError {
                capability: capability.id.clone(),
                failures,
            })
        }
    }

    /// Validate every enabled capability without stopping at the first
    ///
    /// # Errors
    /// Returns one [`ValidationError`] per failing capability, in input order.
    pub fn validate_all(&self, capabilities: &[Capability]) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<_> = capabilities
            .iter()
            .filter(|c| c.enabled)
            .filter_map(|c| self.validate(c).err())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Inspect a single setting
    #[must_use]
    pub fn check_setting(setting: &RequiredSetting) -> Option<FailureReason> {
        let value = match setting.value.as_deref().map(str::trim) {
            None | Some("") => return Some(FailureReason::Missing),
            Some(v) => v,
        };

        match setting.kind {
            SettingKind::Text => None,
            SettingKind::Url => match Url::parse(value) {
                Ok(url) if url.cannot_be_a_base() => Some(FailureReason::Malformed(format!(
                    "'{value}' is not a hierarchical URL"
                ))),
                Ok(_) => None,
                Err(e) => Some(FailureReason::Malformed(format!("invalid URL '{value}': {e}"))),
            },
            SettingKind::AbsolutePath => {
                if Path::new(value).is_absolute() {
                    None
                } else {
                    Some(FailureReason::Malformed(format!(
                        "'{value}' is not an absolute path"
                    )))
                }
            }
        }
    }

    /// Inspect the artifact source and destination
    fn check_artifact(artifact: &ArtifactSpec) -> Vec<SettingFailure> {
        let mut failures = Vec::new();

        if !matches!(artifact.source.scheme(), "http" | "https" | "file") {
            failures.push(SettingFailure {
                setting: ARTIFACT_SOURCE_SETTING.to_string(),
                reason: FailureReason::Malformed(format!(
                    "unsupported scheme '{}'",
                    artifact.source.scheme()
                )),
            });
        }

        if artifact.dest.as_os_str().is_empty() {
            failures.push(SettingFailure {
                setting: ARTIFACT_DEST_SETTING.to_string(),
                reason: FailureReason::Missing,
            });
        } else if artifact
            .dest
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            failures.push(SettingFailure {
                setting: ARTIFACT_DEST_SETTING.to_string(),
                reason: FailureReason::Malformed(format!(
                    "'{}' escapes the extension directory",
                    artifact.dest.display()
                )),
            });
        }

        failures
    }
}

/// Why a setting was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Undefined or blank
    Missing,
    /// Present but not usable
    Malformed(String),
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("missing"),
            Self::Malformed(reason) => write!(f, "malformed: {reason}"),
        }
    }
}

/// One rejected setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingFailure {
    /// Setting name
    pub setting: String,
    /// Rejection reason
    pub reason: FailureReason,
}

impl Display for SettingFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is {}", self.setting, self.reason)
    }
}

/// All precondition failures of one capability
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("capability '{capability}': {}", join_failures(.failures))]
pub struct ValidationError {
    /// Offending capability
    pub capability: CapabilityId,
    /// Every failure, never empty
    pub failures: Vec<SettingFailure>,
}

impl ValidationError {
    /// Names of the rejected settings
    #[must_use]
    pub fn setting_names(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.setting.as_str()).collect()
    }

    /// Check whether a given setting was rejected
    #[must_use]
    pub fn mentions(&self, setting: &str) -> bool {
        self.failures.iter().any(|f| f.setting == setting)
    }
}

fn join_failures(failures: &[SettingFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("setting {f}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn cap(name: &str) -> Capability {
        Capability::new(CapabilityId::from_str(name).unwrap())
    }

    fn artifact(url: &str, dest: &str) -> ArtifactSpec {
        ArtifactSpec::new(Url::parse(url).unwrap(), dest)
    }

    #[test]
    fn accepts_complete_capability() {
        let c = cap("rest_auth")
            .with_setting(RequiredSetting::new("endpoint", Some("https://auth.local".into())))
            .with_artifact(artifact("https://example.org/a.py", "a.py"));

        assert!(PreconditionValidator::new().validate(&c).is_ok());
    }

    #[test]
    fn reports_every_missing_setting() {
        let c = cap("rest_auth")
            .with_setting(RequiredSetting::new("endpoint", None))
            .with_setting(RequiredSetting::new("present", Some("yes".into())))
            .with_setting(RequiredSetting::new("shared_secret", Some("   ".into())));

        let err = PreconditionValidator::new().validate(&c).unwrap_err();
        assert_eq!(err.capability.as_str(), "rest_auth");
        assert_eq!(err.setting_names(), vec!["endpoint", "shared_secret"]);
        assert!(err.failures.iter().all(|f| f.reason == FailureReason::Missing));
    }

    #[test]
    fn error_message_names_capability_and_settings() {
        let c = cap("rest_auth").with_setting(RequiredSetting::new("endpoint", None));
        let err = PreconditionValidator::new().validate(&c).unwrap_err();
        assert_eq!(err.to_string(), "capability 'rest_auth': setting 'endpoint' is missing");
    }

    #[test]
    fn malformed_url_setting() {
        let setting = RequiredSetting::new("endpoint", Some("not a url".into()))
            .with_kind(SettingKind::Url);
        assert!(matches!(
            PreconditionValidator::check_setting(&setting),
            Some(FailureReason::Malformed(_))
        ));
    }

    #[test]
    fn relative_path_is_malformed() {
        let setting = RequiredSetting::new("data_dir", Some("relative/dir".into()))
            .with_kind(SettingKind::AbsolutePath);
        assert!(matches!(
            PreconditionValidator::check_setting(&setting),
            Some(FailureReason::Malformed(_))
        ));

        let ok = RequiredSetting::new("data_dir", Some("/matrix/data".into()))
            .with_kind(SettingKind::AbsolutePath);
        assert!(PreconditionValidator::check_setting(&ok).is_none());
    }

    #[test]
    fn artifact_escaping_extension_dir_is_rejected() {
        let c = cap("rules").with_artifact(artifact("https://example.org/a.py", "../etc/passwd"));
        let err = PreconditionValidator::new().validate(&c).unwrap_err();
        assert!(err.mentions(ARTIFACT_DEST_SETTING));
    }

    #[test]
    fn artifact_with_unsupported_scheme_is_rejected() {
        let c = cap("rules").with_artifact(artifact("ftp://example.org/a.py", "a.py"));
        let err = PreconditionValidator::new().validate(&c).unwrap_err();
        assert!(err.mentions(ARTIFACT_SOURCE_SETTING));
    }

    #[test]
    fn validate_all_skips_disabled_and_collects() {
        let caps = vec![
            cap("a").with_setting(RequiredSetting::new("x", None)),
            cap("b")
                .with_enabled(false)
                .with_setting(RequiredSetting::new("y", None)),
            cap("c").with_setting(RequiredSetting::new("z", None)),
        ];

        let errors = PreconditionValidator::new().validate_all(&caps).unwrap_err();
        let names: Vec<_> = errors.iter().map(|e| e.capability.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }
}
