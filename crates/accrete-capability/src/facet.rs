//! Configuration facets a capability contributes
//!
//! Each enabled capability adds fragments to a handful of shared facets:
//! container mounts, launch arguments, logger declarations, feature flags and
//! homeserver module registrations. [`Contributions`] bundles them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

/// Container mount access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MountMode {
    /// Mounted read-only (`ro`)
    #[default]
    ReadOnly,
    /// Mounted read-write (`rw`)
    ReadWrite,
}

impl MountMode {
    /// Short form used in container launch specs
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "ro",
            Self::ReadWrite => "rw",
        }
    }
}

/// A bind mount into the service container
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MountSpec {
    /// Host path
    pub source: PathBuf,
    /// Path inside the container
    pub destination: PathBuf,
    /// Access mode
    #[serde(default)]
    pub mode: MountMode,
}

impl MountSpec {
    /// Create a read-only mount
    #[inline]
    #[must_use]
    pub fn read_only(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            mode: MountMode::ReadOnly,
        }
    }

    /// Create a read-write mount
    #[inline]
    #[must_use]
    pub fn read_write(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            mode: MountMode::ReadWrite,
        }
    }
}

impl Display for MountSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.source.display(),
            self.destination.display(),
            self.mode.as_str()
        )
    }
}

/// Logger severity threshold
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Verbose diagnostics
    Debug,
    /// Normal operation
    #[default]
    Info,
    /// Recoverable problems
    Warn,
    /// Failures
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        })
    }
}

/// A named logger registration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoggerSpec {
    /// Logger name, e.g. `rest_auth_provider`
    pub name: String,
    /// Threshold level
    #[serde(default)]
    pub level: LogLevel,
}

impl LoggerSpec {
    /// Create logger declaration
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, level: LogLevel) -> Self {
        Self {
            name: name.into(),
            level,
        }
    }
}

/// A homeserver module registration (module path plus its config block)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSpec {
    /// Importable module path, e.g. `epmatrix.SuperRulesSet`
    pub module: String,
    /// Module configuration passed verbatim to the module
    #[serde(default)]
    pub config: serde_json::Value,
}

impl ModuleSpec {
    /// Create module registration
    #[inline]
    #[must_use]
    pub fn new(module: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            module: module.into(),
            config,
        }
    }
}

/// Everything one capability adds to the shared configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Contributions {
    /// Container mounts
    pub mounts: Vec<MountSpec>,
    /// Launch arguments, in the order the capability needs them
    pub extra_args: Vec<String>,
    /// Logger declarations
    pub loggers: Vec<LoggerSpec>,
    /// Feature flags
    pub flags: BTreeMap<String, bool>,
    /// Homeserver module registrations
    pub modules: Vec<ModuleSpec>,
}

impl Contributions {
    /// Create empty contributions
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add mount
    #[must_use]
    pub fn with_mount(mut self, mount: MountSpec) -> Self {
        self.mounts.push(mount);
        self
    }

    /// Append launch argument
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Add logger
    #[must_use]
    pub fn with_logger(mut self, logger: LoggerSpec) -> Self {
        self.loggers.push(logger);
        self
    }

    /// Set feature flag
    #[must_use]
    pub fn with_flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.flags.insert(name.into(), value);
        self
    }

    /// Add module registration
    #[must_use]
    pub fn with_module(mut self, module: ModuleSpec) -> Self {
        self.modules.push(module);
        self
    }

    /// True when the capability contributes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
            && self.extra_args.is_empty()
            && self.loggers.is_empty()
            && self.flags.is_empty()
            && self.modules.is_empty()
    }
}
