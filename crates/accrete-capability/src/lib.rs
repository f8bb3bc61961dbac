//! Accrete Capability Model
//!
//! Typed description of optional deployment features and the configuration
//! they contribute.
//!
//! # Core Concepts
//!
//! - [`Capability`]: an optional feature with required settings, an optional
//!   [`ArtifactSpec`] and its [`Contributions`]
//! - [`Contributions`]: mounts, launch arguments, loggers, feature flags and
//!   homeserver modules
//! - [`ContentHash`]: BLAKE3 digest for artifact checksums
//!
//! # Example
//!
//! ```rust
//! use accrete_capability::{Capability, CapabilityId, Contributions, LogLevel, LoggerSpec};
//!
//! let cap = Capability::new(CapabilityId::new("rest_auth").unwrap())
//!     .with_priority(10)
//!     .with_contributions(
//!         Contributions::new().with_logger(LoggerSpec::new("rest_auth_provider", LogLevel::Info)),
//!     );
//! assert!(cap.enabled);
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod capability;
mod facet;
mod hash;

pub use capability::{
    ArtifactSpec, Capability, CapabilityError, CapabilityId, RequiredSetting, SettingKind,
};
pub use facet::{Contributions, LogLevel, LoggerSpec, ModuleSpec, MountMode, MountSpec};
pub use hash::{ContentHash, HashError};
pub use url::Url;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
