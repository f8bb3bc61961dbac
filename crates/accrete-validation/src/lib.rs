//! Accrete Precondition Validation
//!
//! Gatekeeper that runs before any artifact fetch or configuration merge.
//! A capability with a missing or malformed required setting never reaches
//! a side effect.
//!
//! # Example
//!
//! ```rust
//! use accrete_capability::{Capability, CapabilityId, RequiredSetting};
//! use accrete_validation::PreconditionValidator;
//!
//! let cap = Capability::new(CapabilityId::new("rest_auth").unwrap())
//!     .with_setting(RequiredSetting::new("endpoint", None));
//!
//! let err = PreconditionValidator::new().validate(&cap).unwrap_err();
//! assert!(err.mentions("endpoint"));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod validator;

pub use validator::{
    FailureReason, PreconditionValidator, SettingFailure, ValidationError,
    ARTIFACT_DEST_SETTING, ARTIFACT_SOURCE_SETTING,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
