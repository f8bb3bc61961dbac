//! Accrete Core - Capability Orchestrator
//!
//! Turns a list of optional deployment features into one conflict-free
//! configuration:
//! - Validates every enabled capability's required settings
//! - Places its artifact under the extension directory
//! - Merges its contributions into the shared [`AccretionStore`]
//!
//! Capabilities are processed sequentially in declaration order and the run
//! stops at the first error. Re-running with the persisted store is a no-op
//! for capabilities that already contributed.
//!
//! # Example
//!
//! ```rust,ignore
//! use accrete_core::prelude::*;
//!
//! let manifest = Manifest::load("deploy.yml")?;
//! let capabilities = manifest.capabilities()?;
//!
//! let mut orchestrator = CapabilityOrchestrator::from_config(&manifest.engine)?;
//! let store = orchestrator.run(&capabilities).await?;
//! println!("{}", serde_json::to_string_pretty(&store.render())?);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod manifest;
pub mod orchestrator;
pub mod state;

pub use config::EngineConfig;
pub use error::EngineError;
pub use manifest::{CapabilityEntry, Manifest, ManifestError, SettingRef};
pub use orchestrator::{CapabilityOrchestrator, CapabilityRecord, RunReport};
pub use state::{allowed_transitions, validate_transition, CapabilityState, IllegalTransition};

pub use accrete_composition::{AccretionStore, MergeOutcome, RenderedConfig, StoreSnapshot};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running the engine
    pub use crate::{
        AccretionStore, CapabilityOrchestrator, CapabilityState, EngineConfig, EngineError,
        Manifest, RunReport, StoreSnapshot,
    };
    pub use accrete_capability::{Capability, CapabilityId, Contributions};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
