//! Accrete Artifact Fetcher
//!
//! Retrieves the executable artifacts capabilities depend on (auth provider
//! modules, rule modules, exporters) into a fixed, owned extension directory.
//!
//! # Architecture
//!
//! ```text
//! FetchRequest → resolve under root → already present? ─yes→ AlreadyPresent
//!                                           │no
//!                                           ↓
//!                   ArtifactSource::download → checksum → temp file
//!                   → chmod/chown → rename → Downloaded
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use accrete_fetch::{ArtifactFetcher, HttpSource};
//! use std::time::Duration;
//!
//! let source = HttpSource::new(Duration::from_secs(30), "accrete")?;
//! let fetcher = ArtifactFetcher::new(source, "/matrix/synapse/ext");
//! let outcome = fetcher.fetch(&fetcher.request_for(&spec, false)).await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod fetcher;
pub mod source;

pub use error::{FetchError, FetchErrorKind};
pub use fetcher::{ArtifactFetcher, FetchOutcome, FetchRequest, DEFAULT_ARTIFACT_MODE};
pub use source::{ArtifactSource, HttpSource};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
