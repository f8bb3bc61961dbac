//! Error types for artifact retrieval
//!
//! Covers:
//! - Source failures (network, HTTP status, unreadable local source)
//! - Destination problems (outside the extension directory, not a file)
//! - Filesystem permission and IO failures
//! - Integrity failures (checksum mismatch)

use accrete_capability::{ContentHash, Url};
use std::path::{Path, PathBuf};

/// Coarse classification of a fetch failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Source could not be retrieved
    Network,
    /// Filesystem refused the operation
    PermissionDenied,
    /// Destination is unusable
    InvalidDestination,
    /// Content did not match the declared checksum
    Integrity,
    /// Other filesystem failure
    Io,
}

/// Errors during artifact retrieval
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Transport failure talking to the source
    #[error("network error fetching {url}: {message}")]
    Network {
        /// Source URL
        url: Url,
        /// Transport diagnostic
        message: String,
    },

    /// Source answered with a non-success status
    #[error("fetching {url} returned HTTP {status}")]
    HttpStatus {
        /// Source URL
        url: Url,
        /// HTTP status code
        status: u16,
    },

    /// HTTP client could not be constructed
    #[error("http client setup failed: {0}")]
    Client(String),

    /// Filesystem permission denied
    #[error("permission denied on {path}: {source}")]
    PermissionDenied {
        /// Path being touched
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Destination rejected
    #[error("invalid destination {path}: {reason}")]
    InvalidDestination {
        /// Requested destination
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },

    /// Downloaded or existing content does not match its declared digest
    #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Source URL
        url: Url,
        /// Declared digest
        expected: ContentHash,
        /// Digest of the received bytes
        actual: ContentHash,
    },

    /// Other IO error
    #[error("io error on {path}: {source}")]
    Io {
        /// Path being touched
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Wrap an IO error, classifying permission failures
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { path, source }
        } else {
            Self::Io { path, source }
        }
    }

    /// Create network error
    pub fn network(url: &Url, message: impl ToString) -> Self {
        Self::Network {
            url: url.clone(),
            message: message.to_string(),
        }
    }

    /// Create invalid destination error
    pub fn invalid_destination(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidDestination {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Classification of this error
    #[must_use]
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Network { .. } | Self::HttpStatus { .. } | Self::Client(_) => {
                FetchErrorKind::Network
            }
            Self::PermissionDenied { .. } => FetchErrorKind::PermissionDenied,
            Self::InvalidDestination { .. } => FetchErrorKind::InvalidDestination,
            Self::ChecksumMismatch { .. } => FetchErrorKind::Integrity,
            Self::Io { .. } => FetchErrorKind::Io,
        }
    }

    /// Whether re-running the whole process may succeed without config changes
    ///
    /// Only network failures qualify; local I/O problems need the operator.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == FetchErrorKind::Network
    }
}
