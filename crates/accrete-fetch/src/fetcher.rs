//! Artifact fetcher
//!
//! Places capability artifacts under a fixed extension directory.
//!
//! # Guarantees
//! - An existing destination is not downloaded again unless `force` is set
//!   or a declared checksum no longer matches. Its mode and ownership are
//!   still brought in line with the request, without a source call.
//! - Content is written to a temp file beside the destination, permissions
//!   and ownership are applied to that temp file, and only then is it renamed
//!   into place. Readers never see a partial or over-permissive file.

use crate::error::FetchError;
use crate::source::ArtifactSource;
use accrete_capability::{ArtifactSpec, ContentHash, Url};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Read-only for everyone
pub const DEFAULT_ARTIFACT_MODE: u32 = 0o444;

/// A single retrieval request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Where to download from
    pub source_url: Url,
    /// Destination, relative to the extension directory or absolute under it
    pub dest: PathBuf,
    /// Owning uid
    pub owner: Option<u32>,
    /// Owning gid
    pub group: Option<u32>,
    /// Permission bits
    pub mode: u32,
    /// Always re-download
    pub force: bool,
    /// Expected digest
    pub checksum: Option<ContentHash>,
}

/// What a fetch did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// Fresh content was written
    Downloaded {
        /// Final location
        path: PathBuf,
        /// Content length
        size: u64,
        /// Content digest
        hash: ContentHash,
    },
    /// Destination already satisfied the request
    AlreadyPresent {
        /// Final location
        path: PathBuf,
    },
}

impl FetchOutcome {
    /// Final location of the artifact
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Downloaded { path, .. } | Self::AlreadyPresent { path } => path,
        }
    }

    /// Whether the source was contacted
    #[inline]
    #[must_use]
    pub fn downloaded(&self) -> bool {
        matches!(self, Self::Downloaded { .. })
    }
}

/// Fetches artifacts into an owned extension directory
#[derive(Debug)]
pub struct ArtifactFetcher<S> {
    source: S,
    root: PathBuf,
    default_owner: Option<u32>,
    default_group: Option<u32>,
    default_mode: u32,
}

impl<S: ArtifactSource> ArtifactFetcher<S> {
    /// Create fetcher writing beneath `root`
    #[must_use]
    pub fn new(source: S, root: impl Into<PathBuf>) -> Self {
        Self {
            source,
            root: root.into(),
            default_owner: None,
            default_group: None,
            default_mode: DEFAULT_ARTIFACT_MODE,
        }
    }

    /// Default ownership for artifacts that do not declare one
    #[must_use]
    pub fn with_default_owner(mut self, uid: Option<u32>, gid: Option<u32>) -> Self {
        self.default_owner = uid;
        self.default_group = gid;
        self
    }

    /// Default permission bits for artifacts that do not declare them
    #[must_use]
    pub fn with_default_mode(mut self, mode: u32) -> Self {
        self.default_mode = mode;
        self
    }

    /// Build a request from a capability's artifact spec, filling defaults
    #[must_use]
    pub fn request_for(&self, spec: &ArtifactSpec, force_all: bool) -> FetchRequest {
        FetchRequest {
            source_url: spec.source.clone(),
            dest: spec.dest.clone(),
            owner: spec.owner.or(self.default_owner),
            group: spec.group.or(self.default_group),
            mode: spec.mode.unwrap_or(self.default_mode),
            force: spec.force || force_all,
            checksum: spec.checksum,
        }
    }

    /// Resolve a requested destination inside the extension directory
    ///
    /// # Errors
    /// [`FetchError::InvalidDestination`] if the path climbs out of the
    /// directory, lies outside it, or names the directory itself.
    pub fn resolve_destination(&self, dest: &Path) -> Result<PathBuf, FetchError> {
        if dest.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(FetchError::invalid_destination(
                dest,
                "parent directory components are not allowed",
            ));
        }

        let resolved = if dest.is_absolute() {
            if !dest.starts_with(&self.root) {
                return Err(FetchError::invalid_destination(
                    dest,
                    format!("outside extension directory {}", self.root.display()),
                ));
            }
            dest.to_path_buf()
        } else {
            self.root.join(dest)
        };

        if resolved == self.root || resolved.file_name().is_none() {
            return Err(FetchError::invalid_destination(dest, "does not name a file"));
        }

        Ok(resolved)
    }

    /// Whether [`fetch`](Self::fetch) would leave the destination untouched
    ///
    /// # Errors
    /// Propagates destination resolution and read failures
    pub async fn is_present(&self, request: &FetchRequest) -> Result<bool, FetchError> {
        if request.force {
            return Ok(false);
        }
        let path = self.resolve_destination(&request.dest)?;
        Ok(self
            .existing_content(&path, request)
            .await?
            .is_some_and(|metadata| attributes_match(&metadata, request)))
    }

    /// Ensure the artifact is in place
    ///
    /// # Errors
    /// - [`FetchError::InvalidDestination`] for unusable destinations
    /// - [`FetchError::Network`] / [`FetchError::HttpStatus`] from the source
    /// - [`FetchError::ChecksumMismatch`] if downloaded bytes do not match
    /// - [`FetchError::PermissionDenied`] / [`FetchError::Io`] on write
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        let path = self.resolve_destination(&request.dest)?;

        if !request.force {
            if let Some(metadata) = self.existing_content(&path, request).await? {
                if attributes_match(&metadata, request) {
                    tracing::debug!(path = %path.display(), "artifact already present");
                } else {
                    apply_permissions(&path, request.mode, request.owner, request.group).await?;
                    tracing::info!(
                        path = %path.display(),
                        mode = format!("{:o}", request.mode),
                        "artifact already present, attributes restored"
                    );
                }
                return Ok(FetchOutcome::AlreadyPresent { path });
            }
        }

        let bytes = self.source.download(&request.source_url).await?;
        let hash = ContentHash::compute(&bytes);

        if let Some(expected) = request.checksum {
            if expected != hash {
                return Err(FetchError::ChecksumMismatch {
                    url: request.source_url.clone(),
                    expected,
                    actual: hash,
                });
            }
        }

        write_atomic(&path, &bytes, request).await?;

        tracing::info!(
            url = %request.source_url,
            path = %path.display(),
            size = bytes.len(),
            hash = %hash.short(),
            "artifact written"
        );

        Ok(FetchOutcome::Downloaded {
            path,
            size: bytes.len() as u64,
            hash,
        })
    }

    /// Metadata of the destination if its content can be kept
    async fn existing_content(
        &self,
        path: &Path,
        request: &FetchRequest,
    ) -> Result<Option<std::fs::Metadata>, FetchError> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(FetchError::io(path, e)),
        };

        if !metadata.is_file() {
            return Err(FetchError::invalid_destination(path, "exists and is not a file"));
        }

        if let Some(expected) = request.checksum {
            let existing = tokio::fs::read(path)
                .await
                .map_err(|e| FetchError::io(path, e))?;
            if ContentHash::compute(&existing) != expected {
                tracing::warn!(path = %path.display(), "existing artifact does not match checksum, refreshing");
                return Ok(None);
            }
        }

        Ok(Some(metadata))
    }
}

/// Whether an existing file already has the requested mode and ownership
#[cfg(unix)]
fn attributes_match(metadata: &std::fs::Metadata, request: &FetchRequest) -> bool {
    use std::os::unix::fs::{MetadataExt, PermissionsExt};

    metadata.permissions().mode() & 0o7777 == request.mode & 0o7777
        && request.owner.map_or(true, |uid| metadata.uid() == uid)
        && request.group.map_or(true, |gid| metadata.gid() == gid)
}

#[cfg(not(unix))]
fn attributes_match(_metadata: &std::fs::Metadata, _request: &FetchRequest) -> bool {
    true
}

/// Write `bytes` to `path` through a temp file in the same directory
async fn write_atomic(path: &Path, bytes: &[u8], request: &FetchRequest) -> Result<(), FetchError> {
    let parent = path
        .parent()
        .ok_or_else(|| FetchError::invalid_destination(path, "has no parent directory"))?;
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| FetchError::io(parent, e))?;

    let file_name = path
        .file_name()
        .ok_or_else(|| FetchError::invalid_destination(path, "does not name a file"))?;
    let tmp = parent.join(format!(
        ".{}.tmp-{}",
        file_name.to_string_lossy(),
        uuid::Uuid::new_v4().simple()
    ));

    let result: Result<(), FetchError> = async {
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&tmp).await.map_err(|e| FetchError::io(&tmp, e))?;
        file.write_all(bytes).await.map_err(|e| FetchError::io(&tmp, e))?;
        file.flush().await.map_err(|e| FetchError::io(&tmp, e))?;
        file.sync_all().await.map_err(|e| FetchError::io(&tmp, e))?;
        drop(file);

        apply_permissions(&tmp, request.mode, request.owner, request.group).await?;

        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| FetchError::io(path, e))
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

#[cfg(unix)]
async fn apply_permissions(
    path: &Path,
    mode: u32,
    owner: Option<u32>,
    group: Option<u32>,
) -> Result<(), FetchError> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|e| FetchError::io(path, e))?;

    if owner.is_some() || group.is_some() {
        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            std::os::unix::fs::chown(&target, owner, group).map_err(|e| FetchError::io(&target, e))
        })
        .await
        .map_err(|e| FetchError::io(path, std::io::Error::other(e)))??;
    }

    Ok(())
}

#[cfg(not(unix))]
async fn apply_permissions(
    _path: &Path,
    _mode: u32,
    _owner: Option<u32>,
    _group: Option<u32>,
) -> Result<(), FetchError> {
    Ok(())
}
