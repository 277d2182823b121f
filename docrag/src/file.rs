//! File-backed index store.
//!
//! Each location maps to `<root>/<location>.index.json`. Saves write a
//! uniquely named temp file in the same directory, fsync it, rename it over
//! the target, and fsync the directory. A crash mid-write leaves the previous
//! blob intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{LoadFailureReason, RagError, Result};
use crate::index::VectorIndex;
use crate::store::{IndexStore, decode_index, encode_index};

const INDEX_EXTENSION: &str = "index.json";

/// An [`IndexStore`] keeping one JSON blob per location under a root directory.
///
/// Locations must be plain file-name components: non-empty, without path
/// separators, and not `.` or `..`.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::{FileIndexStore, IndexStore};
///
/// let store = FileIndexStore::new("media/indexes");
/// store.save("document_7", &index).await?;
/// ```
#[derive(Debug, Clone)]
pub struct FileIndexStore {
    root: PathBuf,
}

impl FileIndexStore {
    /// Create a store rooted at `root`. The directory is created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory holding the blobs.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file path backing `location`, or `None` if the location is not a
    /// valid file-name component.
    pub fn path_for(&self, location: &str) -> Option<PathBuf> {
        let valid = !location.is_empty()
            && location != "."
            && location != ".."
            && !location.contains(['/', '\\', '\0']);
        valid.then(|| self.root.join(format!("{location}.{INDEX_EXTENSION}")))
    }

    fn require_path(&self, location: &str) -> Result<PathBuf> {
        self.path_for(location)
            .ok_or_else(|| RagError::io_failure(location, "invalid location name"))
    }

    async fn write_atomic(&self, location: &str, target: &Path, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            RagError::io_failure(location, format!("failed to create '{}': {e}", self.root.display()))
        })?;

        let temp = self.root.join(format!(".{location}.{}.tmp", uuid::Uuid::new_v4()));
        let written = async {
            let mut file = tokio::fs::File::create(&temp).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            tokio::fs::rename(&temp, target).await
        }
        .await;

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&temp).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(path = %temp.display(), error = %cleanup, "failed to remove temp file");
                }
            }
            return Err(RagError::io_failure(location, format!("failed to write index: {e}")));
        }

        sync_dir(&self.root).await.map_err(|e| {
            RagError::io_failure(location, format!("failed to sync '{}': {e}", self.root.display()))
        })
    }
}

/// Flush a directory's entries so a completed rename survives power loss.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

/// Directories cannot be opened for syncing here; the rename is still atomic.
#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl IndexStore for FileIndexStore {
    async fn save(&self, location: &str, index: &VectorIndex) -> Result<()> {
        let target = self.require_path(location)?;
        let bytes = encode_index(location, index)?;
        self.write_atomic(location, &target, &bytes).await?;

        info!(
            location,
            path = %target.display(),
            chunk_count = index.len(),
            dimension = index.dimension(),
            bytes = bytes.len(),
            "saved index"
        );
        Ok(())
    }

    async fn load(&self, location: &str) -> Result<VectorIndex> {
        let path = self
            .path_for(location)
            .ok_or_else(|| RagError::load_failure(location, LoadFailureReason::NotFound))?;

        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            let reason = if e.kind() == ErrorKind::NotFound {
                LoadFailureReason::NotFound
            } else {
                LoadFailureReason::Corrupt(format!("unreadable: {e}"))
            };
            RagError::load_failure(location, reason)
        })?;

        let index = decode_index(location, &bytes).inspect_err(|e| {
            warn!(location, path = %path.display(), error = %e, "rejected persisted index");
        })?;
        debug!(location, chunk_count = index.len(), dimension = index.dimension(), "loaded index");
        Ok(index)
    }

    async fn delete(&self, location: &str) -> Result<()> {
        let path = self.require_path(location)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(location, "deleted index");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RagError::io_failure(location, format!("failed to delete index: {e}"))),
        }
    }

    async fn exists(&self, location: &str) -> Result<bool> {
        let Some(path) = self.path_for(location) else {
            return Ok(false);
        };
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| RagError::io_failure(location, format!("failed to stat index: {e}")))
    }
}
