//! Durable storage for built vector indexes.
//!
//! An [`IndexStore`] maps a location (one per document) to a persisted
//! [`VectorIndex`]. Writes replace the whole blob atomically, so readers
//! observe either the previous index or the new one and never a partial write.
//!
//! The persisted form is JSON:
//!
//! ```json
//! {"format_version": 1, "dimension": 3, "chunk_count": 2,
//!  "chunks": [{"chunk_index": 0, "text": "...", "vector": [0.1, 0.2, 0.3]}, ...]}
//! ```
//!
//! `format_version` is read before anything else; a blob written by an
//! unknown version is rejected without interpreting the rest.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{LoadFailureReason, RagError, Result};
use crate::index::VectorIndex;

/// The persisted format version written by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// A storage backend for persisted vector indexes.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::{FileIndexStore, IndexStore};
///
/// let store = FileIndexStore::new("/var/lib/docrag/indexes");
/// store.save("document_42", &index).await?;
/// let index = store.load("document_42").await?;
/// ```
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Persist `index` at `location`, atomically replacing any existing blob.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IoFailure`] if the blob cannot be written.
    async fn save(&self, location: &str, index: &VectorIndex) -> Result<()>;

    /// Load the index persisted at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::LoadFailure`] if nothing is stored there or the
    /// blob is corrupt, inconsistent, or of an unsupported version.
    async fn load(&self, location: &str) -> Result<VectorIndex>;

    /// Remove the blob at `location`. Removing a missing blob succeeds.
    async fn delete(&self, location: &str) -> Result<()>;

    /// Whether a blob exists at `location`.
    async fn exists(&self, location: &str) -> Result<bool>;
}

#[derive(Serialize)]
struct PersistedChunkRef<'a> {
    chunk_index: usize,
    text: &'a str,
    vector: &'a [f32],
}

#[derive(Serialize)]
struct PersistedIndexRef<'a> {
    format_version: u32,
    dimension: usize,
    chunk_count: usize,
    chunks: Vec<PersistedChunkRef<'a>>,
}

#[derive(Deserialize)]
struct VersionProbe {
    format_version: u32,
}

#[derive(Deserialize)]
struct PersistedChunk {
    chunk_index: usize,
    text: String,
    vector: Vec<f32>,
}

#[derive(Deserialize)]
struct PersistedIndex {
    dimension: usize,
    chunk_count: usize,
    chunks: Vec<PersistedChunk>,
}

/// Serialize an index into its persisted form.
pub fn encode_index(location: &str, index: &VectorIndex) -> Result<Vec<u8>> {
    let persisted = PersistedIndexRef {
        format_version: FORMAT_VERSION,
        dimension: index.dimension(),
        chunk_count: index.len(),
        chunks: index
            .chunks()
            .iter()
            .map(|chunk| PersistedChunkRef {
                chunk_index: chunk.index(),
                text: chunk.text(),
                vector: chunk.vector(),
            })
            .collect(),
    };
    serde_json::to_vec(&persisted)
        .map_err(|e| RagError::io_failure(location, format!("failed to serialize index: {e}")))
}

/// Parse and validate a persisted index.
///
/// # Errors
///
/// Returns [`RagError::LoadFailure`] with reason `Corrupt`,
/// `UnsupportedVersion`, or `Inconsistent`.
pub fn decode_index(location: &str, bytes: &[u8]) -> Result<VectorIndex> {
    let corrupt = |e: serde_json::Error| {
        RagError::load_failure(location, LoadFailureReason::Corrupt(e.to_string()))
    };
    let inconsistent =
        |detail: String| RagError::load_failure(location, LoadFailureReason::Inconsistent(detail));

    let probe: VersionProbe = serde_json::from_slice(bytes).map_err(corrupt)?;
    if probe.format_version != FORMAT_VERSION {
        return Err(RagError::load_failure(
            location,
            LoadFailureReason::UnsupportedVersion(probe.format_version),
        ));
    }

    let persisted: PersistedIndex = serde_json::from_slice(bytes).map_err(corrupt)?;
    if persisted.chunk_count != persisted.chunks.len() {
        return Err(inconsistent(format!(
            "header declares {} chunks, found {}",
            persisted.chunk_count,
            persisted.chunks.len()
        )));
    }
    if let Some((position, chunk)) =
        persisted.chunks.iter().enumerate().find(|(position, c)| c.chunk_index != *position)
    {
        return Err(inconsistent(format!(
            "chunk at position {position} has index {}",
            chunk.chunk_index
        )));
    }
    if let Some(chunk) = persisted.chunks.iter().find(|c| c.vector.len() != persisted.dimension) {
        return Err(inconsistent(format!(
            "chunk {} has {} components, header declares dimension {}",
            chunk.chunk_index,
            chunk.vector.len(),
            persisted.dimension
        )));
    }

    VectorIndex::build(persisted.chunks.into_iter().map(|c| (c.text, c.vector)))
        .map_err(|e| inconsistent(e.to_string()))
}
