//! Error types for the `docrag` crate.

use std::fmt;

use thiserror::Error;

/// Errors that can occur while building, persisting, or querying a document index.
#[derive(Debug, Error)]
pub enum RagError {
    /// The document had no text, or segmentation produced no chunks.
    #[error("Document is empty: no text to index")]
    EmptyDocument,

    /// A vector index was requested over zero entries.
    #[error("Cannot build an index from an empty input")]
    EmptyInput,

    /// A vector's length disagrees with the index dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension fixed by the index (or by its first vector).
        expected: usize,
        /// The offending vector's length.
        actual: usize,
    },

    /// A vector holds a NaN or infinite component.
    #[error("Non-finite component in {vector}")]
    NonFiniteVector {
        /// Which vector was rejected, e.g. `chunk 3` or `query`.
        vector: String,
    },

    /// The external embedding capability failed.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A persisted index could not be loaded.
    #[error("Failed to load index '{location}': {reason}")]
    LoadFailure {
        /// The store location that was read.
        location: String,
        /// Why the blob was rejected.
        reason: LoadFailureReason,
    },

    /// A persisted index could not be written or removed.
    #[error("I/O failure at '{location}': {message}")]
    IoFailure {
        /// The store location that was written.
        location: String,
        /// A description of the failure.
        message: String,
    },

    /// A query ran against an index holding no chunks.
    #[error("No results: the index holds no chunks")]
    NoResults,

    /// The document is already being indexed by another caller.
    #[error("Document '{document_id}' is still being indexed")]
    IndexInProgress {
        /// The document whose build is in flight.
        document_id: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RagError {
    /// Returns `true` for failures raised by this engine, `false` for
    /// failures propagated from the embedding capability.
    pub fn is_engine_error(&self) -> bool {
        !matches!(self, RagError::EmbeddingError { .. })
    }

    pub(crate) fn load_failure(location: impl Into<String>, reason: LoadFailureReason) -> Self {
        RagError::LoadFailure { location: location.into(), reason }
    }

    pub(crate) fn io_failure(location: impl Into<String>, message: impl fmt::Display) -> Self {
        RagError::IoFailure { location: location.into(), message: message.to_string() }
    }
}

/// The reason a persisted index was rejected by a loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailureReason {
    /// Nothing is stored at the location.
    NotFound,
    /// The blob could not be read or parsed.
    Corrupt(String),
    /// The blob was written by an unknown format version.
    UnsupportedVersion(u32),
    /// The blob parsed but its header and contents disagree.
    Inconsistent(String),
}

impl fmt::Display for LoadFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadFailureReason::NotFound => write!(f, "not found"),
            LoadFailureReason::Corrupt(detail) => write!(f, "corrupt ({detail})"),
            LoadFailureReason::UnsupportedVersion(version) => {
                write!(f, "unsupported format version {version}")
            }
            LoadFailureReason::Inconsistent(detail) => write!(f, "inconsistent ({detail})"),
        }
    }
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
