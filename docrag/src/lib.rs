//! # docrag
//!
//! Per-document retrieval engine.
//!
//! A document's text is split into overlapping chunks, each chunk is embedded
//! by an injected [`EmbeddingProvider`], and the vectors are held in an
//! immutable [`VectorIndex`] answering exact nearest-neighbor queries. Indexes
//! are persisted through an [`IndexStore`] with atomic replacement, and a
//! query returns the retrieved chunks joined into a context string.
//!
//! ## Overview
//!
//! - [`Segmenter`] — [`RecursiveSegmenter`] (natural breakpoints) and
//!   [`FixedSizeSegmenter`] (hard cuts)
//! - [`VectorIndex`] — exact squared-L2 search with stable tie-breaking
//! - [`IndexStore`] — [`FileIndexStore`] and [`InMemoryIndexStore`]
//! - [`RetrievalSession`] — build and query workflows
//! - [`DocumentIndexService`] — per-document lifecycle on top of a store
//!
//! ## Features
//!
//! - `openai` — [`openai::OpenAIEmbeddingProvider`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docrag::{DocumentIndexService, FileIndexStore, HashEmbeddingProvider, RetrievalSession};
//!
//! let session = RetrievalSession::builder()
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::default()))
//!     .build()?;
//! let service = DocumentIndexService::new(
//!     Arc::new(session),
//!     Arc::new(FileIndexStore::new("indexes")),
//! );
//!
//! let summary = service.index_document("1", &text).await?;
//! let answer = service.query_document("1", "What does it say about cats?", 3).await?;
//! println!("{}", answer.context);
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod file;
pub mod hashing;
pub mod index;
pub mod memory;
pub mod service;
pub mod session;
pub mod store;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{FixedSizeSegmenter, RecursiveSegmenter, Segmenter, segment};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, IndexSummary, QueryAnswer, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{LoadFailureReason, RagError, Result};
pub use extract::{PlainTextExtractor, TextExtractor};
pub use file::FileIndexStore;
pub use hashing::HashEmbeddingProvider;
pub use index::VectorIndex;
pub use memory::InMemoryIndexStore;
pub use service::{DocumentIndexService, IndexState};
pub use session::{BuiltIndex, RetrievalSession, RetrievalSessionBuilder};
pub use store::{FORMAT_VERSION, IndexStore, decode_index, encode_index};
