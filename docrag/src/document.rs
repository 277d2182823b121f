//! Data types for chunks, search results, and caller-facing summaries.

use serde::{Deserialize, Serialize};

/// A segment of a document's text with its vector embedding.
///
/// Chunks are created by [`VectorIndex::build`](crate::VectorIndex::build) and
/// never change afterwards; `index` equals the chunk's position in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub(crate) index: usize,
    pub(crate) text: String,
    pub(crate) vector: Vec<f32>,
}

impl Chunk {
    /// The chunk's position within its document, starting at zero.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The chunk's text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The chunk's embedding vector.
    pub fn vector(&self) -> &[f32] {
        &self.vector
    }
}

/// A retrieved chunk with its rank and similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Position of the matched chunk within its document.
    pub chunk_index: usize,
    /// The matched chunk's text.
    pub chunk_text: String,
    /// Squared Euclidean distance between the query and the chunk vector.
    pub distance: f32,
    /// `1 / (1 + distance)`: exactly 1.0 for identical vectors, falling
    /// toward zero as distance grows. A monotonic transform, not a probability.
    pub similarity_score: f32,
    /// One-based rank in ascending distance order.
    pub rank: usize,
}

/// Metadata handed back after a document has been indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSummary {
    /// Number of chunks stored in the index.
    pub num_chunks: usize,
    /// Embedding dimension of the index.
    pub dimension: usize,
}

/// The retrieved context for a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnswer {
    /// The question as asked.
    pub query: String,
    /// Retrieved chunk texts joined by blank lines, in rank order.
    pub context: String,
    /// The ranked chunks that make up `context`.
    pub results: Vec<SearchResult>,
    /// Length of `context` in characters.
    pub context_length: usize,
}

impl QueryAnswer {
    pub(crate) fn from_results(query: &str, results: Vec<SearchResult>) -> Self {
        let context =
            results.iter().map(|r| r.chunk_text.as_str()).collect::<Vec<_>>().join("\n\n");
        let context_length = context.chars().count();
        Self { query: query.to_string(), context, results, context_length }
    }
}
