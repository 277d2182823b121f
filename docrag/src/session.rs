//! Retrieval session orchestrator.
//!
//! The [`RetrievalSession`] composes a [`Segmenter`] and an injected
//! [`EmbeddingProvider`] into the two retrieval workflows:
//!
//! - build: text → chunks → batch embedding → [`VectorIndex`]
//! - query: question → embedding → [`VectorIndex::search`] → context
//!
//! # Example
//!
//! ```rust,ignore
//! use docrag::{HashEmbeddingProvider, RagConfig, RetrievalSession};
//!
//! let session = RetrievalSession::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::default()))
//!     .build()?;
//!
//! let built = session.build_document_index(&text).await?;
//! let answer = session.answer_query(&built.index, "what is it?", 3).await?;
//! ```

use std::sync::Arc;

use tracing::{error, info};

use crate::chunking::{RecursiveSegmenter, Segmenter};
use crate::config::RagConfig;
use crate::document::{IndexSummary, QueryAnswer};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// A freshly built index together with the chunk texts it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltIndex {
    /// The index over the document's chunks.
    pub index: VectorIndex,
    /// The chunk texts in chunk order.
    pub chunk_texts: Vec<String>,
}

impl BuiltIndex {
    /// Chunk count and dimension of the built index.
    pub fn summary(&self) -> IndexSummary {
        IndexSummary { num_chunks: self.index.len(), dimension: self.index.dimension() }
    }
}

/// Keep embedding failures distinguishable from the engine's own errors.
fn embedding_failure(provider: &dyn EmbeddingProvider, err: RagError) -> RagError {
    match err {
        err @ RagError::EmbeddingError { .. } => err,
        other => RagError::EmbeddingError {
            provider: provider.name().to_string(),
            message: other.to_string(),
        },
    }
}

/// Reject provider output holding NaN or infinite components.
fn ensure_finite_embeddings<'a>(
    provider: &dyn EmbeddingProvider,
    vectors: impl IntoIterator<Item = &'a Vec<f32>>,
) -> Result<()> {
    match vectors.into_iter().position(|v| v.iter().any(|x| !x.is_finite())) {
        None => Ok(()),
        Some(position) => {
            error!(position, "embedding provider returned a non-finite vector");
            Err(RagError::EmbeddingError {
                provider: provider.name().to_string(),
                message: format!("vector {position} has a non-finite component"),
            })
        }
    }
}

/// The retrieval orchestrator.
///
/// Holds no per-document state: the same session can build and query any
/// number of documents concurrently. Construct one via
/// [`RetrievalSession::builder()`].
pub struct RetrievalSession {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    segmenter: Arc<dyn Segmenter>,
}

impl RetrievalSession {
    /// Create a new [`RetrievalSessionBuilder`].
    pub fn builder() -> RetrievalSessionBuilder {
        RetrievalSessionBuilder::default()
    }

    /// Return a reference to the session configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Build an index over a document: segment → embed → index.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyDocument`] if `raw_text` is empty, whitespace only,
    ///   or yields no chunks; the embedding provider is not called in that case
    /// - [`RagError::EmbeddingError`] if the provider fails, returns the
    ///   wrong number of vectors, or returns non-finite components
    /// - [`RagError::DimensionMismatch`] if the provider returns vectors of
    ///   differing lengths
    pub async fn build_document_index(&self, raw_text: &str) -> Result<BuiltIndex> {
        // 1. Segment
        if raw_text.trim().is_empty() {
            return Err(RagError::EmptyDocument);
        }
        let chunk_texts = self.segmenter.segment(raw_text);
        if chunk_texts.is_empty() {
            return Err(RagError::EmptyDocument);
        }

        // 2. Embed the whole batch
        let texts: Vec<&str> = chunk_texts.iter().map(String::as_str).collect();
        let vectors = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            error!(chunk_count = texts.len(), error = %e, "embedding failed during indexing");
            embedding_failure(self.embedding_provider.as_ref(), e)
        })?;
        if vectors.len() != chunk_texts.len() {
            error!(
                expected = chunk_texts.len(),
                actual = vectors.len(),
                "embedding provider returned wrong number of vectors"
            );
            return Err(RagError::EmbeddingError {
                provider: self.embedding_provider.name().to_string(),
                message: format!(
                    "returned {} vectors for {} inputs",
                    vectors.len(),
                    chunk_texts.len()
                ),
            });
        }
        ensure_finite_embeddings(self.embedding_provider.as_ref(), &vectors)?;

        // 3. Index; vector i belongs to chunk i
        let index = VectorIndex::build(chunk_texts.iter().cloned().zip(vectors))?;

        info!(chunk_count = index.len(), dimension = index.dimension(), "built document index");
        Ok(BuiltIndex { index, chunk_texts })
    }

    /// Answer a question from an index: embed → search → join context.
    ///
    /// The context is the retrieved chunk texts joined by a blank line, in
    /// rank order.
    ///
    /// # Errors
    ///
    /// - [`RagError::NoResults`] if the index holds no chunks
    /// - [`RagError::EmbeddingError`] if the question cannot be embedded or
    ///   its vector has non-finite components
    /// - [`RagError::DimensionMismatch`] if the question vector does not match
    ///   the index dimension
    pub async fn answer_query(
        &self,
        index: &VectorIndex,
        question: &str,
        k: usize,
    ) -> Result<QueryAnswer> {
        if index.is_empty() {
            return Err(RagError::NoResults);
        }

        // 1. Embed the question
        let query_vector = self.embedding_provider.embed(question).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            embedding_failure(self.embedding_provider.as_ref(), e)
        })?;
        ensure_finite_embeddings(self.embedding_provider.as_ref(), [&query_vector])?;

        // 2. Search
        let results = index.search(&query_vector, k)?;

        // 3. Assemble context
        let answer = QueryAnswer::from_results(question, results);
        info!(
            result_count = answer.results.len(),
            context_length = answer.context_length,
            "query completed"
        );
        Ok(answer)
    }
}

/// Builder for constructing a [`RetrievalSession`].
///
/// The embedding provider is required. The config defaults to
/// [`RagConfig::default()`] and the segmenter to a [`RecursiveSegmenter`]
/// built from the config.
///
/// # Example
///
/// ```rust,ignore
/// let session = RetrievalSession::builder()
///     .config(RagConfig::builder().chunk_size(500).chunk_overlap(50).build()?)
///     .embedding_provider(Arc::new(embedder))
///     .segmenter(Arc::new(FixedSizeSegmenter::new(500, 50)?))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RetrievalSessionBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    segmenter: Option<Arc<dyn Segmenter>>,
}

impl RetrievalSessionBuilder {
    /// Set the session configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Override the segmentation strategy.
    pub fn segmenter(mut self, segmenter: Arc<dyn Segmenter>) -> Self {
        self.segmenter = Some(segmenter);
        self
    }

    /// Build the [`RetrievalSession`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the embedding provider is missing
    /// or the config is invalid.
    pub fn build(self) -> Result<RetrievalSession> {
        let config = self.config.unwrap_or_default().validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let segmenter = match self.segmenter {
            Some(segmenter) => segmenter,
            None => Arc::new(RecursiveSegmenter::from_config(&config)?),
        };

        Ok(RetrievalSession { config, embedding_provider, segmenter })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32])
        }

        fn dimensions(&self) -> usize {
            1
        }
    }

    struct ShortProvider;

    #[async_trait]
    impl EmbeddingProvider for ShortProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0])
        }

        async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![0.0]])
        }

        fn dimensions(&self) -> usize {
            1
        }

        fn name(&self) -> &str {
            "short"
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(RagError::ConfigError("model not loaded".to_string()))
        }

        fn dimensions(&self) -> usize {
            4
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Embeds texts containing "nan" as NaN.
    struct NanProvider;

    #[async_trait]
    impl EmbeddingProvider for NanProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(if text.contains("nan") { vec![f32::NAN, 0.0] } else { vec![1.0, 0.0] })
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "nan"
        }
    }

    fn session(provider: Arc<dyn EmbeddingProvider>) -> RetrievalSession {
        let config = RagConfig::builder().chunk_size(10).chunk_overlap(2).build().unwrap();
        RetrievalSession::builder().config(config).embedding_provider(provider).build().unwrap()
    }

    #[tokio::test]
    async fn empty_document_never_reaches_the_provider() {
        let provider = Arc::new(CountingProvider { calls: AtomicUsize::new(0) });
        let err = session(provider.clone()).build_document_index("").await.unwrap_err();
        assert!(matches!(err, RagError::EmptyDocument));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn whitespace_document_never_reaches_the_provider() {
        let provider = Arc::new(CountingProvider { calls: AtomicUsize::new(0) });
        let err = session(provider.clone()).build_document_index(" \n\t  ").await.unwrap_err();
        assert!(matches!(err, RagError::EmptyDocument));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_finite_embeddings_are_embedding_errors() {
        let session = session(Arc::new(NanProvider));
        let err = session.build_document_index("a nan b").await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingError { ref provider, .. } if provider == "nan"));

        let built = session.build_document_index("plain").await.unwrap();
        let err = session.answer_query(&built.index, "nan", 1).await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingError { .. }));
    }

    #[tokio::test]
    async fn build_embeds_every_chunk() {
        let provider = Arc::new(CountingProvider { calls: AtomicUsize::new(0) });
        let built = session(provider.clone())
            .build_document_index("A cat sat. A dog ran. A bird flew.")
            .await
            .unwrap();
        assert_eq!(built.chunk_texts.len(), built.index.len());
        assert_eq!(provider.calls.load(Ordering::SeqCst), built.index.len());
        assert_eq!(built.summary().dimension, 1);
    }

    #[tokio::test]
    async fn wrong_vector_count_is_embedding_error() {
        let err = session(Arc::new(ShortProvider))
            .build_document_index("A cat sat. A dog ran. A bird flew.")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::EmbeddingError { ref provider, .. } if provider == "short"));
    }

    #[tokio::test]
    async fn provider_failures_surface_as_embedding_errors() {
        let err = session(Arc::new(FailingProvider)).build_document_index("hello").await.unwrap_err();
        assert!(!err.is_engine_error());
        assert!(err.to_string().contains("model not loaded"));
    }

    #[test]
    fn builder_requires_embedding_provider() {
        assert!(matches!(RetrievalSession::builder().build(), Err(RagError::ConfigError(_))));
    }
}
