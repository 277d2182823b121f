//! Caller-facing document indexing service.
//!
//! [`DocumentIndexService`] ties a [`RetrievalSession`] to an [`IndexStore`]
//! and tracks each document through `Unindexed → Indexing → Indexed`.
//! Re-indexing a document builds and persists a complete replacement; until
//! the replacement is durable, queries keep reading the previous index.
//!
//! # Example
//!
//! ```rust,ignore
//! use docrag::{DocumentIndexService, FileIndexStore};
//!
//! let service = DocumentIndexService::new(Arc::new(session), Arc::new(FileIndexStore::new(dir)));
//! let summary = service.index_document("42", &text).await?;
//! let answer = service.query_document("42", "What is covered?", 3).await?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::document::{IndexSummary, QueryAnswer};
use crate::error::{LoadFailureReason, RagError, Result};
use crate::extract::{PlainTextExtractor, TextExtractor};
use crate::index::VectorIndex;
use crate::session::RetrievalSession;
use crate::store::IndexStore;

/// Where a document is in its indexing lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    /// No index has been persisted for the document.
    Unindexed,
    /// A build is in flight. A previous index may still serve queries.
    Indexing,
    /// A complete index is persisted.
    Indexed,
}

#[derive(Debug, Default)]
struct DocumentEntry {
    building: bool,
    current: Option<Arc<VectorIndex>>,
}

/// Per-document entries plus a counter bumped whenever a published index is
/// replaced or deleted.
#[derive(Debug, Default)]
struct Registry {
    generation: u64,
    documents: HashMap<String, DocumentEntry>,
}

/// Clears a document's `building` flag when a build finishes or is dropped.
struct BuildGuard<'a> {
    registry: &'a Mutex<Registry>,
    document_id: &'a str,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let documents = &mut registry.documents;
        if let Some(entry) = documents.get_mut(self.document_id) {
            entry.building = false;
            if entry.current.is_none() {
                documents.remove(self.document_id);
            }
        }
    }
}

/// Indexes documents and answers questions against their persisted indexes.
///
/// Different documents can be indexed and queried concurrently. Loaded
/// indexes are shared as `Arc<VectorIndex>` and swapped wholesale when a
/// rebuild completes, so queries never take a lock while searching.
pub struct DocumentIndexService {
    session: Arc<RetrievalSession>,
    store: Arc<dyn IndexStore>,
    extractor: Arc<dyn TextExtractor>,
    registry: Mutex<Registry>,
}

impl DocumentIndexService {
    /// Create a service using [`PlainTextExtractor`] for raw sources.
    pub fn new(session: Arc<RetrievalSession>, store: Arc<dyn IndexStore>) -> Self {
        Self {
            session,
            store,
            extractor: Arc::new(PlainTextExtractor),
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Replace the text extractor used by [`index_source`](Self::index_source).
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Return a reference to the retrieval session.
    pub fn session(&self) -> &Arc<RetrievalSession> {
        &self.session
    }

    /// The store location holding a document's index.
    pub fn location_for(document_id: &str) -> String {
        format!("document_{document_id}")
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Report a document's lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IoFailure`] if the store cannot be checked.
    pub async fn state(&self, document_id: &str) -> Result<IndexState> {
        {
            let registry = self.registry();
            if let Some(entry) = registry.documents.get(document_id) {
                if entry.building {
                    return Ok(IndexState::Indexing);
                }
                if entry.current.is_some() {
                    return Ok(IndexState::Indexed);
                }
            }
        }
        let exists = self.store.exists(&Self::location_for(document_id)).await?;
        Ok(if exists { IndexState::Indexed } else { IndexState::Unindexed })
    }

    /// Build, persist, and publish an index for `raw_text`.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexInProgress`] if the document is already being indexed
    /// - any error from [`RetrievalSession::build_document_index`] or
    ///   [`IndexStore::save`]; the previous index, if any, stays in place
    pub async fn index_document(&self, document_id: &str, raw_text: &str) -> Result<IndexSummary> {
        {
            let mut registry = self.registry();
            let entry = registry.documents.entry(document_id.to_string()).or_default();
            if entry.building {
                warn!(document.id = %document_id, "rejected concurrent indexing request");
                return Err(RagError::IndexInProgress { document_id: document_id.to_string() });
            }
            entry.building = true;
        }
        let _guard = BuildGuard { registry: &self.registry, document_id };

        let location = Self::location_for(document_id);
        let built = self.session.build_document_index(raw_text).await.inspect_err(|e| {
            warn!(document.id = %document_id, error = %e, "indexing failed");
        })?;
        self.store.save(&location, &built.index).await.inspect_err(|e| {
            warn!(document.id = %document_id, error = %e, "persisting index failed");
        })?;

        let summary = built.summary();
        {
            let mut registry = self.registry();
            registry.generation += 1;
            registry.documents.entry(document_id.to_string()).or_default().current =
                Some(Arc::new(built.index));
        }

        info!(
            document.id = %document_id,
            chunk_count = summary.num_chunks,
            dimension = summary.dimension,
            "indexed document"
        );
        Ok(summary)
    }

    /// Extract text from `source` and index it.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyDocument`] if extraction yields no text, or
    /// any error from [`index_document`](Self::index_document).
    pub async fn index_source(&self, document_id: &str, source: &[u8]) -> Result<IndexSummary> {
        let text = self.extractor.extract_text(source);
        if text.is_empty() {
            warn!(document.id = %document_id, bytes = source.len(), "no text extracted");
            return Err(RagError::EmptyDocument);
        }
        self.index_document(document_id, &text).await
    }

    async fn current_index(&self, document_id: &str) -> Result<Arc<VectorIndex>> {
        let generation = {
            let registry = self.registry();
            if let Some(index) = registry.documents.get(document_id).and_then(|e| e.current.clone())
            {
                return Ok(index);
            }
            registry.generation
        };

        let location = Self::location_for(document_id);
        let loaded = match self.store.load(&location).await {
            Ok(index) => Arc::new(index),
            Err(RagError::LoadFailure { reason: LoadFailureReason::NotFound, .. })
                if self.registry().documents.get(document_id).is_some_and(|e| e.building) =>
            {
                return Err(RagError::IndexInProgress { document_id: document_id.to_string() });
            }
            Err(e) => return Err(e),
        };

        // A publish or delete ran during the load: answer from it, don't cache it.
        let mut registry = self.registry();
        if registry.generation != generation {
            return Ok(loaded);
        }
        let entry = registry.documents.entry(document_id.to_string()).or_default();
        Ok(entry.current.get_or_insert(loaded).clone())
    }

    /// Retrieve the `k` chunks most relevant to `question`.
    ///
    /// # Errors
    ///
    /// - [`RagError::LoadFailure`] if the document has no readable index
    /// - [`RagError::IndexInProgress`] if its first index is still being built
    /// - any error from [`RetrievalSession::answer_query`]
    pub async fn query_document(
        &self,
        document_id: &str,
        question: &str,
        k: usize,
    ) -> Result<QueryAnswer> {
        let index = self.current_index(document_id).await?;
        let answer = self.session.answer_query(&index, question, k).await?;
        info!(document.id = %document_id, result_count = answer.results.len(), "answered query");
        Ok(answer)
    }

    /// Remove a document's persisted and cached index.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexInProgress`] if the document is being indexed
    /// - [`RagError::IoFailure`] if the blob cannot be removed; the cached
    ///   index is kept in that case
    pub async fn delete_document(&self, document_id: &str) -> Result<()> {
        if self.registry().documents.get(document_id).is_some_and(|e| e.building) {
            return Err(RagError::IndexInProgress { document_id: document_id.to_string() });
        }
        self.store.delete(&Self::location_for(document_id)).await?;

        // Evict after the blob is gone; loads begun earlier see a new generation.
        let mut registry = self.registry();
        registry.generation += 1;
        if let Some(entry) = registry.documents.get_mut(document_id) {
            entry.current = None;
            if !entry.building {
                registry.documents.remove(document_id);
            }
        }
        drop(registry);

        info!(document.id = %document_id, "deleted document index");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::hashing::HashEmbeddingProvider;
    use crate::memory::InMemoryIndexStore;

    /// Holds each `load` open until released.
    #[derive(Default)]
    struct GatedStore {
        inner: InMemoryIndexStore,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl IndexStore for GatedStore {
        async fn save(&self, location: &str, index: &VectorIndex) -> Result<()> {
            self.inner.save(location, index).await
        }

        async fn load(&self, location: &str) -> Result<VectorIndex> {
            let loaded = self.inner.load(location).await;
            self.entered.notify_one();
            self.release.notified().await;
            loaded
        }

        async fn delete(&self, location: &str) -> Result<()> {
            self.inner.delete(location).await
        }

        async fn exists(&self, location: &str) -> Result<bool> {
            self.inner.exists(location).await
        }
    }

    fn session() -> Arc<RetrievalSession> {
        let session = RetrievalSession::builder()
            .embedding_provider(Arc::new(HashEmbeddingProvider::new(32).unwrap()))
            .build()
            .unwrap();
        Arc::new(session)
    }

    fn service() -> DocumentIndexService {
        DocumentIndexService::new(session(), Arc::new(InMemoryIndexStore::new()))
    }

    #[tokio::test]
    async fn lifecycle_moves_from_unindexed_to_indexed() {
        let service = service();
        assert_eq!(service.state("1").await.unwrap(), IndexState::Unindexed);

        let summary = service.index_document("1", "Rust has no garbage collector.").await.unwrap();
        assert_eq!(summary, IndexSummary { num_chunks: 1, dimension: 32 });
        assert_eq!(service.state("1").await.unwrap(), IndexState::Indexed);

        service.delete_document("1").await.unwrap();
        assert_eq!(service.state("1").await.unwrap(), IndexState::Unindexed);
    }

    #[tokio::test]
    async fn failed_reindex_keeps_previous_index() {
        let service = service();
        service.index_document("1", "Original content about rivers.").await.unwrap();

        let err = service.index_document("1", "").await.unwrap_err();
        assert!(matches!(err, RagError::EmptyDocument));
        assert_eq!(service.state("1").await.unwrap(), IndexState::Indexed);

        let answer = service.query_document("1", "rivers", 1).await.unwrap();
        assert!(answer.context.contains("rivers"));
    }

    #[tokio::test]
    async fn empty_source_is_empty_document() {
        let err = service().index_source("1", b"   ").await.unwrap_err();
        assert!(matches!(err, RagError::EmptyDocument));
    }

    #[tokio::test]
    async fn querying_unknown_document_is_load_failure() {
        let err = service().query_document("missing", "anything", 3).await.unwrap_err();
        assert!(matches!(err, RagError::LoadFailure { reason: LoadFailureReason::NotFound, .. }));
    }

    #[tokio::test]
    async fn delete_during_load_does_not_resurrect_the_document() {
        let store = Arc::new(GatedStore::default());
        let writer = DocumentIndexService::new(session(), store.clone());
        writer.index_document("1", "secret text").await.unwrap();

        // A fresh service has nothing cached, so its query must load.
        let service = Arc::new(DocumentIndexService::new(session(), store.clone()));
        let query = {
            let service = service.clone();
            tokio::spawn(async move { service.query_document("1", "secret", 1).await })
        };
        store.entered.notified().await;

        service.delete_document("1").await.unwrap();
        store.release.notify_one();
        let answer = query.await.unwrap().unwrap();
        assert_eq!(answer.results[0].chunk_text, "secret text");

        assert!(!store.exists("document_1").await.unwrap());
        assert_eq!(service.state("1").await.unwrap(), IndexState::Unindexed);
        store.release.notify_one();
        let err = service.query_document("1", "secret", 1).await.unwrap_err();
        assert!(matches!(err, RagError::LoadFailure { reason: LoadFailureReason::NotFound, .. }));
    }

    #[tokio::test]
    async fn failed_first_index_leaves_no_entry() {
        let service = service();
        for id in ["1", "2", "3"] {
            assert!(service.index_document(id, "   ").await.is_err());
        }
        assert!(service.registry().documents.is_empty());

        service.index_document("4", "Indexed text.").await.unwrap();
        assert!(service.index_document("4", "").await.is_err());
        assert_eq!(service.registry().documents.len(), 1);
        assert_eq!(service.state("4").await.unwrap(), IndexState::Indexed);
    }

    #[test]
    fn location_names_follow_document_id() {
        assert_eq!(DocumentIndexService::location_for("17"), "document_17");
    }
}
