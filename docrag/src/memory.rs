//! In-memory index store.
//!
//! This module provides [`InMemoryIndexStore`], a zero-dependency store
//! backed by a `HashMap` protected by a `tokio::sync::RwLock`. It is suitable
//! for development, testing, and processes that rebuild indexes on start.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{LoadFailureReason, RagError, Result};
use crate::index::VectorIndex;
use crate::store::IndexStore;

/// An in-memory [`IndexStore`].
///
/// Each location holds its own copy of the saved index. Saves and loads copy
/// under the lock, so a concurrent load sees the old or the new index whole.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::{InMemoryIndexStore, IndexStore};
///
/// let store = InMemoryIndexStore::new();
/// store.save("doc", &index).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryIndexStore {
    indexes: RwLock<HashMap<String, VectorIndex>>,
}

impl InMemoryIndexStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored indexes.
    pub async fn len(&self) -> usize {
        self.indexes.read().await.len()
    }

    /// Whether the store holds no indexes.
    pub async fn is_empty(&self) -> bool {
        self.indexes.read().await.is_empty()
    }
}

#[async_trait]
impl IndexStore for InMemoryIndexStore {
    async fn save(&self, location: &str, index: &VectorIndex) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        indexes.insert(location.to_string(), index.clone());
        Ok(())
    }

    async fn load(&self, location: &str) -> Result<VectorIndex> {
        let indexes = self.indexes.read().await;
        indexes
            .get(location)
            .cloned()
            .ok_or_else(|| RagError::load_failure(location, LoadFailureReason::NotFound))
    }

    async fn delete(&self, location: &str) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        indexes.remove(location);
        Ok(())
    }

    async fn exists(&self, location: &str) -> Result<bool> {
        Ok(self.indexes.read().await.contains_key(location))
    }
}
