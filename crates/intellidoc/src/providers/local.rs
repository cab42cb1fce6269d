//! Local vector store provider wrapping the in-process index

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::retrieval::VectorStore;
use crate::types::Chunk;

use super::vector_store::{VectorSearchResult, VectorStoreProvider};

/// Local vector store backed by [`VectorStore`]
pub struct LocalVectorStore {
    store: Arc<VectorStore>,
}

impl LocalVectorStore {
    /// Create from existing VectorStore
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }

    /// Open the snapshot under the configured data directory
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let store = Arc::new(VectorStore::open(config.vectors_path())?);
        Ok(Self { store })
    }
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::vector_store(format!("Task join error: {}", e))
}

#[async_trait]
impl VectorStoreProvider for LocalVectorStore {
    async fn upsert(&self, chunk: &Chunk, vector: Vec<f32>) -> Result<()> {
        // VectorStore is sync and may touch disk, wrap in blocking task
        let store = self.store.clone();
        let chunk = chunk.clone();
        tokio::task::spawn_blocking(move || store.upsert(&chunk, vector))
            .await
            .map_err(join_error)?
    }

    async fn upsert_batch(&self, entries: Vec<(Chunk, Vec<f32>)>) -> Result<()> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.upsert_batch(entries))
            .await
            .map_err(join_error)?
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<VectorSearchResult>> {
        let store = self.store.clone();
        let query = vector.to_vec();

        tokio::task::spawn_blocking(move || {
            let results = store.search(&query, k)?;
            Ok(results
                .into_iter()
                .map(|r| VectorSearchResult {
                    chunk: r.chunk,
                    similarity: r.similarity,
                })
                .collect())
        })
        .await
        .map_err(join_error)?
    }

    async fn delete_by_document(&self, document_id: &Uuid) -> Result<usize> {
        let store = self.store.clone();
        let doc_id = *document_id;
        tokio::task::spawn_blocking(move || store.delete_by_document(&doc_id))
            .await
            .map_err(join_error)?
    }

    async fn count_by_document(&self, document_id: &Uuid) -> Result<usize> {
        Ok(self.store.document_len(document_id))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.store.len())
    }

    async fn health_check(&self) -> Result<bool> {
        // Local store is always healthy if it exists
        Ok(true)
    }

    fn name(&self) -> &str {
        "local-memory"
    }
}
