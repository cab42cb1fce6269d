//! Vector index seam

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::Chunk;

/// A passage returned by a similarity query
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    pub chunk: Chunk,
    /// Cosine similarity in `-1.0..=1.0`
    pub similarity: f32,
}

/// Similarity index over passage embeddings, keyed by passage id
///
/// Durability, when offered, lives beneath this interface. The in-process
/// implementation is `LocalVectorStore`.
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Store or replace the entry for `chunk.id`. Idempotent.
    async fn upsert(&self, chunk: &Chunk, vector: Vec<f32>) -> Result<()>;

    /// Store many entries. Implementations that can should apply them under one write.
    async fn upsert_batch(&self, entries: Vec<(Chunk, Vec<f32>)>) -> Result<()> {
        for (chunk, vector) in entries {
            self.upsert(&chunk, vector).await?;
        }
        Ok(())
    }

    /// Up to `k` entries, most similar first; ties go to the earlier insertion
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<VectorSearchResult>>;

    /// Remove every passage of a document, returning how many were removed
    async fn delete_by_document(&self, document_id: &Uuid) -> Result<usize>;

    /// Number of passages held for a document
    async fn count_by_document(&self, document_id: &Uuid) -> Result<usize>;

    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    async fn health_check(&self) -> Result<bool>;

    fn name(&self) -> &str;
}
