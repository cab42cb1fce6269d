//! Embedding client seam

use async_trait::async_trait;
use futures::future::try_join_all;

use crate::error::{Error, Result};

/// Maps text to a fixed-length vector; treated as an opaque remote capability
///
/// Implementations:
/// - `OpenAiClient`: `/v1/embeddings`, one request per batch
/// - `OllamaClient`: `/api/embeddings`, one request per text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, returning vectors in input order
    ///
    /// The default issues every `embed` call at once and fails on the first
    /// error. Clients with a native batch endpoint override it.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        try_join_all(texts.iter().map(|text| self.embed(text))).await
    }

    /// Length of every returned vector
    fn dimensions(&self) -> usize;

    async fn health_check(&self) -> Result<bool>;

    /// Name used in logs and error messages
    fn name(&self) -> &str;
}

/// Reject a vector whose length differs from what `provider` declares
pub(crate) fn check_dimensions(provider: &dyn EmbeddingProvider, vector: &[f32]) -> Result<()> {
    if vector.len() != provider.dimensions() {
        return Err(Error::embedding(format!(
            "{} returned a {}D vector, expected {}D",
            provider.name(),
            vector.len(),
            provider.dimensions()
        )));
    }
    Ok(())
}
