//! History-aware passage retrieval

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::providers::embedding::{check_dimensions, EmbeddingProvider};
use crate::providers::vector_store::{VectorSearchResult, VectorStoreProvider};
use crate::types::ConversationTurn;

use super::rewrite::QueryRewriter;

/// Passages retrieved for one question
#[derive(Debug, Clone)]
pub struct Retrieval {
    /// Query actually embedded
    pub standalone_query: String,
    /// Most similar first
    pub passages: Vec<VectorSearchResult>,
}

/// Rewrites, embeds and searches
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorStoreProvider>,
    rewriter: QueryRewriter,
    history_window: usize,
    min_similarity: f32,
    timeout: Duration,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorStoreProvider>,
        rewriter: QueryRewriter,
        timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            index,
            rewriter,
            history_window: 4,
            min_similarity: 0.0,
            timeout,
        }
    }

    pub fn with_history_window(mut self, turns: usize) -> Self {
        self.history_window = turns;
        self
    }

    pub fn with_min_similarity(mut self, threshold: f32) -> Self {
        self.min_similarity = threshold;
        self
    }

    /// Rewrite `question` against the recent history, then return up to `k` passages
    pub async fn retrieve(
        &self,
        question: &str,
        history: &[ConversationTurn],
        k: usize,
    ) -> Result<Retrieval> {
        let standalone_query = self.rewrite(question, self.window(history)).await;
        let passages = self.search(&standalone_query, k).await?;

        Ok(Retrieval {
            standalone_query,
            passages,
        })
    }

    /// The turns considered when rewriting, oldest first
    pub fn window<'a>(&self, history: &'a [ConversationTurn]) -> &'a [ConversationTurn] {
        &history[history.len().saturating_sub(self.history_window)..]
    }

    /// Standalone form of `question`; falls back to the question itself
    pub async fn rewrite(&self, question: &str, history: &[ConversationTurn]) -> String {
        self.rewriter.rewrite(question, history).await
    }

    /// Embed `query` and search the index
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<VectorSearchResult>> {
        let embedding = match tokio::time::timeout(self.timeout, self.embedder.embed(query)).await {
            Ok(Ok(embedding)) => embedding,
            Ok(Err(e)) => {
                return Err(Error::retrieval_unavailable(format!(
                    "{} embedding failed: {}",
                    self.embedder.name(),
                    e
                )))
            }
            Err(_) => {
                return Err(Error::retrieval_unavailable(format!(
                    "{} embedding timed out after {}s",
                    self.embedder.name(),
                    self.timeout.as_secs_f32()
                )))
            }
        };

        check_dimensions(self.embedder.as_ref(), &embedding)
            .map_err(|e| Error::retrieval_unavailable(e.to_string()))?;

        let mut passages = self.index.query(&embedding, k).await.map_err(|e| {
            Error::retrieval_unavailable(format!("{} query failed: {}", self.index.name(), e))
        })?;

        let before = passages.len();
        passages.retain(|p| p.similarity >= self.min_similarity);
        if passages.len() < before {
            tracing::debug!(
                "Dropped {} passage(s) below similarity {}",
                before - passages.len(),
                self.min_similarity
            );
        }

        Ok(passages)
    }
}
