//! Deterministic provider fakes for unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::generation::prompt::REWRITE_INSTRUCTIONS;
use crate::providers::embedding::EmbeddingProvider;
use crate::providers::llm::{ChatMessage, LlmProvider};
use crate::providers::vector_store::{VectorSearchResult, VectorStoreProvider};
use crate::types::{Chunk, ChunkSource};

const DIMENSIONS: usize = 256;

/// Hashed bag-of-words embedder: texts sharing words have positive similarity
pub struct KeywordEmbedder {
    fail: bool,
    /// Length reported by `dimensions()`
    declared: usize,
    embedded: Mutex<Vec<String>>,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            fail: false,
            declared: DIMENSIONS,
            embedded: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Declares `dims` while still returning vectors of the usual length
    pub fn declaring(dims: usize) -> Self {
        Self {
            declared: dims,
            ..Self::new()
        }
    }

    /// Every text embedded so far, in call order
    pub fn embedded(&self) -> Vec<String> {
        self.embedded.lock().clone()
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() % DIMENSIONS as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail {
            return Err(Error::embedding("embedding service unreachable"));
        }
        self.embedded.lock().push(text.to_string());
        Ok(Self::vector(text))
    }

    fn dimensions(&self) -> usize {
        self.declared
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.fail)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

type Script = Box<dyn Fn(&[ChatMessage]) -> String + Send + Sync>;

/// Generator whose replies come from a closure
pub struct ScriptedLlm {
    script: Option<Script>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    pub fn answering<F>(script: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> String + Send + Sync + 'static,
    {
        Self {
            script: Some(Box::new(script)),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            script: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Message lists of every call, in call order
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().clone()
    }
}

/// Whether a call is a follow-up rewrite rather than an answer request
pub fn is_rewrite(messages: &[ChatMessage]) -> bool {
    messages
        .first()
        .is_some_and(|m| m.content == REWRITE_INSTRUCTIONS)
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().push(messages.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.script {
            Some(script) => Ok(script(messages)),
            None => Err(Error::llm("generator unreachable")),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.script.is_some())
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

/// Index that is never reachable
pub struct FailingVectorStore;

#[async_trait]
impl VectorStoreProvider for FailingVectorStore {
    async fn upsert(&self, _chunk: &Chunk, _vector: Vec<f32>) -> Result<()> {
        Err(Error::vector_store("index unreachable"))
    }

    async fn query(&self, _vector: &[f32], _k: usize) -> Result<Vec<VectorSearchResult>> {
        Err(Error::vector_store("index unreachable"))
    }

    async fn delete_by_document(&self, _document_id: &Uuid) -> Result<usize> {
        Err(Error::vector_store("index unreachable"))
    }

    async fn count_by_document(&self, _document_id: &Uuid) -> Result<usize> {
        Err(Error::vector_store("index unreachable"))
    }

    async fn len(&self) -> Result<usize> {
        Err(Error::vector_store("index unreachable"))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// A standalone retrieved passage
pub fn passage(content: &str, similarity: f32) -> VectorSearchResult {
    VectorSearchResult {
        chunk: Chunk::new(
            Uuid::new_v4(),
            content.to_string(),
            ChunkSource {
                filename: "notes.txt".into(),
                page_number: None,
            },
            0,
            content.chars().count(),
            0,
        ),
        similarity,
    }
}
