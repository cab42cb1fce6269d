//! Configuration for the question-answering core

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Which remote API serves embeddings and generation
    #[serde(default)]
    pub backend: BackendProvider,
    /// Embedding configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// LLM configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Backend provider selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendProvider {
    /// OpenAI-compatible API (default)
    #[default]
    OpenAi,
    /// Local Ollama server
    Ollama,
}

impl std::str::FromStr for BackendProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(Error::Config(format!("Unknown backend: {}", other))),
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding model name
    pub model: String,
    /// Length of every embedding the model returns (1536 for text-embedding-3-small,
    /// 768 for nomic-embed-text). Vectors of any other length are rejected.
    pub dimensions: usize,
    /// Maximum passages embedded concurrently during ingestion
    pub concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            concurrency: 4,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

impl ChunkingConfig {
    /// Reject parameters that cannot produce a finite chunk sequence
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::invalid_configuration("chunk_size must be greater than 0"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::invalid_configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API base URL
    pub base_url: String,
    /// API key (OpenAI backend only)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
    /// Retries for transient transport failures (0 or 1)
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            generate_model: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            timeout_secs: 60,
            max_retries: 1,
        }
    }
}

impl LlmConfig {
    /// Per-call timeout
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of passages handed to the composer
    pub top_k: usize,
    /// Prior turns considered when rewriting a follow-up question
    pub history_window: usize,
    /// Passages below this cosine similarity are dropped
    pub min_similarity: f32,
    /// Rewrite follow-up questions into standalone queries
    pub rewrite_enabled: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            history_window: 4,
            min_similarity: 0.0,
            rewrite_enabled: true,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the vector snapshot and document registry
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("intellidoc");
        Self { data_dir }
    }
}

impl StorageConfig {
    /// Path of the vector index snapshot
    pub fn vectors_path(&self) -> PathBuf {
        self.data_dir.join("vectors.json")
    }

    /// Path of the document registry
    pub fn documents_path(&self) -> PathBuf {
        self.data_dir.join("documents.json")
    }
}

impl RagConfig {
    /// Load configuration from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                toml::from_str(&raw)?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("INTELLIDOC_BACKEND") {
            self.backend = backend.parse()?;
            if self.backend == BackendProvider::Ollama
                && lookup("INTELLIDOC_LLM_BASE_URL").is_none()
            {
                self.llm.base_url = "http://localhost:11434".to_string();
            }
        }
        if let Some(url) = lookup("INTELLIDOC_LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(dir) = lookup("INTELLIDOC_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        Ok(())
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.llm.max_retries > 1 {
            return Err(Error::Config(format!(
                "llm.max_retries is {}, at most one retry is allowed",
                self.llm.max_retries
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be at least 1".to_string()));
        }
        if self.embeddings.concurrency == 0 {
            return Err(Error::Config("embeddings.concurrency must be at least 1".to_string()));
        }
        Ok(())
    }
}
