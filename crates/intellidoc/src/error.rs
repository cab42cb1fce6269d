//! Error types for the question-answering core

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for intellidoc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by ingestion, retrieval, and answer composition
#[derive(Debug, Error)]
pub enum Error {
    /// Bad chunking parameters, rejected before any work is done
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Document produced no text; ingestion is a no-op
    #[error("Document '{0}' contains no extractable text")]
    ExtractionEmpty(String),

    /// Embedding client or vector index unreachable
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Generator cited a passage that was not supplied
    #[error("Grounding violation: marker [{marker}] {reason}")]
    GroundingViolation { marker: String, reason: String },

    /// Generation call failed or timed out; no turn was committed
    #[error("Answer composition failed: {0}")]
    CompositionFailed(String),

    /// Another question is already in flight for this session
    #[error("Session '{0}' is busy with another question")]
    SessionBusy(String),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Vector index error
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// LLM error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Upstream service answered with a retryable status
    #[error("Upstream service unavailable: HTTP {0}")]
    UpstreamUnavailable(u16),

    /// External call exceeded its deadline
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Configuration file or environment error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create an invalid configuration error
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Create a retrieval unavailable error
    pub fn retrieval_unavailable(message: impl Into<String>) -> Self {
        Self::RetrievalUnavailable(message.into())
    }

    /// Create a composition failed error
    pub fn composition_failed(message: impl Into<String>) -> Self {
        Self::CompositionFailed(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector store error
    pub fn vector_store(message: impl Into<String>) -> Self {
        Self::VectorStore(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Whether a single retry is worth attempting.
    ///
    /// Only connection failures and gateway-style statuses qualify. Timeouts
    /// never do: the caller fails fast instead.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(err) => !err.is_timeout() && (err.is_connect() || err.is_request()),
            Error::UpstreamUnavailable(status) => matches!(status, 502..=504),
            _ => false,
        }
    }

    /// Stable machine-readable code for the error
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidConfiguration(_) => "invalid_configuration",
            Error::ExtractionEmpty(_) => "extraction_empty",
            Error::RetrievalUnavailable(_) => "retrieval_unavailable",
            Error::GroundingViolation { .. } => "grounding_violation",
            Error::CompositionFailed(_) => "composition_failed",
            Error::SessionBusy(_) => "session_busy",
            Error::DocumentNotFound(_) => "not_found",
            Error::Embedding(_) => "embedding_error",
            Error::VectorStore(_) => "vector_store_error",
            Error::Llm(_) => "llm_error",
            Error::UpstreamUnavailable(_) => "upstream_unavailable",
            Error::Timeout(_) => "timeout",
            Error::Config(_) => "config_error",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Toml(_) => "toml_error",
            Error::Http(_) => "http_error",
        }
    }
}
