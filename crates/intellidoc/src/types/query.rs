//! Request types for the ingestion and query boundaries

use serde::{Deserialize, Serialize};

/// A question asked within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Conversation the question belongs to
    pub session_id: String,
    /// The question to answer
    pub question: String,
    /// Number of passages to retrieve (defaults to the configured top_k)
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl QueryRequest {
    pub fn new(session_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            question: question.into(),
            top_k: None,
        }
    }
}

/// A document whose text was already extracted by an external collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Original filename
    pub filename: String,
    /// Raw extracted text; pages may be separated by form feeds
    pub text: String,
}

impl IngestRequest {
    pub fn new(filename: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            text: text.into(),
        }
    }
}
