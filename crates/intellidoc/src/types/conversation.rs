//! Conversation turn type

use serde::{Deserialize, Serialize};

use super::response::Citation;

/// One committed question/answer exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Question as the user asked it
    pub question: String,
    /// Standalone query used for retrieval
    pub standalone_query: String,
    /// Final grounded answer
    pub answer: String,
    /// Citations attached to the answer
    pub citations: Vec<Citation>,
    /// Commit time
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ConversationTurn {
    pub fn new(
        question: impl Into<String>,
        standalone_query: impl Into<String>,
        answer: impl Into<String>,
        citations: Vec<Citation>,
    ) -> Self {
        Self {
            question: question.into(),
            standalone_query: standalone_query.into(),
            answer: answer.into(),
            citations,
            timestamp: chrono::Utc::now(),
        }
    }
}
