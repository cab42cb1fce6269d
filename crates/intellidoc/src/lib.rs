//! intellidoc: conversational question answering over ingested documents
//!
//! Documents arrive as extracted text, are chunked into passages and indexed
//! by embedding. Questions are rewritten against the session's history,
//! answered from the retrieved passages, and every citation in the answer is
//! checked against the passages actually supplied.

pub mod config;
pub mod conversation;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod state;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::RagConfig;
pub use conversation::{Conversation, SessionStore};
pub use error::{Error, Result};
pub use ingestion::{KnowledgeBase, TextChunker};
pub use pipeline::{QuestionPipeline, QuestionStage};
pub use state::AppState;
pub use types::{
    Chunk, ChunkSource, Citation, ConversationTurn, Document, DocumentSummary, GroundingViolation,
    IngestRequest, QueryRequest, QueryResponse,
};
