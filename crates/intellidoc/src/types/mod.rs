//! Core data types

pub mod conversation;
pub mod document;
pub mod query;
pub mod response;

pub use conversation::ConversationTurn;
pub use document::{Chunk, ChunkSource, Document};
pub use query::{IngestRequest, QueryRequest};
pub use response::{Citation, DocumentSummary, GroundingViolation, QueryResponse, SourcePassage};
