//! Document ingestion: chunking extracted text and indexing the passages

mod chunker;
mod knowledge_base;

pub use chunker::{reconstruct, ChunkSpans, TextChunker, TextSpan};
pub use knowledge_base::KnowledgeBase;
