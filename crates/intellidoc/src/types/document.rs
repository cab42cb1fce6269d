//! Document and passage types with source tracking for citations

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Form feed, the page separator emitted by PDF-to-text extractors
pub const PAGE_SEPARATOR: char = '\u{000C}';

/// A document that has been ingested. Never mutated after registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Original filename as uploaded by user
    pub filename: String,
    /// Raw extracted text
    pub text: String,
    /// SHA-256 of the text, hex encoded
    pub content_hash: String,
    /// Total number of pages (if the text carried page separators)
    pub total_pages: Option<u32>,
    /// Total number of passages created
    pub total_chunks: u32,
    /// Ingestion timestamp
    pub ingested_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    /// Create a new document from extracted text
    pub fn new(filename: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let content_hash = content_hash(&text);
        let separators = text.chars().filter(|c| *c == PAGE_SEPARATOR).count() as u32;

        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            total_pages: (separators > 0).then_some(separators + 1),
            text,
            content_hash,
            total_chunks: 0,
            ingested_at: chrono::Utc::now(),
        }
    }

    /// Whether the document carries no usable text
    pub fn is_blank(&self) -> bool {
        self.text
            .chars()
            .all(|c| c.is_whitespace() || c == PAGE_SEPARATOR)
    }

    /// 1-based page number of a character offset, if the text is paginated
    pub fn page_at(&self, char_offset: usize) -> Option<u32> {
        self.total_pages?;
        let separators = self
            .text
            .chars()
            .take(char_offset)
            .filter(|c| *c == PAGE_SEPARATOR)
            .count() as u32;
        Some(separators + 1)
    }
}

/// Hex encoded SHA-256 of a text
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Source information for a passage (used for citations)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSource {
    /// Original filename as uploaded (used in citations)
    pub filename: String,
    /// Page number (1-indexed) when the document was paginated
    pub page_number: Option<u32>,
}

impl ChunkSource {
    /// Format source for display
    pub fn format_citation(&self) -> String {
        match self.page_number {
            Some(page) => format!("{}, Page {}", self.filename, page),
            None => self.filename.clone(),
        }
    }
}

/// A passage of text from exactly one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique passage ID
    pub id: Uuid,
    /// Parent document ID
    pub document_id: Uuid,
    /// Text content, exactly `text[char_start..char_end]` of the source
    pub content: String,
    /// Embedding vector, assigned at index time
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
    /// Source information for citations
    pub source: ChunkSource,
    /// Character span in the original document, end exclusive
    pub char_start: usize,
    pub char_end: usize,
    /// Chunk index within document
    pub chunk_index: u32,
}

impl Chunk {
    /// Create a new passage
    pub fn new(
        document_id: Uuid,
        content: String,
        source: ChunkSource,
        char_start: usize,
        char_end: usize,
        chunk_index: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            content,
            embedding: Vec::new(),
            source,
            char_start,
            char_end,
            chunk_index,
        }
    }
}
