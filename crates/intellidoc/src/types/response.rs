//! Response types for questions and ingestion

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::{Chunk, Document};

/// Citation from a source document. Refers to its passage by id only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Document ID
    pub document_id: Uuid,
    /// Passage ID
    pub passage_id: Uuid,
    /// Excerpt shown to the user
    pub excerpt: String,
    /// Source filename
    pub filename: String,
    /// Page number (if applicable)
    pub page_number: Option<u32>,
    /// Marker number used in the answer text
    pub marker: usize,
    /// Similarity score of the passage
    pub similarity: f32,
}

impl Citation {
    /// Create a citation from a passage bound to `marker`
    pub fn from_chunk(chunk: &Chunk, marker: usize, similarity: f32) -> Self {
        Self {
            document_id: chunk.document_id,
            passage_id: chunk.id,
            excerpt: truncate_excerpt(&chunk.content, EXCERPT_LEN),
            filename: chunk.source.filename.clone(),
            page_number: chunk.source.page_number,
            marker,
            similarity,
        }
    }

    /// Format citation for display in text
    pub fn format_inline(&self) -> String {
        match self.page_number {
            Some(page) => format!("[{}] {}, Page {}", self.marker, self.filename, page),
            None => format!("[{}] {}", self.marker, self.filename),
        }
    }
}

/// Maximum excerpt length in characters
pub const EXCERPT_LEN: usize = 240;

/// Truncate an excerpt to `max_chars` while preserving word boundaries
pub fn truncate_excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let end = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());

    match text[..end].rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => format!("{}...", text[..pos].trim_end()),
        _ => format!("{}...", &text[..end]),
    }
}

/// A marker the generator produced that maps to no supplied passage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingViolation {
    /// The offending marker number as written
    pub marker: String,
    /// Why it was rejected
    pub reason: String,
}

impl From<GroundingViolation> for crate::error::Error {
    fn from(v: GroundingViolation) -> Self {
        crate::error::Error::GroundingViolation {
            marker: v.marker,
            reason: v.reason,
        }
    }
}

/// A retrieved passage reported back alongside the answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePassage {
    pub document_id: Uuid,
    pub passage_id: Uuid,
    pub filename: String,
    pub page_number: Option<u32>,
    pub content: String,
    pub similarity: f32,
}

impl SourcePassage {
    pub fn from_chunk(chunk: &Chunk, similarity: f32) -> Self {
        Self {
            document_id: chunk.document_id,
            passage_id: chunk.id,
            filename: chunk.source.filename.clone(),
            page_number: chunk.source.page_number,
            content: chunk.content.clone(),
            similarity,
        }
    }
}

/// Response to a question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Session the turn was committed to
    pub session_id: String,
    /// Grounded answer text
    pub answer: String,
    /// Citations that survived grounding
    pub citations: Vec<Citation>,
    /// Query actually used for retrieval
    pub standalone_query: String,
    /// Every passage handed to the composer
    pub sources: Vec<SourcePassage>,
    /// Markers stripped from the answer
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub grounding_violations: Vec<GroundingViolation>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Summary of an ingested document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Document ID
    pub id: Uuid,
    /// Filename
    pub filename: String,
    /// Number of pages (if applicable)
    pub total_pages: Option<u32>,
    /// Number of passages created
    pub total_chunks: u32,
    /// Ingestion timestamp
    pub ingested_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename.clone(),
            total_pages: doc.total_pages,
            total_chunks: doc.total_chunks,
            ingested_at: doc.ingested_at,
        }
    }
}
