//! Document registry and passage indexing

use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::{ChunkingConfig, RagConfig};
use crate::error::{Error, Result};
use crate::providers::embedding::{check_dimensions, EmbeddingProvider};
use crate::providers::vector_store::VectorStoreProvider;
use crate::retrieval::vector_store::write_atomic;
use crate::types::{Chunk, Document, DocumentSummary, IngestRequest};

use super::chunker::TextChunker;

/// The set of ingested documents and their indexed passages
pub struct KnowledgeBase {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorStoreProvider>,
    chunking: ChunkingConfig,
    concurrency: usize,
    timeout: Duration,
    documents: DashMap<Uuid, Document>,
    documents_path: Option<PathBuf>,
    /// Serializes registry mutations
    write_lock: tokio::sync::Mutex<()>,
}

impl KnowledgeBase {
    /// Create a knowledge base whose registry lives only in memory
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorStoreProvider>,
        config: &RagConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            chunking: config.chunking,
            concurrency: config.embeddings.concurrency.max(1),
            timeout: config.llm.timeout(),
            documents: DashMap::new(),
            documents_path: None,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Persist the registry to `path`, loading any documents already saved there
    pub fn with_registry(mut self, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let docs: Vec<Document> = serde_json::from_str(&raw)?;
            tracing::info!("Loaded {} documents from {}", docs.len(), path.display());
            for doc in docs {
                self.documents.insert(doc.id, doc);
            }
        }

        self.documents_path = Some(path);
        Ok(self)
    }

    /// Chunk, embed and index one document
    ///
    /// Re-ingesting a document with the same filename and text returns the
    /// existing registration, unless the index has lost its passages, in which
    /// case the document is indexed again under a new id. On any failure the
    /// index and registry are unchanged.
    pub async fn ingest(
        &self,
        request: IngestRequest,
        chunking: Option<ChunkingConfig>,
    ) -> Result<DocumentSummary> {
        let chunker = TextChunker::new(chunking.unwrap_or(self.chunking))?;

        let mut doc = Document::new(request.filename, request.text);
        if doc.is_blank() {
            return Err(Error::ExtractionEmpty(doc.filename));
        }

        let _guard = self.write_lock.lock().await;

        let stale = match self.find_duplicate(&doc) {
            Some(existing) if self.is_indexed(&existing).await? => {
                tracing::info!(
                    "[{}] Already ingested as {}, skipping",
                    existing.filename,
                    existing.id
                );
                return Ok(existing);
            }
            Some(existing) => {
                tracing::warn!(
                    "[{}] Registered as {} but has no indexed passages, re-ingesting",
                    existing.filename,
                    existing.id
                );
                Some(existing.id)
            }
            None => None,
        };

        let start = Instant::now();
        let chunks = chunker.chunk_document(&doc);
        tracing::info!(
            "[{}] Created {} chunks, generating embeddings...",
            doc.filename,
            chunks.len()
        );

        let entries = self.embed_chunks(&doc.filename, chunks).await?;
        doc.total_chunks = entries.len() as u32;

        if let Err(e) = self.index.upsert_batch(entries).await {
            self.remove_passages(&doc).await;
            return Err(Error::retrieval_unavailable(format!(
                "{} upsert failed: {}",
                self.index.name(),
                e
            )));
        }

        let replaced = stale.and_then(|id| self.documents.remove(&id));
        self.documents.insert(doc.id, doc.clone());
        if let Err(e) = self.save_documents() {
            self.documents.remove(&doc.id);
            if let Some((id, old)) = replaced {
                self.documents.insert(id, old);
            }
            self.remove_passages(&doc).await;
            return Err(e);
        }

        tracing::info!(
            "[{}] COMPLETE: {} pages, {} chunks indexed in {}ms",
            doc.filename,
            doc.total_pages.unwrap_or(1),
            doc.total_chunks,
            start.elapsed().as_millis()
        );

        Ok(DocumentSummary::from(&doc))
    }

    /// Remove a document and all of its passages
    pub async fn delete(&self, document_id: &Uuid) -> Result<DocumentSummary> {
        let _guard = self.write_lock.lock().await;

        let summary = match self.documents.get(document_id) {
            Some(doc) => DocumentSummary::from(doc.value()),
            None => return Err(Error::DocumentNotFound(*document_id)),
        };

        let removed = self.index.delete_by_document(document_id).await?;
        self.documents.remove(document_id);
        self.save_documents()?;

        tracing::info!(
            "[{}] Deleted document {} ({} passages)",
            summary.filename,
            document_id,
            removed
        );
        Ok(summary)
    }

    /// Summaries of every document, oldest first
    pub fn list(&self) -> Vec<DocumentSummary> {
        let mut docs: Vec<DocumentSummary> = self
            .documents
            .iter()
            .map(|entry| DocumentSummary::from(entry.value()))
            .collect();
        docs.sort_by(|a, b| {
            a.ingested_at
                .cmp(&b.ingested_at)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        docs
    }

    pub fn get(&self, document_id: &Uuid) -> Option<Document> {
        self.documents
            .get(document_id)
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Best-effort cleanup after a failed ingest
    async fn remove_passages(&self, doc: &Document) {
        if let Err(e) = self.index.delete_by_document(&doc.id).await {
            tracing::error!("[{}] Failed to roll back passages: {}", doc.filename, e);
        }
    }

    /// Whether the index still holds the passages of a registered document
    async fn is_indexed(&self, doc: &DocumentSummary) -> Result<bool> {
        if doc.total_chunks == 0 {
            return Ok(true);
        }
        let count = self.index.count_by_document(&doc.id).await.map_err(|e| {
            Error::retrieval_unavailable(format!("{} count failed: {}", self.index.name(), e))
        })?;
        Ok(count > 0)
    }

    fn find_duplicate(&self, doc: &Document) -> Option<DocumentSummary> {
        self.documents
            .iter()
            .find(|entry| entry.filename == doc.filename && entry.content_hash == doc.content_hash)
            .map(|entry| DocumentSummary::from(entry.value()))
    }

    /// Embed passages in batches of `concurrency`; any failure aborts the whole document
    async fn embed_chunks(
        &self,
        filename: &str,
        chunks: Vec<Chunk>,
    ) -> Result<Vec<(Chunk, Vec<f32>)>> {
        let total_batches = chunks.len().div_ceil(self.concurrency);
        let mut entries = Vec::with_capacity(chunks.len());

        for (batch_num, batch) in chunks.chunks(self.concurrency).enumerate() {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.content.clone()).collect();

            let vectors = tokio::time::timeout(self.timeout, self.embedder.embed_batch(&texts))
                .await
                .map_err(|_| {
                    Error::retrieval_unavailable(format!(
                        "[{}] embedding batch {}/{} timed out after {}s",
                        filename,
                        batch_num + 1,
                        total_batches,
                        self.timeout.as_secs_f32()
                    ))
                })?
                .map_err(|e| {
                    Error::retrieval_unavailable(format!(
                        "[{}] embedding batch {}/{} failed: {}",
                        filename,
                        batch_num + 1,
                        total_batches,
                        e
                    ))
                })?;

            if vectors.len() != batch.len() {
                return Err(Error::retrieval_unavailable(format!(
                    "[{}] {} returned {} vectors for {} passages",
                    filename,
                    self.embedder.name(),
                    vectors.len(),
                    batch.len()
                )));
            }
            for vector in &vectors {
                check_dimensions(self.embedder.as_ref(), vector).map_err(|e| {
                    Error::retrieval_unavailable(format!("[{}] {}", filename, e))
                })?;
            }
            entries.extend(batch.iter().cloned().zip(vectors));

            tracing::debug!(
                "[{}] Embedded batch {}/{}",
                filename,
                batch_num + 1,
                total_batches
            );
        }

        Ok(entries)
    }

    fn save_documents(&self) -> Result<()> {
        let Some(path) = &self.documents_path else {
            return Ok(());
        };

        let docs: Vec<Document> = self
            .documents
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        write_atomic(path, &serde_json::to_vec_pretty(&docs)?)
    }
}
