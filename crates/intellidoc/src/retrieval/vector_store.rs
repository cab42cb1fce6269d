//! In-memory vector index with optional JSON snapshot persistence
//!
//! Brute-force cosine similarity over every stored vector. Writers are
//! serialized and stage each change against the current state: the snapshot
//! is serialized under a read lock and written with no lock held, and the
//! change is applied to memory only once the snapshot is durable. A failed
//! write leaves the index unchanged, and a query that begins after a delete
//! returns never observes the deleted passages.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::Chunk;

/// Search result with passage and similarity
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The retrieved passage
    pub chunk: Chunk,
    /// Cosine similarity, higher is better
    pub similarity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    /// Insertion sequence, kept when an entry is replaced
    seq: u64,
    chunk: Chunk,
    vector: Vec<f32>,
}

/// On-disk layout, borrowed when writing
#[derive(Serialize)]
struct SnapshotRef<'a> {
    next_seq: u64,
    entries: Vec<&'a Entry>,
}

#[derive(Deserialize)]
struct Snapshot {
    next_seq: u64,
    entries: Vec<Entry>,
}

#[derive(Debug, Default)]
struct IndexState {
    entries: HashMap<Uuid, Entry>,
    /// Mapping from document IDs to passage IDs for deletion
    document_chunks: HashMap<Uuid, Vec<Uuid>>,
    next_seq: u64,
    /// Length shared by every stored vector; unset while the index is empty
    dimensions: Option<usize>,
}

/// Entries validated against the current state but not yet applied
struct StagedUpsert {
    entries: Vec<Entry>,
    next_seq: u64,
}

impl IndexState {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut state = Self {
            next_seq: snapshot.next_seq,
            ..Self::default()
        };
        for entry in snapshot.entries {
            state.dimensions.get_or_insert(entry.vector.len());
            state
                .document_chunks
                .entry(entry.chunk.document_id)
                .or_default()
                .push(entry.chunk.id);
            state.entries.insert(entry.chunk.id, entry);
        }
        state
    }

    /// Validate a batch and assign insertion sequences without touching the state
    fn stage(&self, batch: Vec<(Chunk, Vec<f32>)>) -> Result<StagedUpsert> {
        let dims = self.dimensions.unwrap_or(batch[0].1.len());
        let mut next_seq = self.next_seq;
        let mut entries: Vec<Entry> = Vec::with_capacity(batch.len());
        let mut positions: HashMap<Uuid, usize> = HashMap::new();

        for (mut chunk, vector) in batch {
            check_vector(&vector, dims)?;
            chunk.embedding = Vec::new();

            if let Some(&pos) = positions.get(&chunk.id) {
                let seq = entries[pos].seq;
                entries[pos] = Entry { seq, chunk, vector };
                continue;
            }

            let seq = match self.entries.get(&chunk.id) {
                Some(existing) => existing.seq,
                None => {
                    next_seq += 1;
                    next_seq - 1
                }
            };
            positions.insert(chunk.id, entries.len());
            entries.push(Entry { seq, chunk, vector });
        }

        Ok(StagedUpsert { entries, next_seq })
    }

    fn apply_upsert(&mut self, staged: StagedUpsert) {
        for entry in staged.entries {
            self.dimensions.get_or_insert(entry.vector.len());

            let id = entry.chunk.id;
            let document_id = entry.chunk.document_id;
            let previous = self.entries.get(&id).map(|e| e.chunk.document_id);

            if previous != Some(document_id) {
                if let Some(old) = previous {
                    if let Some(ids) = self.document_chunks.get_mut(&old) {
                        ids.retain(|c| *c != id);
                    }
                }
                self.document_chunks
                    .entry(document_id)
                    .or_default()
                    .push(id);
            }
            self.entries.insert(id, entry);
        }
        self.next_seq = staged.next_seq;
    }

    fn apply_remove(&mut self, document_id: &Uuid) -> usize {
        let chunk_ids = self.document_chunks.remove(document_id).unwrap_or_default();
        let removed = chunk_ids
            .iter()
            .filter(|id| self.entries.remove(id).is_some())
            .count();
        if self.entries.is_empty() {
            self.dimensions = None;
        }
        removed
    }

    /// Serialize the state as it will be once `added` is applied and `removed` dropped
    fn snapshot_with(
        &self,
        added: &[Entry],
        removed: &HashSet<Uuid>,
        next_seq: u64,
    ) -> Result<Vec<u8>> {
        let replaced: HashSet<Uuid> = added.iter().map(|e| e.chunk.id).collect();
        let entries = self
            .entries
            .values()
            .filter(|e| !replaced.contains(&e.chunk.id) && !removed.contains(&e.chunk.id))
            .chain(added.iter())
            .collect();
        Ok(serde_json::to_vec(&SnapshotRef { next_seq, entries })?)
    }
}

fn check_vector(vector: &[f32], dims: usize) -> Result<()> {
    if vector.is_empty() {
        return Err(Error::vector_store("Passage has no embedding"));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(Error::vector_store("Embedding contains NaN or infinite values"));
    }
    if vector.len() != dims {
        return Err(Error::vector_store(format!(
            "Dimension mismatch: index holds {}D vectors, got {}D",
            dims,
            vector.len()
        )));
    }
    Ok(())
}

/// Vector index keyed by passage id
pub struct VectorStore {
    state: RwLock<IndexState>,
    /// Held for the whole of a mutation so staged changes never interleave
    writer: Mutex<()>,
    /// Snapshot file, when persistence is enabled
    storage_path: Option<PathBuf>,
}

impl VectorStore {
    /// Create an index that lives only in memory
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(IndexState::default()),
            writer: Mutex::new(()),
            storage_path: None,
        }
    }

    /// Open an index backed by a snapshot file, loading it if present
    pub fn open(storage_path: impl Into<PathBuf>) -> Result<Self> {
        let storage_path = storage_path.into();

        if let Some(parent) = storage_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let state = if storage_path.exists() {
            let raw = std::fs::read_to_string(&storage_path)?;
            let state = IndexState::from_snapshot(serde_json::from_str(&raw)?);
            tracing::info!(
                "Loaded {} vectors from {}",
                state.entries.len(),
                storage_path.display()
            );
            state
        } else {
            IndexState::default()
        };

        Ok(Self {
            state: RwLock::new(state),
            writer: Mutex::new(()),
            storage_path: Some(storage_path),
        })
    }

    /// Store or replace a passage. Upserting the same passage twice leaves one entry.
    pub fn upsert(&self, chunk: &Chunk, vector: Vec<f32>) -> Result<()> {
        self.upsert_batch(vec![(chunk.clone(), vector)])
    }

    /// Store a batch as one change; nothing is stored if any vector is invalid
    /// or the snapshot cannot be written
    pub fn upsert_batch(&self, entries: Vec<(Chunk, Vec<f32>)>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let _writer = self.writer.lock();
        let staged = self.state.read().stage(entries)?;

        if let Some(path) = &self.storage_path {
            let bytes = self
                .state
                .read()
                .snapshot_with(&staged.entries, &HashSet::new(), staged.next_seq)?;
            write_atomic(path, &bytes)?;
        }

        self.state.write().apply_upsert(staged);
        Ok(())
    }

    /// Return the `k` most similar passages, earlier insertions winning ties
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let state = self.state.read();

        if k == 0 || state.entries.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(dims) = state.dimensions {
            if query.len() != dims {
                return Err(Error::vector_store(format!(
                    "Query has {}D vector, index holds {}D",
                    query.len(),
                    dims
                )));
            }
        }

        let mut scored: Vec<(&Entry, f32)> = state
            .entries
            .values()
            .map(|entry| (entry, cosine_similarity(query, &entry.vector)))
            .collect();

        scored.sort_by(|(a, sa), (b, sb)| sb.total_cmp(sa).then(a.seq.cmp(&b.seq)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(entry, similarity)| SearchResult {
                chunk: entry.chunk.clone(),
                similarity,
            })
            .collect())
    }

    /// Delete all passages for a document
    pub fn delete_by_document(&self, document_id: &Uuid) -> Result<usize> {
        let _writer = self.writer.lock();

        if let Some(path) = &self.storage_path {
            let bytes = {
                let state = self.state.read();
                let removed: HashSet<Uuid> = match state.document_chunks.get(document_id) {
                    Some(ids) if !ids.is_empty() => ids.iter().copied().collect(),
                    _ => return Ok(0),
                };
                state.snapshot_with(&[], &removed, state.next_seq)?
            };
            write_atomic(path, &bytes)?;
        }

        Ok(self.state.write().apply_remove(document_id))
    }

    /// Get passage count
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of passages held for a document
    pub fn document_len(&self, document_id: &Uuid) -> usize {
        self.state
            .read()
            .document_chunks
            .get(document_id)
            .map_or(0, Vec::len)
    }
}

/// Write through a temporary file and rename, so readers never see a partial snapshot
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Cosine similarity, 0.0 when either vector has no magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkSource;
    use std::sync::Arc;

    fn chunk(document_id: Uuid, index: u32) -> Chunk {
        Chunk::new(
            document_id,
            format!("passage {}", index),
            ChunkSource {
                filename: "doc.pdf".into(),
                page_number: None,
            },
            0,
            10,
            index,
        )
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = VectorStore::in_memory();
        let c = chunk(Uuid::new_v4(), 0);

        store.upsert(&c, vec![1.0, 0.0]).unwrap();
        store.upsert(&c, vec![0.0, 1.0]).unwrap();

        assert_eq!(store.len(), 1);
        let results = store.search(&[0.0, 1.0], 5).unwrap();
        assert_eq!(results[0].chunk.id, c.id);
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ties_break_by_insertion_order() {
        let store = VectorStore::in_memory();
        let doc = Uuid::new_v4();
        let first = chunk(doc, 0);
        let second = chunk(doc, 1);
        let third = chunk(doc, 2);

        store.upsert(&first, vec![1.0, 0.0]).unwrap();
        store.upsert(&second, vec![1.0, 0.0]).unwrap();
        store.upsert(&third, vec![1.0, 0.0]).unwrap();
        // Replacing keeps the original position
        store.upsert(&first, vec![2.0, 0.0]).unwrap();

        let ids: Vec<Uuid> = store
            .search(&[1.0, 0.0], 3)
            .unwrap()
            .into_iter()
            .map(|r| r.chunk.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
    }

    #[test]
    fn test_fewer_than_k() {
        let store = VectorStore::in_memory();
        store
            .upsert(&chunk(Uuid::new_v4(), 0), vec![1.0, 1.0])
            .unwrap();
        assert_eq!(store.search(&[1.0, 0.0], 10).unwrap().len(), 1);
        assert!(VectorStore::in_memory()
            .search(&[1.0], 3)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_delete_hides_document() {
        let store = VectorStore::in_memory();
        let keep = Uuid::new_v4();
        let gone = Uuid::new_v4();

        store
            .upsert_batch(vec![
                (chunk(gone, 0), vec![1.0, 0.0]),
                (chunk(gone, 1), vec![0.9, 0.1]),
                (chunk(keep, 0), vec![0.0, 1.0]),
            ])
            .unwrap();

        assert_eq!(store.delete_by_document(&gone).unwrap(), 2);
        assert_eq!(store.delete_by_document(&gone).unwrap(), 0);

        let results = store.search(&[1.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results.iter().all(|r| r.chunk.document_id == keep));
    }

    #[test]
    fn test_rejects_bad_vectors() {
        let store = VectorStore::in_memory();
        let doc = Uuid::new_v4();
        store.upsert(&chunk(doc, 0), vec![1.0, 0.0]).unwrap();

        assert!(store.upsert(&chunk(doc, 1), vec![1.0, 0.0, 0.0]).is_err());
        assert!(store.upsert(&chunk(doc, 2), vec![f32::NAN, 0.0]).is_err());
        assert!(store.search(&[1.0], 1).is_err());

        let batch = vec![(chunk(doc, 3), vec![1.0, 0.0]), (chunk(doc, 4), vec![1.0])];
        assert!(store.upsert_batch(batch).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.json");
        let doc = Uuid::new_v4();
        let c = chunk(doc, 0);

        {
            let store = VectorStore::open(&path).unwrap();
            store.upsert(&c, vec![0.6, 0.8]).unwrap();
        }

        let reopened = VectorStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.document_len(&doc), 1);
        let results = reopened.search(&[0.6, 0.8], 1).unwrap();
        assert_eq!(results[0].chunk, c);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_failed_snapshot_write_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.json");
        let store = VectorStore::open(&path).unwrap();
        let doc = Uuid::new_v4();
        store.upsert(&chunk(doc, 0), vec![1.0, 0.0]).unwrap();

        // A directory where the temporary snapshot goes makes every write fail
        let blocker = dir.path().join("vectors.tmp");
        std::fs::create_dir(&blocker).unwrap();

        assert!(store.upsert(&chunk(doc, 1), vec![0.0, 1.0]).is_err());
        assert!(store.delete_by_document(&doc).is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.document_len(&doc), 1);
        assert_eq!(store.search(&[0.0, 1.0], 5).unwrap().len(), 1);

        std::fs::remove_dir(&blocker).unwrap();
        assert_eq!(store.delete_by_document(&doc).unwrap(), 1);
        assert!(VectorStore::open(&path).unwrap().is_empty());
    }

    #[test]
    fn test_queries_proceed_while_a_write_is_pending() {
        let store = Arc::new(VectorStore::in_memory());
        let doc = Uuid::new_v4();
        store.upsert(&chunk(doc, 0), vec![1.0, 0.0]).unwrap();

        let writer = store.writer.lock();
        let pending = {
            let store = store.clone();
            std::thread::spawn(move || store.upsert(&chunk(doc, 1), vec![0.0, 1.0]))
        };

        assert_eq!(store.search(&[1.0, 0.0], 5).unwrap().len(), 1);
        assert_eq!(store.len(), 1);

        drop(writer);
        pending.join().unwrap().unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_emptied_index_accepts_new_dimensions() {
        let store = VectorStore::in_memory();
        let first = Uuid::new_v4();
        store.upsert(&chunk(first, 0), vec![1.0, 0.0]).unwrap();
        assert_eq!(store.delete_by_document(&first).unwrap(), 1);

        let second = Uuid::new_v4();
        store
            .upsert(&chunk(second, 0), vec![1.0, 0.0, 0.0])
            .unwrap();
        let hits = store.search(&[1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].chunk.document_id, second);
    }
}
