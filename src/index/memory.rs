//! In-memory [`VectorIndex`] implementation.
//!
//! Performs exact cosine-similarity scans over a map of entries. Used by
//! tests and useful as a stand-in when no Qdrant instance is configured.

use crate::index::types::{ChunkEntry, IndexError, IndexStats, QueryHit, StoredChunk, VectorIndex};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Exact-scan vector index held in process memory.
pub struct InMemoryIndex {
    dimension: usize,
    entries: Mutex<HashMap<String, ChunkEntry>>,
}

impl InMemoryIndex {
    /// Create an empty index with a fixed vector dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

/// Cosine similarity between two equal-length vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, entries: Vec<ChunkEntry>) -> Result<(), IndexError> {
        for entry in &entries {
            if entry.vector.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual: entry.vector.len(),
                });
            }
        }

        let mut guard = self.entries.lock().expect("index mutex poisoned");
        for entry in entries {
            guard.insert(entry.chunk_id.clone(), entry);
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        document_id: Option<&str>,
    ) -> Result<Vec<QueryHit>, IndexError> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let guard = self.entries.lock().expect("index mutex poisoned");
        let mut hits: Vec<QueryHit> = guard
            .values()
            .filter(|entry| document_id.is_none_or(|id| entry.document_id == id))
            .map(|entry| QueryHit {
                chunk_id: entry.chunk_id.clone(),
                score: cosine_similarity(&vector, &entry.vector),
                document_id: entry.document_id.clone(),
                sequence_index: entry.sequence_index,
                text: entry.text.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete(&self, document_id: &str) -> Result<(), IndexError> {
        let mut guard = self.entries.lock().expect("index mutex poisoned");
        guard.retain(|_, entry| entry.document_id != document_id);
        Ok(())
    }

    async fn stats(&self) -> Result<IndexStats, IndexError> {
        let guard = self.entries.lock().expect("index mutex poisoned");
        Ok(IndexStats {
            total_vector_count: guard.len(),
            dimension: self.dimension,
            index_fullness: 0.0,
        })
    }

    async fn document_chunks(&self, document_id: &str) -> Result<Vec<StoredChunk>, IndexError> {
        let guard = self.entries.lock().expect("index mutex poisoned");
        let mut chunks: Vec<StoredChunk> = guard
            .values()
            .filter(|entry| entry.document_id == document_id)
            .map(|entry| StoredChunk {
                chunk_id: entry.chunk_id.clone(),
                sequence_index: entry.sequence_index,
                text: entry.text.clone(),
            })
            .collect();
        chunks.sort_by_key(|chunk| chunk.sequence_index);
        Ok(chunks)
    }
}
