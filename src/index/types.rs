//! Shared types for vector index implementations.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with the vector index.
///
/// Index failures are degraded-mode triggers for ingestion and answering:
/// the engine logs them and falls back instead of failing the request.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid index URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Backend responded with an unexpected status code.
    #[error("Unexpected index response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the backend.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// A vector's dimension does not match the index dimension.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension fixed at index-creation time.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
}

/// A chunk prepared for indexing: identifier, provenance, text, and vector.
#[derive(Debug, Clone)]
pub struct ChunkEntry {
    /// Identifier unique within the index (`{document_id}_chunk_{seq}`).
    pub chunk_id: String,
    /// Identifier of the parent document.
    pub document_id: String,
    /// Position of the chunk within the document.
    pub sequence_index: usize,
    /// Raw chunk text stored alongside the vector.
    pub text: String,
    /// Embedding vector produced for the chunk.
    pub vector: Vec<f32>,
}

/// Scored hit returned by similarity queries.
#[derive(Debug, Clone)]
pub struct QueryHit {
    /// Identifier of the matching chunk.
    pub chunk_id: String,
    /// Cosine similarity score, higher is closer.
    pub score: f32,
    /// Identifier of the parent document.
    pub document_id: String,
    /// Position of the chunk within its document.
    pub sequence_index: usize,
    /// Stored chunk text.
    pub text: String,
}

/// A stored chunk listed without a similarity score.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    /// Identifier of the chunk.
    pub chunk_id: String,
    /// Position of the chunk within its document.
    pub sequence_index: usize,
    /// Stored chunk text.
    pub text: String,
}

/// Size and capacity snapshot of the index.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct IndexStats {
    /// Number of vectors currently stored.
    pub total_vector_count: usize,
    /// Dimension fixed at index-creation time.
    pub dimension: usize,
    /// Fraction of index capacity in use, zero when the backend does not
    /// report capacity.
    pub index_fullness: f32,
}

/// Interface implemented by vector index backends.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Store or replace entries keyed by chunk id. Idempotent.
    async fn upsert(&self, entries: Vec<ChunkEntry>) -> Result<(), IndexError>;

    /// Return at most `top_k` entries ranked by descending cosine similarity,
    /// optionally restricted to a single document.
    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        document_id: Option<&str>,
    ) -> Result<Vec<QueryHit>, IndexError>;

    /// Remove all chunks belonging to the document. Deleting an unknown
    /// document is a no-op.
    async fn delete(&self, document_id: &str) -> Result<(), IndexError>;

    /// Return a size and capacity snapshot.
    async fn stats(&self) -> Result<IndexStats, IndexError>;

    /// List all chunks of a document ordered by sequence index.
    async fn document_chunks(&self, document_id: &str) -> Result<Vec<StoredChunk>, IndexError>;
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
pub(crate) struct ScrollResponse {
    pub(crate) result: ScrollResult,
}

#[derive(Deserialize)]
pub(crate) struct ScrollResult {
    #[serde(default)]
    pub(crate) points: Vec<ScrollPoint>,
    #[serde(default)]
    pub(crate) next_page_offset: Option<Value>,
}

#[derive(Deserialize)]
pub(crate) struct ScrollPoint {
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfoResponse {
    pub(crate) result: CollectionInfo,
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfo {
    #[serde(default)]
    pub(crate) points_count: Option<usize>,
    pub(crate) config: CollectionConfig,
}

#[derive(Deserialize)]
pub(crate) struct CollectionConfig {
    pub(crate) params: CollectionParams,
}

#[derive(Deserialize)]
pub(crate) struct CollectionParams {
    pub(crate) vectors: VectorParams,
}

#[derive(Deserialize)]
pub(crate) struct VectorParams {
    pub(crate) size: usize,
}
