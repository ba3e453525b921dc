//! Core data types and error definitions for the answering engine.

use crate::{embedding::EmbeddingError, index::IndexError, model::ModelError};
use thiserror::Error;

/// Errors produced while splitting document text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Chunking was configured with an impossible window length.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must leave room for the window to advance.
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    InvalidOverlap {
        /// Requested overlap in characters.
        overlap: usize,
        /// Requested chunk size in characters.
        chunk_size: usize,
    },
}

/// Errors emitted by the answering engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// The language model failed to produce a summary after retry.
    #[error("Failed to summarize document: {0}")]
    SummarizationFailed(#[source] ModelError),
    /// The language model failed to produce an answer after retry.
    #[error("Failed to answer question: {0}")]
    AnsweringFailed(#[source] ModelError),
    /// Embedding provider failed while serving a vector-search request.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Vector index request failed while serving a vector-search request.
    #[error("Vector index request failed: {0}")]
    Index(#[from] IndexError),
}

/// A contiguous slice of document text produced by the chunker.
///
/// Offsets are byte offsets into the source text and always fall on UTF-8
/// character boundaries. Consecutive chunks overlap by at most the configured
/// overlap and their union covers the source text with no gaps.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Position of the chunk within the document, starting at zero.
    pub sequence_index: usize,
    /// Raw chunk text sliced from the source.
    pub text: String,
    /// Byte offset of the first character of the chunk.
    pub start_offset: usize,
    /// Byte offset one past the last character of the chunk.
    pub end_offset: usize,
}

/// How the context for an answer was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    /// Context came from chunks retrieved via the vector index.
    Retrieval,
    /// Context came from the raw document text (degraded mode).
    FullText,
}

/// Result of answering a question, tagged with its context source.
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    /// Answer text produced by the language model.
    pub answer: String,
    /// Whether the answer was grounded in retrieved chunks or full text.
    pub source: AnswerSource,
}

/// Result of ingesting a document.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Summary produced for the document.
    pub summary: String,
    /// Number of chunks indexed for the document (zero when indexing failed).
    pub chunk_count: usize,
    /// Whether chunk embeddings were stored in the vector index.
    pub indexed: bool,
}

/// Search hit returned by cross-document semantic search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Stored chunk text.
    pub text: String,
    /// Similarity score reported by the index.
    pub score: f32,
    /// Identifier of the document the chunk belongs to.
    pub document_id: String,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
}

/// A chunk listed for a document, ordered by sequence index.
#[derive(Debug, Clone)]
pub struct DocumentChunk {
    /// Stored chunk text.
    pub text: String,
    /// Position of the chunk within the document.
    pub chunk_index: usize,
}

/// Reachability and capacity snapshot reported by health and stats endpoints.
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    /// Whether the language-model client is configured.
    pub ai_available: bool,
    /// Whether the vector index responded to a stats probe.
    pub vector_db_available: bool,
    /// Index statistics captured when the probe succeeded.
    pub vector_stats: Option<crate::index::IndexStats>,
}

/// Tunables injected into the answering engine at construction time.
///
/// Kept separate from the process-wide [`crate::config::Config`] so tests can
/// construct engines with deterministic parameters and stub clients.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Character overlap between adjacent chunks.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Character budget applied to prompt context before truncation.
    pub context_budget_chars: usize,
    /// Output token budget for model completions.
    pub max_tokens: u32,
    /// Sampling temperature used for summaries and answers.
    pub temperature: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 3,
            context_budget_chars: 4000,
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}
