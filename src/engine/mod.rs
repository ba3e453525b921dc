//! Retrieval-augmented answering engine: chunking, prompt assembly, and
//! orchestration of the embedding, index, and model clients.

pub mod chunking;
mod prompts;
mod service;
pub mod types;

pub use chunking::chunk_text;
pub use service::{AnsweringEngine, EngineApi};
pub use types::{
    AnswerOutcome, AnswerSource, Chunk, ChunkingError, DocumentChunk, EngineConfig, EngineError,
    HealthSnapshot, IngestOutcome, SearchResult,
};
