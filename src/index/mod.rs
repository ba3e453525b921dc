//! Vector index abstraction and backends.

/// Exact-scan in-memory implementation.
pub mod memory;
/// Qdrant HTTP implementation.
pub mod qdrant;
/// Trait and shared types.
pub mod types;

pub use memory::InMemoryIndex;
pub use qdrant::QdrantIndex;
pub use types::{ChunkEntry, IndexError, IndexStats, QueryHit, StoredChunk, VectorIndex};
