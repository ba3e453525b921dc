#![deny(missing_docs)]

//! Core library for the DocuChat document summary and chat server.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Chunking, prompt assembly, and the answering engine.
pub mod engine;
/// Upload validation and plain-text extraction.
pub mod extract;
/// Vector index abstraction, Qdrant adapter, and in-memory index.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion and answering metrics helpers.
pub mod metrics;
/// Language model client abstraction and the OpenAI-compatible adapter.
pub mod model;
