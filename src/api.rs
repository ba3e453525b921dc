//! HTTP surface for the document chat service.
//!
//! This module exposes a compact Axum router mirroring the engine operations:
//!
//! - `POST /upload`: validate an extracted document, generate a summary, and
//!   index its chunks. Returns the summary, a 500-character preview, and the
//!   assigned document id.
//! - `POST /chat`: answer a question about a document, via retrieval or
//!   full-text fallback.
//! - `POST /search`: semantic search across all stored documents.
//! - `GET /documents/{id}/chunks`: list a document's stored chunks.
//! - `DELETE /documents/{id}`: remove a document from the vector index.
//! - `GET /health`, `GET /stats`: service and vector index availability.
//! - `GET /metrics`: ingestion and answering counters.
//!
//! Handlers are generic over [`EngineApi`] so tests can inject stub engines.

use crate::engine::{EngineApi, EngineError};
use crate::extract::{self, ExtractionError};
use crate::index::IndexStats;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Number of characters of the original text echoed back after upload.
const PREVIEW_CHARS: usize = 500;

/// Default number of results for cross-document search.
const DEFAULT_SEARCH_TOP_K: usize = 5;

/// Build the HTTP router exposing the document chat API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: EngineApi + 'static,
{
    Router::new()
        .route("/health", get(health_check::<S>))
        .route("/upload", post(upload_document::<S>))
        .route("/chat", post(chat::<S>))
        .route("/search", post(search_documents::<S>))
        .route("/documents/:document_id/chunks", get(get_document_chunks::<S>))
        .route("/documents/:document_id", delete(delete_document::<S>))
        .route("/stats", get(get_stats::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(service)
}

/// Request body for `POST /upload`.
///
/// `content` carries the text already extracted by the ingestion layer;
/// binary formats never reach this surface.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadRequest {
    /// Original filename, used for type validation and reporting.
    filename: String,
    /// Extracted document text.
    content: String,
}

/// Success response for `POST /upload`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    summary: String,
    original_text_preview: String,
    filename: String,
    file_type: String,
    document_id: String,
    vector_db_enabled: bool,
}

/// Validate an uploaded document, summarize it, and index its chunks.
///
/// Indexing failures do not fail the upload; `vectorDbEnabled` reports
/// whether chunks were stored so clients can surface degraded capability.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, AppError>
where
    S: EngineApi,
{
    let (text, file_type) = extract::process_document(&request.filename, &request.content)?;
    let document_id = Uuid::new_v4().to_string();

    let outcome = service.ingest(&document_id, &text).await?;
    tracing::info!(
        document_id,
        filename = %request.filename,
        indexed = outcome.indexed,
        chunks = outcome.chunk_count,
        "Upload processed"
    );

    Ok(Json(UploadResponse {
        summary: outcome.summary,
        original_text_preview: text_preview(&text, PREVIEW_CHARS),
        filename: request.filename,
        file_type,
        document_id,
        vector_db_enabled: outcome.indexed,
    }))
}

/// Request body for `POST /chat`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    question: String,
    #[serde(default)]
    document_text: Option<String>,
    #[serde(default)]
    document_id: Option<String>,
}

/// Success response for `POST /chat`.
#[derive(Serialize)]
struct ChatResponse {
    answer: String,
}

/// Answer a question about a document.
///
/// Retrieval failures are internal: the handler always returns an answer
/// unless the language model itself fails after retry.
async fn chat<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError>
where
    S: EngineApi,
{
    if request.question.trim().is_empty() {
        return Err(AppError::bad_request("Question is required"));
    }

    let outcome = service
        .answer(
            &request.question,
            request.document_id.as_deref(),
            request.document_text.as_deref(),
        )
        .await?;
    tracing::debug!(source = ?outcome.source, "Chat answered");

    Ok(Json(ChatResponse {
        answer: outcome.answer,
    }))
}

/// Request body for `POST /search`.
#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

/// Success response for `POST /search`.
#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResultBody>,
}

#[derive(Serialize)]
struct SearchResultBody {
    text: String,
    score: f32,
    document_id: String,
    chunk_index: usize,
}

/// Semantic search across all stored documents.
async fn search_documents<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError>
where
    S: EngineApi,
{
    if request.query.trim().is_empty() {
        return Err(AppError::bad_request("Search query is required"));
    }

    let top_k = request.top_k.unwrap_or(DEFAULT_SEARCH_TOP_K);
    let results = service.search(&request.query, top_k).await?;

    Ok(Json(SearchResponse {
        results: results
            .into_iter()
            .map(|result| SearchResultBody {
                text: result.text,
                score: result.score,
                document_id: result.document_id,
                chunk_index: result.chunk_index,
            })
            .collect(),
    }))
}

/// Success response for `GET /documents/{id}/chunks`.
#[derive(Serialize)]
struct ChunksResponse {
    chunks: Vec<ChunkBody>,
}

#[derive(Serialize)]
struct ChunkBody {
    text: String,
    chunk_index: usize,
}

/// List all stored chunks of a document in sequence order.
async fn get_document_chunks<S>(
    State(service): State<Arc<S>>,
    Path(document_id): Path<String>,
) -> Result<Json<ChunksResponse>, AppError>
where
    S: EngineApi,
{
    let chunks = service.document_chunks(&document_id).await?;
    Ok(Json(ChunksResponse {
        chunks: chunks
            .into_iter()
            .map(|chunk| ChunkBody {
                text: chunk.text,
                chunk_index: chunk.chunk_index,
            })
            .collect(),
    }))
}

/// Delete a document's chunks from the vector index.
async fn delete_document<S>(
    State(service): State<Arc<S>>,
    Path(document_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError>
where
    S: EngineApi,
{
    service.delete_document(&document_id).await?;
    Ok(Json(json!({ "message": "Document deleted successfully" })))
}

/// Response body shared by `GET /health` and `GET /stats`.
#[derive(Serialize)]
struct AvailabilityBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
    ai_available: bool,
    vector_db_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    vector_stats: Option<IndexStats>,
}

/// Health check endpoint.
async fn health_check<S>(State(service): State<Arc<S>>) -> Json<AvailabilityBody>
where
    S: EngineApi,
{
    let health = service.health().await;
    Json(AvailabilityBody {
        status: Some("healthy"),
        ai_available: health.ai_available,
        vector_db_available: health.vector_db_available,
        vector_stats: health.vector_stats,
    })
}

/// Vector index availability and statistics.
async fn get_stats<S>(State(service): State<Arc<S>>) -> Json<AvailabilityBody>
where
    S: EngineApi,
{
    let health = service.health().await;
    Json(AvailabilityBody {
        status: None,
        ai_available: health.ai_available,
        vector_db_available: health.vector_db_available,
        vector_stats: health.vector_stats,
    })
}

/// Return ingestion and answering counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: EngineApi,
{
    Json(service.metrics_snapshot())
}

/// Error wrapper translating core errors into HTTP responses.
enum AppError {
    /// Client-side problem, reported verbatim with a 400.
    BadRequest(String),
    /// Upload validation failure, reported verbatim with a 400.
    Extraction(ExtractionError),
    /// Engine failure, reported with a sanitized message.
    Engine(EngineError),
}

impl AppError {
    fn bad_request(message: &str) -> Self {
        Self::BadRequest(message.to_string())
    }
}

impl From<ExtractionError> for AppError {
    fn from(inner: ExtractionError) -> Self {
        Self::Extraction(inner)
    }
}

impl From<EngineError> for AppError {
    fn from(inner: EngineError) -> Self {
        Self::Engine(inner)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Extraction(error) => (StatusCode::BAD_REQUEST, error.to_string()),
            Self::Engine(error) => {
                tracing::error!(error = %error, "Request failed");
                let message = match error {
                    EngineError::SummarizationFailed(_) | EngineError::AnsweringFailed(_) => {
                        "The AI service failed to process the request. Please try again."
                    }
                    EngineError::Embedding(_) | EngineError::Index(_) => {
                        "Vector database is not available"
                    }
                    EngineError::Chunking(_) => "Failed to process the document",
                };
                (StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// First `max_chars` characters of `text`, marked with an ellipsis when cut.
fn text_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((offset, _)) => format!("{}...", &text[..offset]),
        None => text.to_string(),
    }
}
