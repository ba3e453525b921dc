//! Answering engine coordinating chunking, embedding, retrieval, and the
//! language model.

use crate::{
    embedding::{EmbeddingClient, EmbeddingError},
    engine::{
        chunking::chunk_text,
        prompts::{
            ANSWER_SYSTEM_PROMPT, SUMMARY_SYSTEM_PROMPT, build_answer_prompt,
            build_summary_prompt, truncate_to_budget,
        },
        types::{
            AnswerOutcome, AnswerSource, DocumentChunk, EngineConfig, EngineError, HealthSnapshot,
            IngestOutcome, SearchResult,
        },
    },
    index::{ChunkEntry, VectorIndex},
    metrics::{EngineMetrics, MetricsSnapshot},
    model::{LanguageModelClient, ModelError},
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Backoff applied before the single retry of model and embedding calls.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Reply used when neither retrieval nor a document text is available.
const NO_CONTEXT_ANSWER: &str =
    "I don't have enough context to answer this question. Please upload a document first.";

/// Coordinates the full pipeline: summarization, chunking, embedding,
/// vector storage, and retrieval-augmented answering.
///
/// The engine owns long-lived handles to its three collaborators and an
/// explicit [`EngineConfig`]; it never reads ambient global state, so tests
/// can construct it with stub clients and deterministic parameters.
/// Construct once near process start and share through an `Arc`.
pub struct AnsweringEngine {
    model: Box<dyn LanguageModelClient>,
    embedder: Box<dyn EmbeddingClient>,
    index: Box<dyn VectorIndex>,
    config: EngineConfig,
    metrics: Arc<EngineMetrics>,
}

/// Abstraction over the engine used by the HTTP surface.
#[async_trait]
pub trait EngineApi: Send + Sync {
    /// Summarize a document and attempt to index its chunks.
    async fn ingest(&self, document_id: &str, text: &str) -> Result<IngestOutcome, EngineError>;

    /// Answer a question about a document, via retrieval or full-text fallback.
    async fn answer(
        &self,
        question: &str,
        document_id: Option<&str>,
        full_text: Option<&str>,
    ) -> Result<AnswerOutcome, EngineError>;

    /// Semantic search across all stored documents.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, EngineError>;

    /// List the stored chunks of a document in sequence order.
    async fn document_chunks(&self, document_id: &str)
    -> Result<Vec<DocumentChunk>, EngineError>;

    /// Remove a document's chunks from the vector index.
    async fn delete_document(&self, document_id: &str) -> Result<(), EngineError>;

    /// Probe collaborator availability for health and stats reporting.
    async fn health(&self) -> HealthSnapshot;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl AnsweringEngine {
    /// Build an engine from its collaborators and explicit configuration.
    pub fn new(
        model: Box<dyn LanguageModelClient>,
        embedder: Box<dyn EmbeddingClient>,
        index: Box<dyn VectorIndex>,
        config: EngineConfig,
    ) -> Self {
        Self {
            model,
            embedder,
            index,
            config,
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    /// Generate a summary for the given document text.
    ///
    /// The text is truncated to the context budget before prompting; the
    /// model call is retried once with backoff before the operation fails.
    pub async fn summarize(&self, text: &str) -> Result<String, EngineError> {
        let bounded = truncate_to_budget(text, self.config.context_budget_chars);
        let prompt = build_summary_prompt(&bounded);
        self.complete_with_retry(SUMMARY_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(EngineError::SummarizationFailed)
    }

    /// Chunk, embed, and upsert a document, returning the chunk count.
    async fn index_document(&self, document_id: &str, text: &str) -> Result<usize, EngineError> {
        let chunks = chunk_text(text, self.config.chunk_size, self.config.chunk_overlap)?;
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.embed_with_retry(texts).await?;
        debug_assert_eq!(chunks.len(), embeddings.len());

        let entries: Vec<ChunkEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, vector)| ChunkEntry {
                chunk_id: format!("{document_id}_chunk_{}", chunk.sequence_index),
                document_id: document_id.to_string(),
                sequence_index: chunk.sequence_index,
                text: chunk.text,
                vector,
            })
            .collect();

        let count = entries.len();
        self.index.upsert(entries).await?;
        Ok(count)
    }

    /// Embed the question and pull the top-k chunks for the document.
    ///
    /// `Ok(None)` means retrieval worked but found nothing relevant; the
    /// caller decides how to fall back.
    async fn retrieve_context(
        &self,
        question: &str,
        document_id: &str,
    ) -> Result<Option<String>, EngineError> {
        let mut vectors = self.embed_with_retry(vec![question.to_string()]).await?;
        let vector = vectors.pop().ok_or_else(|| {
            EngineError::Embedding(EmbeddingError::Malformed(
                "provider returned no vectors for the query".to_string(),
            ))
        })?;

        let hits = self
            .index
            .query(vector, self.config.top_k, Some(document_id))
            .await?;
        if hits.is_empty() {
            return Ok(None);
        }

        tracing::debug!(document_id, hits = hits.len(), "Retrieved context chunks");
        let joined = hits
            .iter()
            .map(|hit| hit.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(Some(truncate_to_budget(
            &joined,
            self.config.context_budget_chars,
        )))
    }

    async fn complete_with_retry(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ModelError> {
        let first = self
            .model
            .complete(
                system_prompt,
                user_prompt,
                self.config.max_tokens,
                self.config.temperature,
            )
            .await;
        match first {
            Ok(text) => Ok(text),
            Err(error) => {
                tracing::warn!(error = %error, "Model call failed; retrying once");
                tokio::time::sleep(RETRY_BACKOFF).await;
                self.model
                    .complete(
                        system_prompt,
                        user_prompt,
                        self.config.max_tokens,
                        self.config.temperature,
                    )
                    .await
            }
        }
    }

    async fn embed_with_retry(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        match self.embedder.embed(texts.clone()).await {
            Ok(vectors) => Ok(vectors),
            Err(error) => {
                tracing::warn!(error = %error, "Embedding call failed; retrying once");
                tokio::time::sleep(RETRY_BACKOFF).await;
                self.embedder.embed(texts).await
            }
        }
    }
}

#[async_trait]
impl EngineApi for AnsweringEngine {
    async fn ingest(&self, document_id: &str, text: &str) -> Result<IngestOutcome, EngineError> {
        tracing::info!(document_id, "Ingesting document");
        let summary = self.summarize(text).await?;

        // Indexing failures are absorbed: the document stays usable for
        // question answering via the full-text fallback.
        let (chunk_count, indexed) = match self.index_document(document_id, text).await {
            Ok(0) => (0, false),
            Ok(count) => (count, true),
            Err(error) => {
                tracing::warn!(
                    document_id,
                    error = %error,
                    "Indexing failed; continuing in degraded mode"
                );
                (0, false)
            }
        };

        self.metrics.record_ingest(chunk_count as u64);
        tracing::info!(document_id, chunk_count, indexed, "Document ingested");
        Ok(IngestOutcome {
            summary,
            chunk_count,
            indexed,
        })
    }

    async fn answer(
        &self,
        question: &str,
        document_id: Option<&str>,
        full_text: Option<&str>,
    ) -> Result<AnswerOutcome, EngineError> {
        let mut source = AnswerSource::FullText;
        let mut context = String::new();

        if let Some(document_id) = document_id {
            match self.retrieve_context(question, document_id).await {
                Ok(Some(retrieved)) => {
                    context = retrieved;
                    source = AnswerSource::Retrieval;
                }
                Ok(None) => {
                    tracing::info!(
                        document_id,
                        "No relevant chunks found; using full document text"
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        document_id,
                        error = %error,
                        "Retrieval unavailable; answering in degraded mode"
                    );
                }
            }
        }

        if context.is_empty()
            && let Some(full_text) = full_text.filter(|text| !text.trim().is_empty())
        {
            context = truncate_to_budget(full_text, self.config.context_budget_chars);
        }

        if context.is_empty() {
            self.metrics.record_answer(true);
            return Ok(AnswerOutcome {
                answer: NO_CONTEXT_ANSWER.to_string(),
                source: AnswerSource::FullText,
            });
        }

        let prompt = build_answer_prompt(question, &context);
        let answer = self
            .complete_with_retry(ANSWER_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(EngineError::AnsweringFailed)?;

        self.metrics
            .record_answer(matches!(source, AnswerSource::FullText));
        Ok(AnswerOutcome { answer, source })
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, EngineError> {
        let mut vectors = self.embed_with_retry(vec![query.to_string()]).await?;
        let vector = vectors.pop().ok_or_else(|| {
            EngineError::Embedding(EmbeddingError::Malformed(
                "provider returned no vectors for the query".to_string(),
            ))
        })?;

        let hits = self.index.query(vector, top_k, None).await?;
        Ok(hits
            .into_iter()
            .map(|hit| SearchResult {
                text: hit.text,
                score: hit.score,
                document_id: hit.document_id,
                chunk_index: hit.sequence_index,
            })
            .collect())
    }

    async fn document_chunks(
        &self,
        document_id: &str,
    ) -> Result<Vec<DocumentChunk>, EngineError> {
        let chunks = self.index.document_chunks(document_id).await?;
        Ok(chunks
            .into_iter()
            .map(|chunk| DocumentChunk {
                text: chunk.text,
                chunk_index: chunk.sequence_index,
            })
            .collect())
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), EngineError> {
        self.index.delete(document_id).await?;
        tracing::info!(document_id, "Document deleted from vector index");
        Ok(())
    }

    async fn health(&self) -> HealthSnapshot {
        match self.index.stats().await {
            Ok(stats) => HealthSnapshot {
                ai_available: true,
                vector_db_available: true,
                vector_stats: Some(stats),
            },
            Err(error) => {
                tracing::warn!(error = %error, "Vector index health probe failed");
                HealthSnapshot {
                    ai_available: true,
                    vector_db_available: false,
                    vector_stats: None,
                }
            }
        }
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbeddingClient;
    use crate::index::{InMemoryIndex, IndexError, IndexStats, QueryHit, StoredChunk};
    use std::sync::Mutex;

    struct ScriptedModel {
        replies: Mutex<Vec<Result<String, ()>>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String, ()>>) -> Self {
            Self {
                replies: Mutex::new(replies),
            }
        }

        fn always(reply: &str) -> Self {
            Self::new(vec![Ok(reply.to_string()); 16])
        }
    }

    #[async_trait]
    impl LanguageModelClient for ScriptedModel {
        async fn complete(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
            _max_tokens: u32,
            _temperature: f32,
        ) -> Result<String, ModelError> {
            let mut guard = self.replies.lock().expect("replies mutex");
            match guard.pop() {
                Some(Ok(text)) => Ok(text),
                _ => Err(ModelError::Unreachable("scripted failure".to_string())),
            }
        }
    }

    struct UnavailableIndex;

    #[async_trait]
    impl VectorIndex for UnavailableIndex {
        async fn upsert(&self, _entries: Vec<ChunkEntry>) -> Result<(), IndexError> {
            Err(unavailable())
        }

        async fn query(
            &self,
            _vector: Vec<f32>,
            _top_k: usize,
            _document_id: Option<&str>,
        ) -> Result<Vec<QueryHit>, IndexError> {
            Err(unavailable())
        }

        async fn delete(&self, _document_id: &str) -> Result<(), IndexError> {
            Err(unavailable())
        }

        async fn stats(&self) -> Result<IndexStats, IndexError> {
            Err(unavailable())
        }

        async fn document_chunks(
            &self,
            _document_id: &str,
        ) -> Result<Vec<StoredChunk>, IndexError> {
            Err(unavailable())
        }
    }

    fn unavailable() -> IndexError {
        IndexError::InvalidUrl("index offline".to_string())
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            chunk_size: 50,
            chunk_overlap: 10,
            top_k: 3,
            context_budget_chars: 4000,
            max_tokens: 256,
            temperature: 0.0,
        }
    }

    fn engine_with(index: Box<dyn VectorIndex>, model: ScriptedModel) -> AnsweringEngine {
        AnsweringEngine::new(
            Box::new(model),
            Box::new(HashingEmbeddingClient::new(8)),
            index,
            test_config(),
        )
    }

    #[tokio::test]
    async fn ingest_indexes_chunks_and_summarizes() {
        let engine = engine_with(
            Box::new(InMemoryIndex::new(8)),
            ScriptedModel::always("A summary."),
        );

        let outcome = engine
            .ingest("doc-1", "First sentence. Second sentence. Third sentence here.")
            .await
            .expect("ingest");

        assert_eq!(outcome.summary, "A summary.");
        assert!(outcome.indexed);
        assert!(outcome.chunk_count >= 1);

        let snapshot = engine.metrics_snapshot();
        assert_eq!(snapshot.documents_ingested, 1);
        assert_eq!(snapshot.chunks_indexed, outcome.chunk_count as u64);
    }

    #[tokio::test]
    async fn ingest_absorbs_index_failures() {
        let engine = engine_with(Box::new(UnavailableIndex), ScriptedModel::always("Summary."));

        let outcome = engine
            .ingest("doc-1", "Hello world.")
            .await
            .expect("ingest never fails on index errors");

        assert_eq!(outcome.summary, "Summary.");
        assert!(!outcome.indexed);
        assert_eq!(outcome.chunk_count, 0);
    }

    #[tokio::test]
    async fn ingest_fails_when_summarization_fails_after_retry() {
        let engine = engine_with(
            Box::new(InMemoryIndex::new(8)),
            ScriptedModel::new(vec![]),
        );

        let error = engine
            .ingest("doc-1", "Hello world.")
            .await
            .expect_err("summarization failure propagates");
        assert!(matches!(error, EngineError::SummarizationFailed(_)));
    }

    #[tokio::test]
    async fn summarize_succeeds_after_one_retry() {
        // First scripted reply is popped last; a failure followed by success.
        let engine = engine_with(
            Box::new(InMemoryIndex::new(8)),
            ScriptedModel::new(vec![Ok("Recovered summary.".to_string()), Err(())]),
        );

        let summary = engine.summarize("Hello world.").await.expect("summary");
        assert_eq!(summary, "Recovered summary.");
    }

    #[tokio::test]
    async fn answer_uses_retrieval_when_chunks_exist() {
        let engine = engine_with(
            Box::new(InMemoryIndex::new(8)),
            ScriptedModel::always("Grounded answer."),
        );

        engine
            .ingest("doc-1", "Rust is a systems language. It values safety.")
            .await
            .expect("ingest");

        let outcome = engine
            .answer("What is Rust?", Some("doc-1"), None)
            .await
            .expect("answer");

        assert_eq!(outcome.answer, "Grounded answer.");
        assert_eq!(outcome.source, AnswerSource::Retrieval);
        assert_eq!(engine.metrics_snapshot().fallback_answers, 0);
    }

    #[tokio::test]
    async fn answer_falls_back_when_index_unavailable() {
        let engine = engine_with(
            Box::new(UnavailableIndex),
            ScriptedModel::always("Fallback answer."),
        );

        let outcome = engine
            .answer("What is this?", Some("doc-1"), Some("Hello world."))
            .await
            .expect("degraded answers never fail");

        assert_eq!(outcome.answer, "Fallback answer.");
        assert_eq!(outcome.source, AnswerSource::FullText);
        assert_eq!(engine.metrics_snapshot().fallback_answers, 1);
    }

    #[tokio::test]
    async fn answer_without_any_context_returns_guidance() {
        let engine = engine_with(Box::new(UnavailableIndex), ScriptedModel::always("unused"));

        let outcome = engine
            .answer("What is this?", None, None)
            .await
            .expect("answer");
        assert_eq!(outcome.answer, NO_CONTEXT_ANSWER);
    }

    #[tokio::test]
    async fn answer_fails_only_when_model_fails_after_retry() {
        let engine = engine_with(Box::new(UnavailableIndex), ScriptedModel::new(vec![]));

        let error = engine
            .answer("What is this?", Some("doc-1"), Some("Hello world."))
            .await
            .expect_err("model failure propagates");
        assert!(matches!(error, EngineError::AnsweringFailed(_)));
    }

    #[tokio::test]
    async fn delete_then_answer_falls_back_to_full_text() {
        let engine = engine_with(
            Box::new(InMemoryIndex::new(8)),
            ScriptedModel::always("Answer."),
        );

        engine
            .ingest("doc-1", "Rust is a systems language.")
            .await
            .expect("ingest");
        engine.delete_document("doc-1").await.expect("delete");

        let outcome = engine
            .answer(
                "What is Rust?",
                Some("doc-1"),
                Some("Rust is a systems language."),
            )
            .await
            .expect("answer");
        assert_eq!(outcome.source, AnswerSource::FullText);
    }

    #[tokio::test]
    async fn search_spans_documents() {
        let engine = engine_with(
            Box::new(InMemoryIndex::new(8)),
            ScriptedModel::always("Summary."),
        );

        engine.ingest("doc-1", "Apples are red.").await.expect("ingest");
        engine.ingest("doc-2", "Bananas are yellow.").await.expect("ingest");

        let results = engine.search("Apples are red.", 5).await.expect("search");
        assert!(!results.is_empty());
        assert!(results.len() <= 5);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn health_reports_degraded_index() {
        let engine = engine_with(Box::new(UnavailableIndex), ScriptedModel::always("unused"));
        let health = engine.health().await;
        assert!(health.ai_available);
        assert!(!health.vector_db_available);
        assert!(health.vector_stats.is_none());
    }
}
