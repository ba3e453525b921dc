//! Embedding client abstraction and adapters.
//!
//! The engine only depends on the [`EmbeddingClient`] trait. Production
//! deployments use the OpenAI-compatible HTTP adapter; tests and offline
//! setups use the deterministic hashing client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by embedding providers.
///
/// All variants are recoverable from the engine's point of view: they flip
/// the current operation into degraded mode instead of failing the request.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Backend could not be reached before the request timeout.
    #[error("Embedding backend unreachable: {0}")]
    Unreachable(String),
    /// Backend answered with a non-success status.
    #[error("Embedding backend returned {status}: {body}")]
    Backend {
        /// HTTP status returned by the backend.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Backend response could not be parsed or had the wrong shape.
    #[error("Malformed embedding response: {0}")]
    Malformed(String),
    /// Produced vectors do not match the configured dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension configured for the index.
        expected: usize,
        /// Dimension actually produced by the backend.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce one fixed-dimension vector per input text, in input order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Embedding client backed by an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbeddingClient {
    http: Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbeddingClient {
    /// Construct a client for the given endpoint and model.
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let mut headers = header::HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&auth)
                .map_err(|err| EmbeddingError::Malformed(format!("invalid API key: {err}")))?,
        );
        let http = Client::builder()
            .user_agent("docuchat/0.1")
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| EmbeddingError::Unreachable(err.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            dimension,
        })
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        let payload = json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|err| EmbeddingError::Unreachable(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Backend { status, body });
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| EmbeddingError::Malformed(err.to_string()))?;

        if parsed.data.len() != expected {
            return Err(EmbeddingError::Malformed(format!(
                "backend returned {} embeddings for {} inputs",
                parsed.data.len(),
                expected
            )));
        }

        parsed.data.sort_by_key(|entry| entry.index);
        let vectors: Vec<Vec<f32>> = parsed
            .data
            .into_iter()
            .map(|entry| entry.embedding)
            .collect();

        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }

        Ok(vectors)
    }
}

/// Deterministic embedding client that hashes text bytes into vector slots.
///
/// Useful for tests and offline smoke runs: vectors are normalized, stable
/// for identical input, and carry enough signal for exact-match retrieval.
pub struct HashingEmbeddingClient {
    dimension: usize,
}

impl HashingEmbeddingClient {
    /// Construct a hashing client producing vectors of the given dimension.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashingEmbeddingClient {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if self.dimension == 0 {
            return Err(EmbeddingError::Malformed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        Ok(texts
            .into_iter()
            .map(|text| Self::encode(&text, self.dimension))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn openai_client_parses_and_orders_vectors() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({
                    "data": [
                        { "index": 1, "embedding": [0.0, 1.0] },
                        { "index": 0, "embedding": [1.0, 0.0] }
                    ]
                }));
            })
            .await;

        let client = OpenAiEmbeddingClient::new(
            &server.base_url(),
            "test-key",
            "text-embedding-3-small",
            2,
            Duration::from_secs(5),
        )
        .expect("client");

        let vectors = client
            .embed(vec!["first".into(), "second".into()])
            .await
            .expect("embeddings");

        mock.assert();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn openai_client_rejects_wrong_dimension() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({
                    "data": [{ "index": 0, "embedding": [1.0, 0.0, 0.5] }]
                }));
            })
            .await;

        let client = OpenAiEmbeddingClient::new(
            &server.base_url(),
            "test-key",
            "text-embedding-3-small",
            2,
            Duration::from_secs(5),
        )
        .expect("client");

        let error = client
            .embed(vec!["first".into()])
            .await
            .expect_err("dimension mismatch");
        assert!(matches!(
            error,
            EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn openai_client_surfaces_backend_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(503).body("overloaded");
            })
            .await;

        let client = OpenAiEmbeddingClient::new(
            &server.base_url(),
            "test-key",
            "text-embedding-3-small",
            2,
            Duration::from_secs(5),
        )
        .expect("client");

        let error = client
            .embed(vec!["first".into()])
            .await
            .expect_err("backend error");
        assert!(matches!(error, EmbeddingError::Backend { .. }));
    }

    #[tokio::test]
    async fn hashing_client_is_deterministic_and_normalized() {
        let client = HashingEmbeddingClient::new(8);
        let first = client.embed(vec!["hello".into()]).await.expect("vectors");
        let second = client.embed(vec!["hello".into()]).await.expect("vectors");
        assert_eq!(first, second);

        let norm: f32 = first[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn hashing_client_preserves_input_order() {
        let client = HashingEmbeddingClient::new(4);
        let vectors = client
            .embed(vec!["a".into(), "b".into()])
            .await
            .expect("vectors");
        assert_eq!(vectors.len(), 2);
        assert_ne!(vectors[0], vectors[1]);
    }
}
