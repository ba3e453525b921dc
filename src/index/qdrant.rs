//! HTTP client wrapper implementing [`VectorIndex`] against Qdrant.

use crate::index::types::{
    ChunkEntry, CollectionInfoResponse, IndexError, IndexStats, QueryHit, QueryPoint,
    QueryResponse, QueryResponseResult, ScrollResponse, StoredChunk, VectorIndex,
};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Map, Value, json};
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Vector index backed by the Qdrant HTTP API.
pub struct QdrantIndex {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) collection: String,
    pub(crate) dimension: usize,
}

impl QdrantIndex {
    /// Construct a new client for the given Qdrant instance and collection.
    pub fn new(
        url: &str,
        api_key: Option<String>,
        collection: &str,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self, IndexError> {
        let client = Client::builder()
            .user_agent("docuchat/0.1")
            .timeout(timeout)
            .build()?;
        let base_url = normalize_base_url(url).map_err(IndexError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            collection,
            dimension,
            has_api_key = api_key.as_deref().map(|value| !value.is_empty()).unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
            collection: collection.to_string(),
            dimension,
        })
    }

    /// Create the collection when missing and ensure payload indexes exist.
    ///
    /// The collection is created with cosine distance and the configured
    /// vector dimension; a keyword payload index on `document_id` backs the
    /// per-document filters used by queries and deletes.
    pub async fn ensure_collection(&self) -> Result<(), IndexError> {
        if !self.collection_exists().await? {
            tracing::debug!(
                collection = %self.collection,
                dimension = self.dimension,
                "Creating collection"
            );
            let body = json!({
                "vectors": {
                    "size": self.dimension,
                    "distance": "Cosine"
                }
            });
            let response = self
                .request(Method::PUT, &format!("collections/{}", self.collection))
                .json(&body)
                .send()
                .await?;
            self.ensure_success(response).await?;
        }

        for (field, schema) in [("document_id", "keyword"), ("sequence_index", "integer")] {
            let body = json!({
                "field_name": field,
                "field_schema": schema,
            });
            let response = self
                .request(
                    Method::PUT,
                    &format!("collections/{}/index", self.collection),
                )
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() || response.status() == StatusCode::CONFLICT {
                tracing::debug!(collection = %self.collection, field, "Payload index ensured");
            } else {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = IndexError::UnexpectedStatus { status, body };
                tracing::warn!(collection = %self.collection, field, error = %error, "Failed to ensure payload index");
            }
        }

        Ok(())
    }

    async fn collection_exists(&self) -> Result<bool, IndexError> {
        let response = self
            .request(Method::GET, &format!("collections/{}", self.collection))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = IndexError::UnexpectedStatus { status, body };
                tracing::error!(collection = %self.collection, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success(&self, response: reqwest::Response) -> Result<(), IndexError> {
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = IndexError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }

    fn document_filter(document_id: &str) -> Value {
        json!({
            "must": [
                {
                    "key": "document_id",
                    "match": { "value": document_id }
                }
            ]
        })
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(&self, entries: Vec<ChunkEntry>) -> Result<(), IndexError> {
        if entries.is_empty() {
            return Ok(());
        }

        for entry in &entries {
            if entry.vector.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual: entry.vector.len(),
                });
            }
        }

        let now = current_timestamp_rfc3339();
        let point_count = entries.len();
        let points: Vec<Value> = entries
            .into_iter()
            .map(|entry| {
                json!({
                    "id": point_id(&entry.chunk_id),
                    "vector": entry.vector,
                    "payload": {
                        "chunk_id": entry.chunk_id,
                        "document_id": entry.document_id,
                        "sequence_index": entry.sequence_index,
                        "text": entry.text,
                        "created_at": now,
                    },
                })
            })
            .collect();

        let response = self
            .request(
                Method::PUT,
                &format!("collections/{}/points", self.collection),
            )
            .query(&[("wait", true)])
            .json(&json!({ "points": points }))
            .send()
            .await?;

        self.ensure_success(response).await?;
        tracing::debug!(collection = %self.collection, points = point_count, "Points upserted");
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

        let mut body = json!({
            "query": vector,
            "limit": top_k,
            "with_payload": true,
        });
        if let Some(document_id) = document_id {
            body.as_object_mut()
                .expect("query body should remain an object")
                .insert("filter".into(), Self::document_filter(document_id));
        }

        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/query", self.collection),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = IndexError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };

        Ok(points.into_iter().filter_map(map_query_point).collect())
    }

    async fn delete(&self, document_id: &str) -> Result<(), IndexError> {
        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/delete", self.collection),
            )
            .query(&[("wait", true)])
            .json(&json!({ "filter": Self::document_filter(document_id) }))
            .send()
            .await?;

        self.ensure_success(response).await?;
        tracing::debug!(collection = %self.collection, document_id, "Document chunks deleted");
        Ok(())
    }

    async fn stats(&self) -> Result<IndexStats, IndexError> {
        let response = self
            .request(Method::GET, &format!("collections/{}", self.collection))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::UnexpectedStatus { status, body });
        }

        let info: CollectionInfoResponse = response.json().await?;
        Ok(IndexStats {
            total_vector_count: info.result.points_count.unwrap_or(0),
            dimension: info.result.config.params.vectors.size,
            // Qdrant does not report a capacity notion; kept for interface parity.
            index_fullness: 0.0,
        })
    }

    async fn document_chunks(&self, document_id: &str) -> Result<Vec<StoredChunk>, IndexError> {
        let mut offset: Option<Value> = None;
        let mut chunks = Vec::new();

        loop {
            let mut body = json!({
                "with_payload": true,
                "with_vector": false,
                "limit": 256,
                "filter": Self::document_filter(document_id),
            });
            if let Some(cursor) = offset.take() {
                body.as_object_mut()
                    .expect("scroll body should remain an object")
                    .insert("offset".into(), cursor);
            }

            let response = self
                .request(
                    Method::POST,
                    &format!("collections/{}/points/scroll", self.collection),
                )
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = IndexError::UnexpectedStatus { status, body };
                tracing::error!(collection = %self.collection, error = %error, "Failed to scroll document chunks");
                return Err(error);
            }

            let ScrollResponse { result } = response.json().await?;
            for point in result.points {
                if let Some(payload) = point.payload
                    && let Some(chunk) = stored_chunk_from_payload(&payload)
                {
                    chunks.push(chunk);
                }
            }

            match result.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        chunks.sort_by_key(|chunk| chunk.sequence_index);
        Ok(chunks)
    }
}

/// Derive a deterministic Qdrant point id from the logical chunk id.
///
/// UUIDv5 keeps re-ingestion of the same document idempotent: the same
/// `{document_id}_chunk_{seq}` always maps to the same point.
fn point_id(chunk_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes()).to_string()
}

fn map_query_point(point: QueryPoint) -> Option<QueryHit> {
    let payload = point.payload?;
    Some(QueryHit {
        chunk_id: payload_str(&payload, "chunk_id")?,
        score: point.score,
        document_id: payload_str(&payload, "document_id")?,
        sequence_index: payload_usize(&payload, "sequence_index")?,
        text: payload_str(&payload, "text")?,
    })
}

fn stored_chunk_from_payload(payload: &Map<String, Value>) -> Option<StoredChunk> {
    Some(StoredChunk {
        chunk_id: payload_str(payload, "chunk_id")?,
        sequence_index: payload_usize(payload, "sequence_index")?,
        text: payload_str(payload, "text")?,
    })
}

fn payload_str(payload: &Map<String, Value>, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn payload_usize(payload: &Map<String, Value>, key: &str) -> Option<usize> {
    payload
        .get(key)
        .and_then(Value::as_u64)
        .map(|value| value as usize)
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, Method::PUT, MockServer};

    fn test_index(base_url: String) -> QdrantIndex {
        QdrantIndex {
            client: Client::builder()
                .user_agent("docuchat-test")
                .build()
                .expect("client"),
            base_url,
            api_key: None,
            collection: "docs".into(),
            dimension: 2,
        }
    }

    #[test]
    fn point_ids_are_deterministic() {
        let a = point_id("doc-1_chunk_0");
        let b = point_id("doc-1_chunk_0");
        let c = point_id("doc-1_chunk_1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn query_emits_filter_and_parses_hits() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/docs/points/query")
                    .json_body_partial(
                        r#"{
                            "limit": 3,
                            "filter": {
                                "must": [
                                    { "key": "document_id", "match": { "value": "doc-1" } }
                                ]
                            }
                        }"#,
                    );
                then.status(200).json_body(json!({
                    "result": [
                        {
                            "id": "11111111-1111-1111-1111-111111111111",
                            "score": 0.87,
                            "payload": {
                                "chunk_id": "doc-1_chunk_0",
                                "document_id": "doc-1",
                                "sequence_index": 0,
                                "text": "First chunk."
                            }
                        }
                    ]
                }));
            })
            .await;

        let index = test_index(server.base_url());
        let hits = index
            .query(vec![0.1, 0.2], 3, Some("doc-1"))
            .await
            .expect("query");

        mock.assert();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "doc-1_chunk_0");
        assert_eq!(hits[0].document_id, "doc-1");
        assert_eq!(hits[0].sequence_index, 0);
        assert!((hits[0].score - 0.87).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn query_rejects_mismatched_dimension() {
        let server = MockServer::start_async().await;
        let index = test_index(server.base_url());
        let error = index
            .query(vec![0.1, 0.2, 0.3], 3, None)
            .await
            .expect_err("dimension mismatch");
        assert!(matches!(
            error,
            IndexError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn upsert_sends_deterministic_point_ids() {
        let server = MockServer::start_async().await;
        let expected_id = point_id("doc-1_chunk_0");
        let mock = server
            .mock_async(move |when, then| {
                when.method(PUT)
                    .path("/collections/docs/points")
                    .body_contains(&expected_id);
                then.status(200).json_body(json!({ "result": {}, "status": "ok" }));
            })
            .await;

        let index = test_index(server.base_url());
        index
            .upsert(vec![ChunkEntry {
                chunk_id: "doc-1_chunk_0".into(),
                document_id: "doc-1".into(),
                sequence_index: 0,
                text: "First chunk.".into(),
                vector: vec![0.5, 0.5],
            }])
            .await
            .expect("upsert");

        mock.assert();
    }

    #[tokio::test]
    async fn delete_targets_document_filter() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/docs/points/delete")
                    .body_contains("doc-1");
                then.status(200).json_body(json!({ "result": {}, "status": "ok" }));
            })
            .await;

        let index = test_index(server.base_url());
        index.delete("doc-1").await.expect("delete");
        mock.assert();
    }
}
