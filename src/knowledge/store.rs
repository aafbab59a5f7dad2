//! Persistence seam for knowledge chunks and its Qdrant implementation.

use crate::knowledge::types::{EmbeddedChunk, VectorSearchResult};
use crate::locale::Locale;
use crate::qdrant::payload::{build_payload, current_timestamp_rfc3339, parse_payload};
use crate::qdrant::{
    KnowledgeFilter, PointUpsert, QdrantError, QdrantService, build_knowledge_filter,
    compute_chunk_hash, point_id,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;

/// Errors raised by a knowledge store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying Qdrant call failed.
    #[error(transparent)]
    Qdrant(#[from] QdrantError),
    /// Chunk metadata could not be encoded as a payload.
    #[error("Failed to encode chunk payload: {0}")]
    Payload(#[from] serde_json::Error),
    /// Vector length does not match the collection dimension.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the collection was created with.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
}

/// Vector-capable store holding the knowledge base.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Nearest chunks to `vector` within one locale partition, best first.
    async fn search(
        &self,
        vector: Vec<f32>,
        locale: Locale,
        limit: usize,
    ) -> Result<Vec<VectorSearchResult>, StoreError>;

    /// Whether any chunk exists for the source unit in `locale`.
    async fn exists(&self, source_id: &str, locale: Locale) -> Result<bool, StoreError>;

    /// Replace every chunk of a source unit in `locale` with `chunks`.
    async fn replace(
        &self,
        source_id: &str,
        locale: Locale,
        chunks: Vec<EmbeddedChunk>,
    ) -> Result<usize, StoreError>;
}

/// [`KnowledgeStore`] backed by one Qdrant collection.
pub struct QdrantKnowledgeStore {
    qdrant: QdrantService,
    collection: String,
    dimension: usize,
}

impl QdrantKnowledgeStore {
    /// Wrap `qdrant`, targeting `collection` whose vectors have `dimension` entries.
    pub fn new(qdrant: QdrantService, collection: impl Into<String>, dimension: usize) -> Self {
        Self {
            qdrant,
            collection: collection.into(),
            dimension,
        }
    }

    /// Create the collection and its payload indexes when missing.
    pub async fn ensure_collection(&self) -> Result<(), StoreError> {
        self.qdrant
            .create_collection_if_not_exists(&self.collection, self.dimension as u64)
            .await?;
        self.qdrant.ensure_payload_indexes(&self.collection).await?;
        Ok(())
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() == self.dimension {
            Ok(())
        } else {
            Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            })
        }
    }

    fn source_filter(source_id: &str, locale: Locale) -> Value {
        build_knowledge_filter(&KnowledgeFilter {
            locale: Some(locale.as_str().to_string()),
            source_id: Some(source_id.to_string()),
            content_type: None,
        })
        .unwrap_or_else(|| json!({ "must": [] }))
    }
}

#[async_trait]
impl KnowledgeStore for QdrantKnowledgeStore {
    async fn search(
        &self,
        vector: Vec<f32>,
        locale: Locale,
        limit: usize,
    ) -> Result<Vec<VectorSearchResult>, StoreError> {
        self.check_dimension(&vector)?;
        let filter = build_knowledge_filter(&KnowledgeFilter {
            locale: Some(locale.as_str().to_string()),
            ..Default::default()
        });

        let points = self
            .qdrant
            .search_points(&self.collection, vector, filter, limit)
            .await?;

        let mut results = Vec::with_capacity(points.len());
        for point in points {
            let Some(payload) = point.payload else {
                tracing::warn!(point_id = %point.id, "Skipping search hit without payload");
                continue;
            };
            match parse_payload(payload) {
                Ok(chunk) => results.push(VectorSearchResult {
                    id: point.id,
                    chunk,
                    similarity: point.score,
                }),
                Err(error) => {
                    tracing::warn!(point_id = %point.id, error = %error, "Skipping undecodable payload");
                }
            }
        }
        Ok(results)
    }

    async fn exists(&self, source_id: &str, locale: Locale) -> Result<bool, StoreError> {
        let count = self
            .qdrant
            .count_points(
                &self.collection,
                Some(Self::source_filter(source_id, locale)),
            )
            .await?;
        Ok(count > 0)
    }

    async fn replace(
        &self,
        source_id: &str,
        locale: Locale,
        chunks: Vec<EmbeddedChunk>,
    ) -> Result<usize, StoreError> {
        let updated_at = current_timestamp_rfc3339();
        let mut points = Vec::with_capacity(chunks.len());
        for EmbeddedChunk { chunk, embedding } in chunks {
            self.check_dimension(&embedding)?;
            let hash = compute_chunk_hash(&chunk.text);
            points.push(PointUpsert {
                id: point_id(source_id, locale, chunk.chunk_index),
                vector: embedding,
                payload: build_payload(&chunk, &hash, &updated_at)?,
            });
        }

        // Drop stale chunks first so a shorter re-render leaves no leftovers.
        self.qdrant
            .delete_points(&self.collection, Self::source_filter(source_id, locale))
            .await?;
        let written = self.qdrant.upsert_points(&self.collection, points).await?;
        tracing::debug!(source_id, locale = %locale, chunks = written, "Replaced source chunks");
        Ok(written)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::types::fixtures::chunk;
    use httpmock::{Method::POST, Method::PUT, MockServer};
    use reqwest::Client;

    fn store(server: &MockServer, dimension: usize) -> QdrantKnowledgeStore {
        let qdrant = QdrantService {
            client: Client::builder()
                .user_agent("floorchat-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: None,
        };
        QdrantKnowledgeStore::new(qdrant, "knowledge", dimension)
    }

    #[tokio::test]
    async fn search_filters_by_locale_and_skips_bad_payloads() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/knowledge/points/query")
                    .json_body_partial(
                        r#"{"filter":{"must":[{"key":"locale","match":{"value":"en"}}]},"limit":5}"#,
                    );
                then.status(200).json_body(json!({
                    "result": {
                        "points": [
                            {
                                "id": "a",
                                "score": 0.8,
                                "payload": {
                                    "text": "Oak plank",
                                    "locale": "en",
                                    "content_type": "product",
                                    "source_id": "product:1"
                                }
                            },
                            { "id": "b", "score": 0.7, "payload": { "text": "broken" } },
                            { "id": "c", "score": 0.6 }
                        ]
                    }
                }));
            })
            .await;

        let results = store(&server, 2)
            .search(vec![0.5, 0.5], Locale::En, 5)
            .await
            .expect("search");

        mock.assert();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[0].chunk.source_id, "product:1");
    }

    #[tokio::test]
    async fn search_rejects_wrong_query_dimension() {
        let server = MockServer::start_async().await;
        let error = store(&server, 3)
            .search(vec![0.5, 0.5], Locale::Bg, 5)
            .await
            .expect_err("dimension");
        assert!(matches!(
            error,
            StoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn replace_deletes_source_then_upserts() {
        let server = MockServer::start_async().await;
        let delete = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/knowledge/points/delete")
                    .json_body(json!({
                        "filter": {
                            "must": [
                                { "key": "locale", "match": { "value": "bg" } },
                                { "key": "source_id", "match": { "value": "page:/about" } }
                            ]
                        }
                    }));
                then.status(200).json_body(json!({ "status": "ok" }));
            })
            .await;
        let expected_id = point_id("page:/about", Locale::Bg, 0);
        let upsert = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/knowledge/points")
                    .body_contains(expected_id.as_str())
                    .body_contains("\"chunk_hash\"");
                then.status(200).json_body(json!({ "status": "ok" }));
            })
            .await;

        let written = store(&server, 2)
            .replace(
                "page:/about",
                Locale::Bg,
                vec![EmbeddedChunk {
                    chunk: chunk("page:/about", Locale::Bg, "За нас"),
                    embedding: vec![1.0, 0.0],
                }],
            )
            .await
            .expect("replace");

        delete.assert();
        upsert.assert();
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn exists_counts_matching_points() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/knowledge/points/count")
                    .body_contains("product:9");
                then.status(200).json_body(json!({ "result": { "count": 0 } }));
            })
            .await;

        let found = store(&server, 2)
            .exists("product:9", Locale::En)
            .await
            .expect("count");
        assert!(!found);
    }
}
