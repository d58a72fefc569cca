//! Qdrant HTTP client

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::types::VectorRecord;

use super::vector_store::VectorStore;

/// Lightweight HTTP client for Qdrant collection and point operations.
pub struct QdrantStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl QdrantStore {
    pub fn new(config: &VectorDbConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut req = self.client.request(method, url);
        if let Some(api_key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.header("api-key", api_key);
        }
        req
    }

    /// Dimensionality of an existing collection, or `None` if it is missing.
    async fn collection_dimensions(&self, collection: &str) -> Result<Option<usize>> {
        let response = self
            .request(Method::GET, &format!("collections/{collection}"))
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let info: CollectionResponse = response.json().await.map_err(|e| {
                    Error::vector_db(format!("unexpected collection info for '{collection}': {e}"))
                })?;
                Ok(Some(info.result.config.params.vectors.size))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::vector_db(format!(
                    "collection lookup failed ({status}): {body}"
                )))
            }
        }
    }

    async fn create_collection(&self, collection: &str, dimensions: usize) -> Result<()> {
        let body = json!({
            "vectors": {
                "size": dimensions,
                "distance": "Cosine",
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection}"))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            tracing::info!(collection, dimensions, "Collection created");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Error::vector_db(format!(
                "failed to create collection '{collection}' ({status}): {body}"
            )))
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let dimensions = records[0].vector.len();
        if let Some(record) = records.iter().find(|r| r.vector.len() != dimensions) {
            return Err(Error::DimensionMismatch {
                collection: collection.to_string(),
                expected: dimensions,
                actual: record.vector.len(),
            });
        }

        match self.collection_dimensions(collection).await? {
            Some(existing) if existing != dimensions => {
                return Err(Error::DimensionMismatch {
                    collection: collection.to_string(),
                    expected: existing,
                    actual: dimensions,
                });
            }
            Some(_) => {}
            None => self.create_collection(collection, dimensions).await?,
        }

        let points: Vec<Value> = records
            .iter()
            .map(|record| {
                json!({
                    "id": record.id.to_string(),
                    "vector": record.vector,
                    "payload": record.payload(),
                })
            })
            .collect();

        let response = self
            .request(Method::PUT, &format!("collections/{collection}/points"))
            .query(&[("wait", true)])
            .json(&json!({ "points": points }))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            tracing::debug!(collection, points = records.len(), "Points upserted");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Error::vector_db(format!(
                "upsert into '{collection}' failed ({status}): {body}"
            )))
        }
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .request(Method::GET, "collections")
            .send()
            .await
            .map_err(transport_error)?;
        Ok(response.status().is_success())
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

/// The store being unreachable is a transient condition the queue may retry.
fn transport_error(err: reqwest::Error) -> Error {
    Error::Connection(err.to_string())
}

#[derive(Deserialize)]
struct CollectionResponse {
    result: CollectionResult,
}

#[derive(Deserialize)]
struct CollectionResult {
    config: CollectionConfig,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: VectorParams,
}

#[derive(Deserialize)]
struct VectorParams {
    size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, RawDocument, VectorRecord};
    use httpmock::{Method::GET, Method::PUT, MockServer};

    fn store_for(server: &MockServer) -> QdrantStore {
        QdrantStore::new(&VectorDbConfig {
            url: server.base_url(),
            ..Default::default()
        })
        .unwrap()
    }

    fn record(text: &str, index: u32, vector: Vec<f32>) -> VectorRecord {
        let doc = RawDocument::new("sample.pdf", 1, text.to_string());
        let chunk = Chunk::derived(&doc.metadata, text.to_string(), index);
        VectorRecord::from_chunk(chunk, vector)
    }

    fn collection_info(size: usize) -> serde_json::Value {
        serde_json::json!({
            "result": {
                "config": { "params": { "vectors": { "size": size, "distance": "Cosine" } } }
            },
            "status": "ok",
            "time": 0.0
        })
    }

    #[tokio::test]
    async fn creates_missing_collection_before_upserting() {
        let server = MockServer::start_async().await;
        let lookup = server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs");
                then.status(404);
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/docs")
                    .json_body_partial(r#"{"vectors": {"size": 3, "distance": "Cosine"}}"#);
                then.status(200).json_body(serde_json::json!({"result": true}));
            })
            .await;
        let upsert = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/docs/points")
                    .query_param("wait", "true");
                then.status(200)
                    .json_body(serde_json::json!({"result": {"status": "acknowledged"}}));
            })
            .await;

        let records = vec![record("chunk text", 0, vec![0.1, 0.2, 0.3])];
        store_for(&server).upsert("docs", &records).await.unwrap();

        lookup.assert();
        create.assert();
        upsert.assert();
    }

    #[tokio::test]
    async fn existing_collection_is_not_recreated() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs");
                then.status(200).json_body(collection_info(3));
            })
            .await;
        let upsert = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs/points");
                then.status(200)
                    .json_body(serde_json::json!({"result": {"status": "acknowledged"}}));
            })
            .await;

        let records = vec![record("chunk text", 0, vec![0.1, 0.2, 0.3])];
        store_for(&server).upsert("docs", &records).await.unwrap();
        upsert.assert();
    }

    #[tokio::test]
    async fn mismatched_dimensions_are_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/docs");
                then.status(200).json_body(collection_info(8));
            })
            .await;

        let records = vec![record("chunk text", 0, vec![0.1, 0.2, 0.3])];
        let err = store_for(&server).upsert("docs", &records).await.unwrap_err();
        assert!(
            matches!(
                err,
                Error::DimensionMismatch { expected: 8, actual: 3, .. }
            ),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn mixed_dimensions_within_a_batch_are_rejected() {
        let server = MockServer::start_async().await;
        let records = vec![
            record("one", 0, vec![0.1, 0.2]),
            record("two", 1, vec![0.1, 0.2, 0.3]),
        ];
        let err = store_for(&server).upsert("docs", &records).await.unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let server = MockServer::start_async().await;
        store_for(&server).upsert("docs", &[]).await.unwrap();
        // no mocks registered: any request would have failed the test
    }

    #[tokio::test]
    async fn unreachable_store_is_a_connection_error() {
        let store = QdrantStore::new(&VectorDbConfig {
            url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 2,
            ..Default::default()
        })
        .unwrap();

        let records = vec![record("chunk text", 0, vec![0.1])];
        let err = store.upsert("docs", &records).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)), "got: {err:?}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn upsert_uses_stable_point_ids() {
        let a = record("same chunk", 0, vec![0.5]);
        let b = record("same chunk", 0, vec![0.5]);
        assert_eq!(a.id, b.id);
    }
}
