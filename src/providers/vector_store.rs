//! Vector store trait

use async_trait::async_trait;

use crate::error::Result;
use crate::types::VectorRecord;

/// Trait for persisting vector records into a named collection.
///
/// Implementations:
/// - `QdrantStore`: Qdrant over HTTP
///
/// Upsert is keyed by record id: writing the same record twice must leave a
/// single copy, which makes full-pipeline reruns after redelivery safe. A
/// missing collection is created with the dimensionality of the first batch;
/// later batches with a different dimensionality are rejected.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or update records in `collection`, creating it if absent.
    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()>;

    /// Check if the store is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Store name for logging
    fn name(&self) -> &str;
}
