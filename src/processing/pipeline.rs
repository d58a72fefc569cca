//! The ingestion pipeline: decode, load, chunk, embed, store

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::ingestion::{PdfLoader, TextChunker};
use crate::providers::{EmbeddingProvider, VectorStore};
use crate::types::{JobDescriptor, VectorRecord};

use super::job_queue::JobDelivery;

/// Outcome of a successfully ingested job
#[derive(Debug, Clone, Copy)]
pub struct IngestReport {
    pub pages: usize,
    pub chunks: usize,
}

/// Runs every stage of a job in order against shared provider instances.
///
/// A failure at any stage aborts the job with nothing persisted: records are
/// only written after every chunk has its vector. Combined with stable
/// record ids, that makes rerunning the whole pipeline on redelivery safe.
pub struct IngestPipeline {
    loader: PdfLoader,
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl IngestPipeline {
    pub fn new(
        chunker: TextChunker,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            loader: PdfLoader::new(),
            chunker,
            embedder,
            store,
            collection: collection.into(),
        }
    }

    /// Collection this pipeline writes to
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Process one delivery end to end.
    pub async fn run(&self, delivery: &JobDelivery) -> Result<IngestReport> {
        let job_id = delivery.id;
        let job = JobDescriptor::decode(&delivery.payload)?;

        tracing::debug!(job = %job_id, path = %job.path.display(), "Loading document");
        let loader = self.loader;
        let path = job.path.clone();
        let documents = tokio::task::spawn_blocking(move || loader.load(&path))
            .await
            .map_err(|e| Error::Internal(format!("load task failed: {e}")))??;
        let pages = documents.len();

        let chunks = self.chunker.split(&documents);
        tracing::debug!(job = %job_id, pages, chunks = chunks.len(), "Document chunked");
        if chunks.is_empty() {
            tracing::warn!(job = %job_id, path = %job.path.display(), "Document produced no chunks");
            return Ok(IngestReport { pages, chunks: 0 });
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(Error::embedding(format!(
                "provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorRecord::from_chunk(chunk, vector))
            .collect();
        let stored = records.len();

        self.store.upsert(&self.collection, &records).await?;
        tracing::debug!(job = %job_id, records = stored, collection = %self.collection, "Vectors stored");

        Ok(IngestReport {
            pages,
            chunks: stored,
        })
    }
}
