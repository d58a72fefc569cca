//! Ingestion worker binary
//!
//! Reads job payloads as newline-delimited JSON from stdin (the seam where a
//! broker consumer would sit), processes them under the configured
//! concurrency bound, and exits once input closes and in-flight jobs drain.
//!
//! Run with: cargo run --bin doc-ingest-worker [config.toml]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doc_ingest::config::IngestConfig;
use doc_ingest::ingestion::TextChunker;
use doc_ingest::processing::{IngestPipeline, IngestWorker, JobQueue};
use doc_ingest::providers::{self, QdrantStore, VectorStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doc_ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config =
        IngestConfig::load(config_path.as_deref()).context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    tracing::info!("Configuration loaded");
    tracing::info!(
        "  - Embedding backend: {:?} (model {}, {} dimensions)",
        config.embeddings.backend,
        config.embeddings.model(),
        config.embeddings.dimensions()
    );
    tracing::info!(
        "  - Vector store: {} / collection '{}'",
        config.vector_db.url,
        config.vector_db.collection
    );
    tracing::info!(
        "  - Chunking: {} chars, {} overlap",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Concurrency: {}", config.processing.concurrency);

    let embedder = providers::embedding_provider(&config.embeddings)
        .await
        .context("failed to initialize embedding provider")?;

    let store: Arc<dyn VectorStore> = Arc::new(
        QdrantStore::new(&config.vector_db).context("failed to initialize vector store")?,
    );
    match store.health_check().await {
        Ok(true) => tracing::info!("Qdrant is reachable"),
        _ => tracing::warn!(
            "Qdrant not reachable at {}; jobs will fail until it is available",
            config.vector_db.url
        ),
    }

    let chunker = TextChunker::from_config(&config.chunking)?;
    let pipeline = Arc::new(IngestPipeline::new(
        chunker,
        embedder,
        store,
        config.vector_db.collection.clone(),
    ));

    let (queue, receiver) = JobQueue::new(config.processing.queue_capacity);
    let queue = Arc::new(queue);
    let worker = IngestWorker::new(pipeline, Arc::clone(&queue), &config.processing);

    // Feed the queue from stdin, one JSON payload per line.
    let feeder_queue = Arc::clone(&queue);
    let feeder = tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let job_id = feeder_queue.submit(line.as_bytes().to_vec()).await;
                    tracing::debug!(job = %job_id, "Job submitted");
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read job payload");
                    break;
                }
            }
        }
        tracing::info!("Input closed, draining in-flight jobs");
        feeder_queue.close();
    });

    worker.run(receiver).await;
    feeder.await.ok();

    let stats = queue.stats();
    tracing::info!(
        complete = stats.complete,
        failed = stats.failed,
        "Worker shut down"
    );
    Ok(())
}
