//! doc-ingest: queue-driven document ingestion worker
//!
//! Consumes file-upload jobs, extracts text from PDFs page by page, splits
//! it into bounded overlapping chunks, embeds each chunk through a pluggable
//! provider (remote OpenAI-compatible API or local ONNX model), and upserts
//! the resulting vectors into a Qdrant collection. Failures propagate to the
//! queue, whose retry policy owns redelivery; record ids are deterministic,
//! so reruns overwrite instead of duplicating.

pub mod config;
pub mod error;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod types;

pub use config::IngestConfig;
pub use error::{Error, Result};
pub use processing::{IngestPipeline, IngestReport, IngestWorker, JobQueue, JobStatus};
pub use providers::{EmbeddingProvider, VectorStore};
pub use types::{Chunk, JobDescriptor, RawDocument, VectorRecord};
