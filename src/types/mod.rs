//! Core data types for the ingestion pipeline

pub mod document;
pub mod job;

pub use document::{Chunk, ChunkMetadata, DocumentMetadata, RawDocument, VectorRecord};
pub use job::JobDescriptor;
