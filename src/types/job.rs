//! Job descriptors delivered by the queue

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// A unit of ingestion work referencing one source file.
///
/// Produced by an external publisher as a JSON payload `{"path": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub path: PathBuf,
}

impl JobDescriptor {
    /// Decode a raw queue payload.
    ///
    /// A payload that is not JSON, or that lacks the `path` field, fails
    /// before any pipeline stage runs.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| Error::MalformedJob(e.to_string()))
    }
}
