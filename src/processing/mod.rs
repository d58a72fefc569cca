//! Job consumption and pipeline execution

mod job_queue;
mod pipeline;
mod worker;

pub use job_queue::{JobDelivery, JobProgress, JobQueue, JobStatus, QueueStats};
pub use pipeline::{IngestPipeline, IngestReport};
pub use worker::IngestWorker;
