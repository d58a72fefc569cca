//! Background worker driving the pipeline under a concurrency bound

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::config::ProcessingConfig;
use crate::error::Error;

use super::job_queue::{JobDelivery, JobQueue};
use super::pipeline::IngestPipeline;

/// Consumes deliveries and runs each through the pipeline.
///
/// At most `concurrency` jobs are in flight at any instant; stages within a
/// job run sequentially. Outcomes are reported to the queue, which owns
/// redelivery.
pub struct IngestWorker {
    pipeline: Arc<IngestPipeline>,
    queue: Arc<JobQueue>,
    concurrency: usize,
    job_timeout: Duration,
}

impl IngestWorker {
    /// Create a worker. `config` must already be validated (`concurrency`
    /// is a positive integer).
    pub fn new(
        pipeline: Arc<IngestPipeline>,
        queue: Arc<JobQueue>,
        config: &ProcessingConfig,
    ) -> Self {
        tracing::info!(
            concurrency = config.concurrency,
            timeout_secs = config.job_timeout_secs,
            "Worker configured"
        );
        Self {
            pipeline,
            queue,
            concurrency: config.concurrency,
            job_timeout: Duration::from_secs(config.job_timeout_secs),
        }
    }

    /// Process deliveries until the channel closes, then drain in-flight
    /// jobs.
    pub async fn run(self, mut receiver: mpsc::Receiver<JobDelivery>) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<()> = JoinSet::new();

        while let Some(delivery) = receiver.recv().await {
            // reap finished tasks so the set does not grow without bound
            while tasks.try_join_next().is_some() {}

            // the semaphore is never closed, acquire cannot fail
            let permit = Arc::clone(&semaphore).acquire_owned().await.unwrap();
            let pipeline = Arc::clone(&self.pipeline);
            let queue = Arc::clone(&self.queue);
            let job_timeout = self.job_timeout;

            tasks.spawn(async move {
                let job_id = delivery.id;
                queue.mark_processing(job_id);
                tracing::info!(job = %job_id, attempt = delivery.attempt, "Processing job");
                let started = Instant::now();

                match timeout(job_timeout, pipeline.run(&delivery)).await {
                    Ok(Ok(report)) => {
                        tracing::info!(
                            job = %job_id,
                            pages = report.pages,
                            chunks = report.chunks,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Ingestion finished"
                        );
                        queue.mark_complete(job_id);
                    }
                    Ok(Err(error)) => {
                        queue.mark_failed(job_id, &error);
                    }
                    Err(_) => {
                        let error = Error::JobTimeout(job_timeout.as_secs());
                        queue.mark_failed(job_id, &error);
                    }
                }

                drop(permit);
            });
        }

        while tasks.join_next().await.is_some() {}
        tracing::info!("Worker stopped");
    }
}
