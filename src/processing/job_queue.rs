//! In-process job queue with progress tracking
//!
//! This is the boundary object for the external broker: it delivers raw
//! payloads, receives acknowledgment or failure for each job, and owns
//! redelivery. The worker reports outcomes here and never retries on its
//! own.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Error;

/// A single delivery of a job payload to the worker
#[derive(Debug, Clone)]
pub struct JobDelivery {
    pub id: Uuid,
    pub payload: Vec<u8>,
    /// 1 on first delivery, incremented by `redeliver`
    pub attempt: u32,
}

/// Job status
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

/// Progress information for a job
#[derive(Debug, Clone, Serialize)]
pub struct JobProgress {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub attempt: u32,
    pub error: Option<String>,
    /// Whether the recorded failure is worth redelivering
    pub retryable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobProgress {
    fn new(job_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            status: JobStatus::Pending,
            attempt: 1,
            error: None,
            retryable: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub total_jobs: usize,
    pub pending: usize,
    pub processing: usize,
    pub complete: usize,
    pub failed: usize,
    /// Jobs submitted but not yet terminal
    pub depth: usize,
}

/// Job queue feeding the worker through a bounded channel
pub struct JobQueue {
    jobs: Arc<DashMap<Uuid, JobProgress>>,
    sender: Mutex<Option<mpsc::Sender<JobDelivery>>>,
    queue_size: Arc<AtomicUsize>,
}

impl JobQueue {
    /// Create a queue and the receiver the worker consumes from.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<JobDelivery>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let queue = Self {
            jobs: Arc::new(DashMap::new()),
            sender: Mutex::new(Some(sender)),
            queue_size: Arc::new(AtomicUsize::new(0)),
        };
        (queue, receiver)
    }

    /// Submit a job payload for processing.
    pub async fn submit(&self, payload: Vec<u8>) -> Uuid {
        let job_id = Uuid::new_v4();
        self.jobs.insert(job_id, JobProgress::new(job_id));
        self.queue_size.fetch_add(1, Ordering::SeqCst);

        self.send(JobDelivery {
            id: job_id,
            payload,
            attempt: 1,
        })
        .await;

        job_id
    }

    /// Deliver a previously failed job again, modelling the broker's retry.
    /// Returns the new attempt number.
    pub async fn redeliver(&self, job_id: Uuid, payload: Vec<u8>) -> u32 {
        let attempt = match self.jobs.get_mut(&job_id) {
            Some(mut progress) => {
                progress.attempt += 1;
                progress.status = JobStatus::Pending;
                progress.error = None;
                progress.retryable = false;
                progress.updated_at = Utc::now();
                progress.attempt
            }
            None => {
                self.jobs.insert(job_id, JobProgress::new(job_id));
                1
            }
        };
        self.queue_size.fetch_add(1, Ordering::SeqCst);

        self.send(JobDelivery {
            id: job_id,
            payload,
            attempt,
        })
        .await;

        attempt
    }

    async fn send(&self, delivery: JobDelivery) {
        let sender = self.sender.lock().clone();
        let job_id = delivery.id;
        match sender {
            Some(sender) => {
                if let Err(e) = sender.send(delivery).await {
                    tracing::error!(job = %job_id, error = %e, "Failed to enqueue job");
                    self.mark_failed(job_id, &Error::Internal("queue channel closed".into()));
                }
            }
            None => {
                tracing::error!(job = %job_id, "Queue is closed, rejecting job");
                self.mark_failed(job_id, &Error::Internal("queue is closed".into()));
            }
        }
    }

    /// Stop accepting jobs; the worker drains what was already delivered and
    /// then exits.
    pub fn close(&self) {
        self.sender.lock().take();
    }

    /// Record that the worker picked the job up
    pub fn mark_processing(&self, job_id: Uuid) {
        if let Some(mut progress) = self.jobs.get_mut(&job_id) {
            progress.status = JobStatus::Processing;
            progress.updated_at = Utc::now();
        }
    }

    /// Acknowledge successful completion
    pub fn mark_complete(&self, job_id: Uuid) {
        if let Some(mut progress) = self.jobs.get_mut(&job_id) {
            progress.status = JobStatus::Complete;
            progress.error = None;
            progress.updated_at = Utc::now();
            self.queue_size.fetch_sub(1, Ordering::SeqCst);
        }
        tracing::info!(job = %job_id, "Job completed");
    }

    /// Record a failure; the error is kept verbatim for the broker and
    /// classified as retryable or not.
    pub fn mark_failed(&self, job_id: Uuid, error: &Error) {
        let retryable = error.is_retryable();
        if let Some(mut progress) = self.jobs.get_mut(&job_id) {
            progress.status = JobStatus::Failed;
            progress.error = Some(error.to_string());
            progress.retryable = retryable;
            progress.updated_at = Utc::now();
            self.queue_size.fetch_sub(1, Ordering::SeqCst);
        }
        tracing::error!(job = %job_id, retryable, error = %error, "Job failed");
    }

    /// Get job progress
    pub fn progress(&self, job_id: Uuid) -> Option<JobProgress> {
        self.jobs.get(&job_id).map(|p| p.clone())
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total_jobs: self.jobs.len(),
            pending: 0,
            processing: 0,
            complete: 0,
            failed: 0,
            depth: self.queue_size.load(Ordering::SeqCst),
        };
        for entry in self.jobs.iter() {
            match entry.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Complete => stats.complete += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }
}
