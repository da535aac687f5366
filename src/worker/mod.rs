mod queue;

pub use queue::{DROPPED_AT_SHUTDOWN, Enqueued, FulfillmentQueue, QueueError};
pub(crate) use queue::panic_message;

use async_trait::async_trait;
use serde::Serialize;

use crate::book::{Document, Job, JobId};
use crate::pipeline::PipelineError;

/// Executes one job on behalf of the queue's consumer
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run_job(&self, job: &Job) -> Result<Document, PipelineError>;
}

/// Point-in-time view of the queue, read without locking
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    /// Jobs waiting behind the one being processed
    pub queue_depth: usize,
    pub is_processing: bool,
    pub current_job_id: Option<JobId>,
}
