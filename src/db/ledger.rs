use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::book::{Job, JobId, JobState, Order};

/// Durable bookkeeping for fulfillment jobs
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub state: JobState,
    pub order: Order,
    /// Content pages actually rendered, set on completion
    pub pages: Option<u32>,
    pub artifact: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn queued(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            state: JobState::Queued,
            order: job.order().clone(),
            pages: None,
            artifact: None,
            error: None,
            created_at: job.enqueued_at,
            updated_at: job.enqueued_at,
        }
    }
}

/// Which states a transition into `to` may start from
pub(crate) fn allowed_sources(to: JobState) -> &'static [JobState] {
    match to {
        JobState::Queued => &[],
        JobState::Running => &[JobState::Queued],
        JobState::Completed => &[JobState::Running],
        JobState::Failed => &[JobState::Queued, JobState::Running],
    }
}

/// Persistence of job lifecycle records.
///
/// `record_queued` upserts: a resubmitted order whose previous run has finished
/// starts over from `queued`. While a run is still queued or running the upsert is
/// refused with `LedgerError::InProgress`, so two runs never share one record.
/// Every other transition happens at most once per submission.
#[async_trait]
pub trait JobLedger: Send + Sync {
    async fn record_queued(&self, job: &Job) -> Result<(), LedgerError>;

    async fn mark_running(&self, job_id: &JobId) -> Result<(), LedgerError>;

    async fn mark_completed(
        &self,
        job_id: &JobId,
        artifact: Option<&Path>,
        pages: u32,
    ) -> Result<(), LedgerError>;

    async fn mark_failed(&self, job_id: &JobId, reason: &str) -> Result<(), LedgerError>;

    async fn find(&self, job_id: &JobId) -> Result<Option<JobRecord>, LedgerError>;

    /// Removes finished records last updated more than `age` ago
    async fn purge_older_than(&self, age: Duration) -> Result<u64, LedgerError>;

    async fn ping(&self) -> Result<(), LedgerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("order snapshot encoding: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("unknown job {0}")]
    NotFound(JobId),
    #[error("job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: JobId,
        from: JobState,
        to: JobState,
    },
    #[error("job {job_id} is still {state}")]
    InProgress { job_id: JobId, state: JobState },
    #[error("corrupt ledger row for job {job_id}: {reason}")]
    CorruptRow { job_id: String, reason: String },
}
