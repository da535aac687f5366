use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::book::{JobId, JobState};
use crate::db::JobRecord;
use crate::worker::QueueStatus;

/// Response for an accepted order
#[derive(Serialize)]
pub struct OrderAccepted {
    pub message: String,
    pub job_id: JobId,
    pub queue_position: usize,
}

/// Where the queue stands relative to one job
#[derive(Serialize)]
pub struct QueueHint {
    pub is_current: bool,
    pub queue_depth: usize,
}

/// Generation status of one order
#[derive(Serialize)]
pub struct OrderStatusResponse {
    pub job_id: JobId,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub document_available: bool,
    pub updated_at: DateTime<Utc>,
    pub queue: QueueHint,
}

impl OrderStatusResponse {
    pub fn new(record: JobRecord, queue: &QueueStatus) -> Self {
        let is_current = queue.current_job_id.as_ref() == Some(&record.job_id);
        Self {
            document_available: record.state == JobState::Completed && record.artifact.is_some(),
            job_id: record.job_id,
            state: record.state,
            pages: record.pages,
            error: record.error,
            updated_at: record.updated_at,
            queue: QueueHint {
                is_current,
                queue_depth: queue.queue_depth,
            },
        }
    }
}

/// Response for a successful redelivery
#[derive(Serialize)]
pub struct RedeliveryResponse {
    pub message: String,
    pub job_id: JobId,
}
