use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::ledger::{JobRecord, LedgerError};
use crate::book::{JobId, JobState, Order};

/// Database representation of a fulfillment job
#[derive(Debug, FromRow)]
pub struct JobRecordRow {
    pub job_id: String,
    pub state: String,
    /// JSON-encoded order snapshot
    pub order_snapshot: String,
    pub pages: Option<i32>,
    pub artifact_path: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JobRecordRow> for JobRecord {
    type Error = LedgerError;

    fn try_from(row: JobRecordRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| LedgerError::CorruptRow {
            job_id: row.job_id.clone(),
            reason,
        };

        let state: JobState = row.state.parse().map_err(corrupt)?;
        let order: Order = serde_json::from_str(&row.order_snapshot)
            .map_err(|e| corrupt(format!("order snapshot: {}", e)))?;
        let pages = row
            .pages
            .map(u32::try_from)
            .transpose()
            .map_err(|e| corrupt(format!("pages: {}", e)))?;

        Ok(JobRecord {
            job_id: JobId::from_order_reference(&row.job_id),
            state,
            order,
            pages,
            artifact: row.artifact_path,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
