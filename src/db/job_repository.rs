use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::debug;

use super::ledger::{JobLedger, JobRecord, LedgerError, allowed_sources};
use super::models::JobRecordRow;
use crate::book::{Job, JobId, JobState};

const SELECT_COLUMNS: &str =
    "job_id, state, order_snapshot, pages, artifact_path, error, created_at, updated_at";

/// Postgres-backed ledger over the `fulfillment_jobs` table
#[derive(Clone)]
pub struct PgJobLedger {
    pool: Pool<Postgres>,
}

impl PgJobLedger {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Reports why a guarded UPDATE touched no row
    async fn rejected_transition(&self, job_id: &JobId, to: JobState) -> LedgerError {
        match self.find(job_id).await {
            Ok(Some(record)) => LedgerError::InvalidTransition {
                job_id: job_id.clone(),
                from: record.state,
                to,
            },
            Ok(None) => LedgerError::NotFound(job_id.clone()),
            Err(e) => e,
        }
    }

    fn source_states(to: JobState) -> Vec<String> {
        allowed_sources(to).iter().map(|s| s.as_str().to_string()).collect()
    }
}

#[async_trait]
impl JobLedger for PgJobLedger {
    async fn record_queued(&self, job: &Job) -> Result<(), LedgerError> {
        debug!(job_id = %job.id, "Recording queued job");
        let snapshot = serde_json::to_string(job.order())?;

        let result = sqlx::query(
            r#"
            INSERT INTO fulfillment_jobs (job_id, state, order_snapshot, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (job_id) DO UPDATE
            SET state = EXCLUDED.state,
                order_snapshot = EXCLUDED.order_snapshot,
                pages = NULL,
                artifact_path = NULL,
                error = NULL,
                updated_at = EXCLUDED.updated_at
            WHERE fulfillment_jobs.state = ANY($5)
            "#,
        )
        .bind(job.id.as_str())
        .bind(JobState::Queued.as_str())
        .bind(snapshot)
        .bind(job.enqueued_at)
        .bind(vec![JobState::Completed.as_str().to_string(), JobState::Failed.as_str().to_string()])
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(match self.find(&job.id).await? {
                Some(record) => LedgerError::InProgress {
                    job_id: job.id.clone(),
                    state: record.state,
                },
                None => LedgerError::NotFound(job.id.clone()),
            });
        }
        Ok(())
    }

    async fn mark_running(&self, job_id: &JobId) -> Result<(), LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE fulfillment_jobs
            SET state = $2, updated_at = now()
            WHERE job_id = $1 AND state = ANY($3)
            "#,
        )
        .bind(job_id.as_str())
        .bind(JobState::Running.as_str())
        .bind(Self::source_states(JobState::Running))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.rejected_transition(job_id, JobState::Running).await);
        }
        Ok(())
    }

    async fn mark_completed(
        &self,
        job_id: &JobId,
        artifact: Option<&Path>,
        pages: u32,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE fulfillment_jobs
            SET state = $2, artifact_path = $3, pages = $4, updated_at = now()
            WHERE job_id = $1 AND state = ANY($5)
            "#,
        )
        .bind(job_id.as_str())
        .bind(JobState::Completed.as_str())
        .bind(artifact.map(|path| path.display().to_string()))
        .bind(i32::try_from(pages).unwrap_or(i32::MAX))
        .bind(Self::source_states(JobState::Completed))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.rejected_transition(job_id, JobState::Completed).await);
        }
        Ok(())
    }

    async fn mark_failed(&self, job_id: &JobId, reason: &str) -> Result<(), LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE fulfillment_jobs
            SET state = $2, error = $3, updated_at = now()
            WHERE job_id = $1 AND state = ANY($4)
            "#,
        )
        .bind(job_id.as_str())
        .bind(JobState::Failed.as_str())
        .bind(reason)
        .bind(Self::source_states(JobState::Failed))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.rejected_transition(job_id, JobState::Failed).await);
        }
        Ok(())
    }

    async fn find(&self, job_id: &JobId) -> Result<Option<JobRecord>, LedgerError> {
        let query = format!("SELECT {} FROM fulfillment_jobs WHERE job_id = $1", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, JobRecordRow>(&query)
            .bind(job_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(JobRecord::try_from).transpose()
    }

    async fn purge_older_than(&self, age: Duration) -> Result<u64, LedgerError> {
        let result = sqlx::query(
            r#"
            DELETE FROM fulfillment_jobs
            WHERE state IN ('completed', 'failed')
              AND updated_at <= now() - make_interval(secs => $1)
            "#,
        )
        .bind(age.as_secs_f64())
        .execute(&self.pool)
        .await?;

        debug!(removed = result.rows_affected(), "Purged finished job records");
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
