use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::ledger::{JobLedger, JobRecord, LedgerError, allowed_sources};
use crate::book::{Job, JobId, JobState};

/// Ledger kept in process memory, used when no database is configured
#[derive(Debug, Default)]
pub struct MemoryJobLedger {
    records: RwLock<HashMap<JobId, JobRecord>>,
}

impl MemoryJobLedger {
    pub fn new() -> Self {
        Self::default()
    }

    async fn transition(
        &self,
        job_id: &JobId,
        to: JobState,
        update: impl FnOnce(&mut JobRecord) + Send,
    ) -> Result<(), LedgerError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(job_id)
            .ok_or_else(|| LedgerError::NotFound(job_id.clone()))?;

        if !allowed_sources(to).contains(&record.state) {
            return Err(LedgerError::InvalidTransition {
                job_id: job_id.clone(),
                from: record.state,
                to,
            });
        }

        record.state = to;
        record.updated_at = Utc::now();
        update(record);
        Ok(())
    }
}

#[async_trait]
impl JobLedger for MemoryJobLedger {
    async fn record_queued(&self, job: &Job) -> Result<(), LedgerError> {
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(&job.id) {
            if !existing.state.is_terminal() {
                return Err(LedgerError::InProgress {
                    job_id: job.id.clone(),
                    state: existing.state,
                });
            }
        }
        records.insert(job.id.clone(), JobRecord::queued(job));
        Ok(())
    }

    async fn mark_running(&self, job_id: &JobId) -> Result<(), LedgerError> {
        self.transition(job_id, JobState::Running, |_| {}).await
    }

    async fn mark_completed(
        &self,
        job_id: &JobId,
        artifact: Option<&Path>,
        pages: u32,
    ) -> Result<(), LedgerError> {
        let artifact = artifact.map(|path| path.display().to_string());
        self.transition(job_id, JobState::Completed, move |record| {
            record.artifact = artifact;
            record.pages = Some(pages);
        })
        .await
    }

    async fn mark_failed(&self, job_id: &JobId, reason: &str) -> Result<(), LedgerError> {
        let reason = reason.to_string();
        self.transition(job_id, JobState::Failed, move |record| {
            record.error = Some(reason);
        })
        .await
    }

    async fn find(&self, job_id: &JobId) -> Result<Option<JobRecord>, LedgerError> {
        Ok(self.records.read().await.get(job_id).cloned())
    }

    async fn purge_older_than(&self, age: Duration) -> Result<u64, LedgerError> {
        let Some(cutoff) = chrono::Duration::from_std(age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !(record.state.is_terminal() && record.updated_at <= cutoff));
        Ok((before - records.len()) as u64)
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}
