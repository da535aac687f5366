use std::io;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use super::ArtifactError;
use crate::book::JobId;

/// Finished documents on disk, one file per job id
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, job_id: &JobId) -> PathBuf {
        self.root.join(format!("{}.pdf", job_id.file_stem()))
    }

    /// Writes to a temporary file first and renames it into place, so readers never see a partial PDF
    pub async fn save(&self, job_id: &JobId, bytes: &[u8]) -> Result<PathBuf, ArtifactError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| ArtifactError::io(&self.root, source))?;

        let target = self.path_for(job_id);
        let staging = target.with_extension("pdf.part");
        tokio::fs::write(&staging, bytes)
            .await
            .map_err(|source| ArtifactError::io(&staging, source))?;
        tokio::fs::rename(&staging, &target)
            .await
            .map_err(|source| ArtifactError::io(&target, source))?;

        info!(job_id = %job_id, path = %target.display(), bytes = bytes.len(), "Artifact stored");
        Ok(target)
    }

    pub async fn load(&self, job_id: &JobId) -> Result<Vec<u8>, ArtifactError> {
        let path = self.path_for(job_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ArtifactError::NotFound(job_id.clone())),
            Err(source) => Err(ArtifactError::io(&path, source)),
        }
    }

    /// Deletes stored PDFs last modified more than `max_age` ago and returns how many were removed
    pub async fn purge_older_than(&self, max_age: Duration) -> Result<usize, ArtifactError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(source) => return Err(ArtifactError::io(&self.root, source)),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| ArtifactError::io(&self.root, source))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("pdf") {
                continue;
            }

            let modified = match entry.metadata().await.and_then(|meta| meta.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping artifact without mtime");
                    continue;
                }
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age < max_age {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), age_secs = age.as_secs(), "Artifact purged");
                    removed += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to purge artifact"),
            }
        }

        Ok(removed)
    }
}
