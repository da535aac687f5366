use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use super::ArtifactError;
use crate::book::{JobId, Page};

/// Per-job directory for rasters waiting to be rendered.
///
/// Removed with everything in it when dropped, whether the job succeeded or not.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub async fn create(root: &Path, job_id: &JobId) -> Result<Self, ArtifactError> {
        let path = root.join(format!("{}-{}", job_id.file_stem(), Uuid::new_v4().simple()));
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| ArtifactError::io(&path, source))?;

        debug!(path = %path.display(), "Scratch directory created");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the page to disk and releases its bytes
    pub async fn spool(&self, page: Page) -> Result<PathBuf, ArtifactError> {
        let target = self.path.join(page.file_name());
        tokio::fs::write(&target, &page.bytes)
            .await
            .map_err(|source| ArtifactError::io(&target, source))?;
        Ok(target)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove scratch directory");
        }
    }
}
