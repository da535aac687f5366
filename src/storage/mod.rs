mod artifacts;
mod scratch;

pub use artifacts::ArtifactStore;
pub use scratch::ScratchDir;

use std::path::{Path, PathBuf};

use crate::book::JobId;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("no stored document for job {0}")]
    NotFound(JobId),
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArtifactError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
