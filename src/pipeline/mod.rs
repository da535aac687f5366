mod book_pipeline;

pub use book_pipeline::{BookPipeline, DEFAULT_BOOK_TITLE, PipelineSettings};

use crate::delivery::DeliveryError;
use crate::render::RenderError;
use crate::storage::ArtifactError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no page could be synthesized")]
    NoPages,
    #[error("page spooling failed: {0}")]
    Scratch(#[source] ArtifactError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("render task failed: {0}")]
    RenderTask(String),
    #[error("unexpected fault: {0}")]
    Panicked(String),
    #[error("no stored document: {0}")]
    MissingArtifact(#[source] ArtifactError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}
