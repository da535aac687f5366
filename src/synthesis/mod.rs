mod google;

pub use google::{GoogleImageClient, GoogleImageSettings};

use async_trait::async_trait;

/// Access to the generative-image provider.
///
/// Each call is one network request with no retry. Implementations bound every
/// call with their own timeout; a hung call stalls the whole fulfillment queue.
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    /// Requests one portrait raster of black and white line art
    async fn synthesize_line_art(&self, prompt: &str) -> Result<Vec<u8>, SynthesisError>;

    /// Submits an existing raster with a coloring instruction and returns the first image part
    async fn recolor(&self, source: &[u8], instruction: &str) -> Result<Vec<u8>, SynthesisError>;
}

/// Every provider failure collapses to one kind: the caller can only skip the page
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("synthesis failed: {0}")]
    Failed(String),
}

impl SynthesisError {
    pub fn failed(reason: impl Into<String>) -> Self {
        SynthesisError::Failed(reason.into())
    }
}
