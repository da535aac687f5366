mod document;
mod job;
mod order;
mod page;

pub use document::{BookMetadata, Document};
pub use job::{Job, JobId, JobState};
pub use order::{ArtStyle, Difficulty, Edition, Order};
pub use page::{Page, PageKind};
