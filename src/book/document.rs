use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{ArtStyle, Difficulty, Edition, JobId, Order, PageKind};

/// Summary handed to the notifier alongside the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub edition: Edition,
    /// Advertised page count (the cover is not counted)
    pub total_pages: u32,
    pub theme: String,
    pub style: ArtStyle,
    pub difficulty: Difficulty,
}

impl BookMetadata {
    pub fn from_order(order: &Order) -> Self {
        Self {
            edition: order.edition,
            total_pages: order.total_pages,
            theme: order.theme_text(),
            style: order.style,
            difficulty: order.difficulty,
        }
    }
}

/// The assembled deliverable of one job
#[derive(Debug, Clone)]
pub struct Document {
    pub job_id: JobId,
    pub bytes: Vec<u8>,
    /// Roles of the content pages in render order, cover excluded
    pub pages: Vec<PageKind>,
    pub metadata: BookMetadata,
    /// Where the document was stored for download and redelivery
    pub artifact: Option<PathBuf>,
    pub delivered: bool,
}

impl Document {
    pub fn content_page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn file_name(&self) -> String {
        format!("coloring_book_{}.pdf", self.job_id.file_stem())
    }
}
