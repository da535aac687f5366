//! Page layout: composites a cover and the generated rasters into one A4 PDF.
//!
//! Rendering is CPU-bound and synchronous; callers on the async runtime run it
//! through `spawn_blocking`.

mod layout;
mod pdf;

pub use layout::{PageGeometry, Rect};

use std::path::PathBuf;

use image::RgbImage;
use tracing::debug;

use crate::book::PageKind;
use layout::{PAGE_NUMBER_BASELINE_PT, fit_centered};
use pdf::{Font, PdfWriter, centered_text, draw_image, fill_rect};

const TITLE_BACKGROUND: (f32, f32, f32) = (0.91, 0.57, 0.78);
const WHITE: (f32, f32, f32) = (1.0, 1.0, 1.0);
const PAGE_NUMBER_GRAY: (f32, f32, f32) = (0.35, 0.35, 0.35);

/// Where a raster comes from: held in memory or spooled to disk
#[derive(Debug, Clone)]
pub enum ImageSource {
    Bytes(Vec<u8>),
    File(PathBuf),
}

impl ImageSource {
    fn load(&self) -> Result<RgbImage, String> {
        let decoded = match self {
            ImageSource::Bytes(bytes) => image::load_from_memory(bytes),
            ImageSource::File(path) => {
                let bytes = std::fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))?;
                image::load_from_memory(&bytes)
            }
        }
        .map_err(|e| e.to_string())?;

        let rgb = decoded.to_rgb8();
        if rgb.width() == 0 || rgb.height() == 0 {
            return Err("image has no pixels".to_string());
        }
        Ok(rgb)
    }
}

#[derive(Debug, Clone)]
pub struct RenderPage {
    pub kind: PageKind,
    pub source: ImageSource,
}

/// Fallback cover: solid panel with a centered title and a few summary lines
#[derive(Debug, Clone)]
pub struct TitlePanel {
    pub title: String,
    pub lines: Vec<String>,
    pub footer: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Cover {
    /// Pre-built cover drawn edge to edge
    Image(ImageSource),
    TitlePanel(TitlePanel),
}

/// Where one content page ended up in the document
#[derive(Debug, Clone, PartialEq)]
pub struct PagePlacement {
    /// 1-based running number stamped on the page
    pub number: usize,
    pub kind: PageKind,
    pub image: Rect,
}

#[derive(Debug)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub placements: Vec<PagePlacement>,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("render failed: page {page} is unreadable: {reason}")]
    UnreadablePage { page: usize, reason: String },
    #[error("render failed: cover image is unreadable: {0}")]
    UnreadableCover(String),
    #[error("render failed: pdf encoding: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, Default)]
pub struct PageRenderer {
    geometry: PageGeometry,
}

impl PageRenderer {
    pub fn new(geometry: PageGeometry) -> Self {
        Self { geometry }
    }

    /// Renders the cover followed by every page in input order.
    ///
    /// A single unreadable image aborts the whole document; nothing partial is returned.
    pub fn render(&self, cover: &Cover, pages: &[RenderPage]) -> Result<RenderedDocument, RenderError> {
        let mut writer = PdfWriter::new(self.geometry);
        self.render_cover(&mut writer, cover)?;

        let printable = self.geometry.printable_area();
        let mut placements = Vec::with_capacity(pages.len());
        for (position, page) in pages.iter().enumerate() {
            let number = position + 1;
            let raster = page
                .source
                .load()
                .map_err(|reason| RenderError::UnreadablePage { page: number, reason })?;

            let placed = fit_centered(raster.width(), raster.height(), printable);
            let image_id = writer.add_image(&raster);
            drop(raster);

            let mut operations = draw_image(placed);
            operations.extend(centered_text(
                &format!("Page {}", number),
                Font::Regular,
                10.0,
                PAGE_NUMBER_BASELINE_PT,
                self.geometry.width,
                PAGE_NUMBER_GRAY,
            ));
            writer.add_page(operations, Some(image_id))?;

            debug!(page = number, kind = page.kind.as_str(), "Page laid out");
            placements.push(PagePlacement {
                number,
                kind: page.kind,
                image: placed,
            });
        }

        debug!(pages = writer.page_count(), "Encoding document");
        let bytes = writer.finish()?;
        Ok(RenderedDocument { bytes, placements })
    }

    fn render_cover(&self, writer: &mut PdfWriter, cover: &Cover) -> Result<(), RenderError> {
        match cover {
            Cover::Image(source) => {
                let raster = source.load().map_err(RenderError::UnreadableCover)?;
                let image_id = writer.add_image(&raster);
                writer.add_page(draw_image(self.geometry.full_page()), Some(image_id))
            }
            Cover::TitlePanel(panel) => {
                let width = self.geometry.width;
                let top = self.geometry.height;

                let mut operations = fill_rect(self.geometry.full_page(), TITLE_BACKGROUND);
                operations.extend(centered_text(&panel.title, Font::Bold, 36.0, top - 150.0, width, WHITE));
                for (line_number, line) in panel.lines.iter().enumerate() {
                    let y = top - 200.0 - 50.0 * line_number as f32;
                    operations.extend(centered_text(line, Font::Regular, 18.0, y, width, WHITE));
                }
                if let Some(footer) = &panel.footer {
                    operations.extend(centered_text(footer, Font::Regular, 12.0, 100.0, width, WHITE));
                }
                writer.add_page(operations, None)
            }
        }
    }
}
