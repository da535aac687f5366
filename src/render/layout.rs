/// A4 in PDF points
pub const A4_WIDTH_PT: f32 = 595.28;
pub const A4_HEIGHT_PT: f32 = 841.89;
/// Half an inch on every side
pub const PAGE_MARGIN_PT: f32 = 36.0;
/// Baseline of the page-number stamp, inside the bottom margin
pub const PAGE_NUMBER_BASELINE_PT: f32 = 20.0;

/// Axis-aligned rectangle in PDF user space (origin bottom-left)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            width: A4_WIDTH_PT,
            height: A4_HEIGHT_PT,
            margin: PAGE_MARGIN_PT,
        }
    }
}

impl PageGeometry {
    pub fn full_page(&self) -> Rect {
        Rect {
            x: 0.0,
            y: 0.0,
            width: self.width,
            height: self.height,
        }
    }

    /// The page minus the margin on every side
    pub fn printable_area(&self) -> Rect {
        Rect {
            x: self.margin,
            y: self.margin,
            width: self.width - 2.0 * self.margin,
            height: self.height - 2.0 * self.margin,
        }
    }
}

/// Largest rectangle with the image's aspect ratio that fits `area`, centered in it.
///
/// The image is scaled up or down uniformly; it is never cropped or stretched.
pub fn fit_centered(image_width: u32, image_height: u32, area: Rect) -> Rect {
    let (w, h) = (image_width as f32, image_height as f32);
    let scale = (area.width / w).min(area.height / h);
    let width = w * scale;
    let height = h * scale;

    Rect {
        x: area.x + (area.width - width) / 2.0,
        y: area.y + (area.height - height) / 2.0,
        width,
        height,
    }
}

/// Rough Helvetica advance width; good enough for centering short labels
pub fn approx_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * 0.52
}
