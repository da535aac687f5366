use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

use super::RenderError;
use super::layout::{PageGeometry, Rect, approx_text_width};

pub(crate) const IMAGE_RESOURCE: &str = "Im0";

#[derive(Debug, Clone, Copy)]
pub(crate) enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(&self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// Minimal lopdf document builder: one optional image per page, Helvetica text
pub(crate) struct PdfWriter {
    doc: Document,
    geometry: PageGeometry,
    pages_id: ObjectId,
    fonts: Dictionary,
    page_ids: Vec<ObjectId>,
}

impl PdfWriter {
    pub(crate) fn new(geometry: PageGeometry) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
        });
        let fonts = dictionary! {
            Font::Regular.resource_name() => regular,
            Font::Bold.resource_name() => bold,
        };

        Self {
            doc,
            geometry,
            pages_id,
            fonts,
            page_ids: Vec::new(),
        }
    }

    pub(crate) fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Embeds an RGB raster as a compressed image XObject
    pub(crate) fn add_image(&mut self, image: &RgbImage) -> ObjectId {
        let (width, height) = image.dimensions();
        let mut stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8i64,
            },
            image.as_raw().clone(),
        );
        // Compressed right away so only one raw raster is alive at a time.
        let _ = stream.compress();
        self.doc.add_object(stream)
    }

    pub(crate) fn add_page(
        &mut self,
        operations: Vec<Operation>,
        image: Option<ObjectId>,
    ) -> Result<(), RenderError> {
        let encoded = Content { operations }
            .encode()
            .map_err(|e| RenderError::Encoding(e.to_string()))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));

        let mut xobjects = Dictionary::new();
        if let Some(image_id) = image {
            xobjects.set(IMAGE_RESOURCE, image_id);
        }
        let resources = dictionary! {
            "Font" => self.fonts.clone(),
            "XObject" => xobjects,
        };

        let media_box: Vec<Object> = vec![
            0.0f32.into(),
            0.0f32.into(),
            self.geometry.width.into(),
            self.geometry.height.into(),
        ];
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => media_box,
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.page_ids.push(page_id);
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Result<Vec<u8>, RenderError> {
        let count = self.page_ids.len() as i64;
        let kids: Vec<Object> = self.page_ids.iter().copied().map(Object::Reference).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();

        let mut bytes = Vec::new();
        self.doc
            .save_to(&mut bytes)
            .map_err(|e| RenderError::Encoding(e.to_string()))?;
        Ok(bytes)
    }
}

pub(crate) fn draw_image(rect: Rect) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                rect.width.into(),
                0.0f32.into(),
                0.0f32.into(),
                rect.height.into(),
                rect.x.into(),
                rect.y.into(),
            ],
        ),
        Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

pub(crate) fn fill_rect(rect: Rect, rgb: (f32, f32, f32)) -> Vec<Operation> {
    vec![
        Operation::new("rg", vec![rgb.0.into(), rgb.1.into(), rgb.2.into()]),
        Operation::new(
            "re",
            vec![
                rect.x.into(),
                rect.y.into(),
                rect.width.into(),
                rect.height.into(),
            ],
        ),
        Operation::new("f", vec![]),
    ]
}

/// Horizontally centered single line of text with its baseline at `y`
pub(crate) fn centered_text(
    text: &str,
    font: Font,
    size: f32,
    y: f32,
    page_width: f32,
    rgb: (f32, f32, f32),
) -> Vec<Operation> {
    let text = winansi_safe(text);
    let x = ((page_width - approx_text_width(&text, size)) / 2.0).max(0.0);

    vec![
        Operation::new("BT", vec![]),
        Operation::new("rg", vec![rgb.0.into(), rgb.1.into(), rgb.2.into()]),
        Operation::new(
            "Tf",
            vec![Object::Name(font.resource_name().as_bytes().to_vec()), size.into()],
        ),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

/// The standard Type1 fonts only cover printable ASCII reliably
fn winansi_safe(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_ascii_text_is_replaced() {
        assert_eq!(winansi_safe("Ours • Étoile"), "Ours ? ?toile");
        assert_eq!(winansi_safe("Page 12"), "Page 12");
    }

    #[test]
    fn empty_writer_produces_a_loadable_document() {
        let mut writer = PdfWriter::new(PageGeometry::default());
        writer
            .add_page(
                centered_text("Hello", Font::Bold, 24.0, 400.0, 595.28, (0.0, 0.0, 0.0)),
                None,
            )
            .unwrap();
        assert_eq!(writer.page_count(), 1);

        let bytes = writer.finish().unwrap();
        let loaded = Document::load_mem(&bytes).unwrap();
        assert_eq!(loaded.get_pages().len(), 1);
    }
}
