use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    LineArt,
    Colored,
}

impl PageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageKind::LineArt => "line_art",
            PageKind::Colored => "colored",
        }
    }
}

/// One synthesized raster and its role in the book
#[derive(Debug)]
pub struct Page {
    /// 1-based position among the pages actually produced for its role
    pub index: u32,
    pub kind: PageKind,
    pub bytes: Vec<u8>,
}

impl Page {
    pub fn new(index: u32, kind: PageKind, bytes: Vec<u8>) -> Self {
        Self { index, kind, bytes }
    }

    pub fn file_name(&self) -> String {
        format!("page_{:03}_{}.img", self.index, self.kind.as_str())
    }
}
