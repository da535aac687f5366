use serde::{Deserialize, Serialize};

/// Which variant of the book the customer paid for
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Edition {
    /// Every page is black and white line art
    #[default]
    #[serde(alias = "blackwhite")]
    LineArtOnly,
    /// Half line art, each page followed by a recolored copy of itself
    #[serde(alias = "colored")]
    LineArtPlusColored,
}

impl Edition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Edition::LineArtOnly => "line_art_only",
            Edition::LineArtPlusColored => "line_art_plus_colored",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Edition::LineArtOnly => "Black & White",
            Edition::LineArtPlusColored => "Black & White + Colored",
        }
    }

    pub fn is_colored(&self) -> bool {
        matches!(self, Edition::LineArtPlusColored)
    }

    /// Number of line-art pages to synthesize for `total_pages` advertised pages.
    ///
    /// The colored edition rounds odd totals down: 2 * floor(N / 2) pages are delivered.
    pub fn line_art_count(&self, total_pages: u32) -> u32 {
        match self {
            Edition::LineArtOnly => total_pages,
            Edition::LineArtPlusColored => total_pages / 2,
        }
    }
}

/// Art style of the illustrations. Unknown labels fall back to `Cartoon`.
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum ArtStyle {
    Ghibli,
    #[default]
    Cartoon,
    Minimal,
    Comic,
    Detailed,
    Magical,
}

impl ArtStyle {
    pub const ALL: [ArtStyle; 6] = [
        ArtStyle::Ghibli,
        ArtStyle::Cartoon,
        ArtStyle::Minimal,
        ArtStyle::Comic,
        ArtStyle::Detailed,
        ArtStyle::Magical,
    ];

    pub fn from_label(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|style| style.label().eq_ignore_ascii_case(label.trim()))
            .unwrap_or_default()
    }

    pub fn label(&self) -> &'static str {
        match self {
            ArtStyle::Ghibli => "Ghibli",
            ArtStyle::Cartoon => "Cartoon",
            ArtStyle::Minimal => "Minimal",
            ArtStyle::Comic => "Comic",
            ArtStyle::Detailed => "Detailed",
            ArtStyle::Magical => "Magical",
        }
    }
}

/// Difficulty tier. Unknown labels fall back to `Easy`.
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn from_label(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|tier| tier.label().eq_ignore_ascii_case(label.trim()))
            .unwrap_or_default()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

/// Snapshot of the purchase parameters, frozen at order-completion time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Reference of the originating order (payment session id)
    pub reference: String,
    pub theme: Vec<String>,
    pub style: ArtStyle,
    pub difficulty: Difficulty,
    pub total_pages: u32,
    pub edition: Edition,
    /// Ordered color names, possibly empty
    pub palette: Vec<String>,
    pub recipient: String,
}

impl Order {
    /// Theme tags joined for display, `Custom` when none were chosen
    pub fn theme_text(&self) -> String {
        let tags: Vec<&str> = self
            .theme
            .iter()
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty())
            .collect();

        if tags.is_empty() {
            "Custom".to_string()
        } else {
            tags.join(", ")
        }
    }

    pub fn line_art_count(&self) -> u32 {
        self.edition.line_art_count(self.total_pages)
    }
}
