use crate::book::{ArtStyle, Difficulty, Order};

const NO_TEXT_CLAUSE: &str =
    "CRITICAL: NO TEXT, NO WORDS, NO LETTERS, NO NUMBERS anywhere in the image - only pure illustration.";

const PRESERVE_LINEWORK_CLAUSE: &str = "Keep every existing line exactly where it is: do not add, remove or move any linework and do not change the composition. Fill the enclosed areas with flat, unshaded color only - no gradients, no shadows, no texture.";

/// Which kind of image the prompt asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    /// Fresh black and white outline page
    LineArt,
    /// Colored reference made from an existing line-art page
    Recolor,
}

fn style_description(style: ArtStyle) -> &'static str {
    match style {
        ArtStyle::Ghibli => "Studio Ghibli inspired, whimsical and magical",
        ArtStyle::Cartoon => "fun cartoon style with bold outlines",
        ArtStyle::Minimal => "minimalist clean line art style",
        ArtStyle::Comic => "comic book style with dynamic compositions",
        ArtStyle::Detailed => "highly detailed and intricate patterns",
        ArtStyle::Magical => "magical and fantastical with sparkles and stars",
    }
}

fn difficulty_description(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => "simple, large shapes with minimal details, perfect for young children",
        Difficulty::Medium => "moderate details with medium complexity, suitable for kids 6-10",
        Difficulty::Hard => "intricate details and complex patterns, challenging for older kids",
    }
}

fn theme_description(theme: &[String]) -> String {
    let tags: Vec<&str> = theme
        .iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .collect();

    if tags.is_empty() {
        "general".to_string()
    } else {
        tags.join(" and ")
    }
}

fn palette_clause(palette: &[String]) -> Option<String> {
    let colors: Vec<&str> = palette
        .iter()
        .map(|color| color.trim())
        .filter(|color| !color.is_empty())
        .collect();

    if colors.is_empty() {
        None
    } else {
        Some(format!("Use only these colors: {}.", colors.join(", ")))
    }
}

/// Builds the generation prompt for one page. Pure and total.
pub fn build(
    theme: &[String],
    style: ArtStyle,
    difficulty: Difficulty,
    variant: PromptVariant,
    palette: &[String],
) -> String {
    let subject = format!(
        "Theme: {}. Art style: {}. Complexity: {}.",
        theme_description(theme),
        style_description(style),
        difficulty_description(difficulty)
    );

    let mut sentences: Vec<String> = Vec::with_capacity(6);
    match variant {
        PromptVariant::LineArt => {
            sentences.push("Create a black and white coloring book page for children.".to_string());
            sentences.push(subject);
            sentences.push(
                "The image MUST be black line art only on a white background: clean closed outlines, no shading, no grayscale, no filled areas."
                    .to_string(),
            );
            sentences.push(
                "High contrast and child-friendly, perfect for coloring with crayons or markers."
                    .to_string(),
            );
        }
        PromptVariant::Recolor => {
            sentences.push(
                "Color this black and white coloring book page for children, turning it into a colored reference page."
                    .to_string(),
            );
            sentences.push(subject);
            sentences.push(PRESERVE_LINEWORK_CLAUSE.to_string());
            if let Some(clause) = palette_clause(palette) {
                sentences.push(clause);
            }
            sentences.push("Keep it vibrant, cheerful and child-friendly.".to_string());
        }
    }
    sentences.push(NO_TEXT_CLAUSE.to_string());

    sentences.join(" ")
}

/// Prompt for `variant` using the parameters of `order`
pub fn for_order(order: &Order, variant: PromptVariant) -> String {
    build(
        &order.theme,
        order.style,
        order.difficulty,
        variant,
        &order.palette,
    )
}

/// Shortened prompt for log lines
pub fn excerpt(prompt: &str) -> String {
    const MAX_VISIBLE_CHARS: usize = 80;

    let trimmed = prompt.trim();
    if trimmed.chars().count() <= MAX_VISIBLE_CHARS {
        return trimmed.to_string();
    }
    let visible: String = trimmed.chars().take(MAX_VISIBLE_CHARS).collect();
    format!("{}... ({} chars total)", visible, trimmed.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn themes() -> Vec<String> {
        vec!["Dinosaurs".to_string(), "Space".to_string()]
    }

    #[test]
    fn every_combination_mentions_the_theme_and_forbids_text() {
        let palette = vec!["red".to_string(), "teal".to_string()];
        for style in ArtStyle::ALL {
            for difficulty in Difficulty::ALL {
                for variant in [PromptVariant::LineArt, PromptVariant::Recolor] {
                    let prompt = build(&themes(), style, difficulty, variant, &palette);

                    assert!(!prompt.is_empty());
                    assert!(prompt.contains("Dinosaurs and Space"), "{prompt}");
                    assert!(prompt.contains(style_description(style)));
                    assert!(prompt.contains(difficulty_description(difficulty)));
                    assert!(prompt.contains("NO TEXT, NO WORDS, NO LETTERS, NO NUMBERS"));
                    assert!(!prompt.contains('{') && !prompt.contains('}'), "{prompt}");
                }
            }
        }
    }

    #[test]
    fn line_art_prompt_asks_for_uncolored_outlines() {
        let prompt = build(
            &themes(),
            ArtStyle::Cartoon,
            Difficulty::Easy,
            PromptVariant::LineArt,
            &["red".to_string()],
        );

        assert!(prompt.contains("black and white coloring book page"));
        assert!(prompt.contains("no shading"));
        assert!(!prompt.contains("Use only these colors"));
    }

    #[test]
    fn recolor_prompt_preserves_linework_and_embeds_palette() {
        let palette = vec!["sky blue".to_string(), " ".to_string(), "sunflower".to_string()];
        let prompt = build(
            &themes(),
            ArtStyle::Magical,
            Difficulty::Hard,
            PromptVariant::Recolor,
            &palette,
        );

        assert!(prompt.contains("Keep every existing line exactly where it is"));
        assert!(prompt.contains("flat, unshaded color"));
        assert!(prompt.contains("Use only these colors: sky blue, sunflower."));
    }

    #[test]
    fn recolor_prompt_without_palette_has_no_color_clause() {
        let prompt = build(
            &themes(),
            ArtStyle::Minimal,
            Difficulty::Medium,
            PromptVariant::Recolor,
            &[],
        );

        assert!(!prompt.contains("Use only these colors"));
        assert!(prompt.contains("flat, unshaded color"));
    }

    #[test]
    fn empty_theme_falls_back_to_general() {
        let prompt = build(
            &[],
            ArtStyle::default(),
            Difficulty::default(),
            PromptVariant::LineArt,
            &[],
        );

        assert!(prompt.contains("Theme: general."));
        assert!(prompt.contains("fun cartoon style with bold outlines"));
        assert!(prompt.contains("perfect for young children"));
    }

    #[test]
    fn excerpt_truncates_long_prompts() {
        let long = "a".repeat(200);
        let short = excerpt(&long);
        assert!(short.starts_with(&"a".repeat(80)));
        assert!(short.ends_with("(200 chars total)"));
        assert_eq!(excerpt("  short  "), "short");
    }
}
