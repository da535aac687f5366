use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::book::{ArtStyle, Difficulty, Edition, Order};

fn default_pages() -> u32 {
    24
}

/// Completed-purchase notification posted by the payment collaborator
#[derive(Deserialize, Serialize, Debug, Validate)]
#[validate(schema(function = "validate_colored_page_count", skip_on_field_errors = true))]
pub struct OrderRequest {
    #[validate(length(
        min = 1,
        max = 128,
        message = "order_id must be between 1 and 128 characters"
    ))]
    pub order_id: String,

    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(max = 10, message = "At most 10 theme tags may be chosen"))]
    pub theme: Vec<String>,

    /// Style label; unknown labels fall back to Cartoon
    #[serde(default)]
    pub style: Option<String>,

    /// Difficulty label; unknown labels fall back to Easy
    #[serde(default)]
    pub difficulty: Option<String>,

    #[serde(default = "default_pages")]
    #[validate(range(min = 1, max = 100, message = "pages must be between 1 and 100"))]
    pub pages: u32,

    #[serde(default)]
    pub edition: Edition,

    #[serde(default)]
    #[validate(length(max = 16, message = "At most 16 colors may be chosen"))]
    pub colors: Vec<String>,
}

fn validate_colored_page_count(request: &OrderRequest) -> Result<(), ValidationError> {
    if request.edition.is_colored() && request.pages < 2 {
        let mut error = ValidationError::new("colored_pages");
        error.message = Some("The colored edition needs at least 2 pages".into());
        return Err(error);
    }
    Ok(())
}

impl OrderRequest {
    /// Freezes the request into the immutable order snapshot
    pub fn into_order(self) -> Order {
        Order {
            reference: self.order_id.trim().to_string(),
            theme: self
                .theme
                .into_iter()
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect(),
            style: self.style.as_deref().map(ArtStyle::from_label).unwrap_or_default(),
            difficulty: self
                .difficulty
                .as_deref()
                .map(Difficulty::from_label)
                .unwrap_or_default(),
            total_pages: self.pages,
            edition: self.edition,
            palette: self
                .colors
                .into_iter()
                .map(|color| color.trim().to_string())
                .filter(|color| !color.is_empty())
                .collect(),
            recipient: self.email.trim().to_string(),
        }
    }
}
