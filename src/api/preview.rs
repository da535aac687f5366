//! Single-page preview for the storefront's customize step.
//!
//! Runs one line-art synthesis call directly, outside the fulfillment queue, with no retry.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, post, web};
use actix_web_validator::Json;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use validator::Validate;

use crate::api::validation::ErrorResponse;
use crate::book::{ArtStyle, Difficulty};
use crate::prompt::{self, PromptVariant};
use crate::synthesis::{ImageSynthesizer, SynthesisError};

#[derive(Deserialize, Debug, Validate)]
pub struct PreviewRequest {
    #[serde(default)]
    #[validate(length(max = 10, message = "At most 10 theme tags may be chosen"))]
    pub theme: Vec<String>,

    /// Style label; unknown labels fall back to Cartoon
    #[serde(default, alias = "style")]
    pub topic: Option<String>,

    /// Difficulty label; unknown labels fall back to Easy
    #[serde(default)]
    pub difficulty: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct PreviewResponse {
    pub success: bool,
    pub prompt: String,
    /// `data:` URI with the base64 raster
    pub image: String,
}

#[derive(Debug, thiserror::Error)]
#[error("preview generation failed: {0}")]
pub struct PreviewError(#[from] SynthesisError);

impl ResponseError for PreviewError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_GATEWAY
    }

    fn error_response(&self) -> HttpResponse {
        error!("{}", self);
        HttpResponse::build(self.status_code()).json(ErrorResponse::message(
            "Failed to generate image",
            "The image provider could not produce a preview",
        ))
    }
}

pub struct PreviewService {
    synthesizer: Arc<dyn ImageSynthesizer>,
}

impl PreviewService {
    pub fn new(synthesizer: Arc<dyn ImageSynthesizer>) -> Self {
        Self { synthesizer }
    }

    pub async fn generate(&self, request: PreviewRequest) -> Result<PreviewResponse, PreviewError> {
        let theme: Vec<String> = request
            .theme
            .iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        let style = request.topic.as_deref().map(ArtStyle::from_label).unwrap_or_default();
        let difficulty = request
            .difficulty
            .as_deref()
            .map(Difficulty::from_label)
            .unwrap_or_default();

        let prompt = prompt::build(&theme, style, difficulty, PromptVariant::LineArt, &[]);
        info!(prompt = %prompt::excerpt(&prompt), "Generating preview page");

        let bytes = self.synthesizer.synthesize_line_art(&prompt).await?;
        let mime_type = image::guess_format(&bytes)
            .map(|format| format.to_mime_type())
            .unwrap_or("image/png");

        Ok(PreviewResponse {
            success: true,
            prompt,
            image: format!("data:{};base64,{}", mime_type, STANDARD.encode(&bytes)),
        })
    }
}

#[post("/preview")]
async fn preview(
    service: web::Data<PreviewService>,
    request: Json<PreviewRequest>,
) -> Result<HttpResponse, PreviewError> {
    let response = service.generate(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub fn preview_config(config: &mut web::ServiceConfig) {
    config.service(preview);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::validation;
    use crate::testing::{FakeSynthesizer, png_fixture};
    use actix_web::{App, test};

    async fn call(synthesizer: Arc<FakeSynthesizer>, body: serde_json::Value) -> actix_web::dev::ServiceResponse {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(PreviewService::new(synthesizer)))
                .app_data(validation::json_config())
                .configure(preview_config),
        )
        .await;
        let request = test::TestRequest::post().uri("/preview").set_json(body).to_request();
        test::call_service(&app, request).await
    }

    #[actix_web::test]
    async fn returns_prompt_and_inline_image() {
        let synthesizer = Arc::new(FakeSynthesizer::new());

        let response = call(
            synthesizer.clone(),
            serde_json::json!({ "theme": ["Dinosaurs", "Space"], "topic": "Comic", "difficulty": "Hard" }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["success"], true);
        let prompt = body["prompt"].as_str().unwrap();
        assert!(prompt.contains("Dinosaurs and Space"));
        assert!(prompt.contains("comic book style"));
        let expected = format!("data:image/png;base64,{}", STANDARD.encode(png_fixture(11, 20)));
        assert_eq!(body["image"], expected);
        assert_eq!(synthesizer.line_art_calls(), 1);
        assert_eq!(synthesizer.recolor_calls(), 0);
    }

    #[actix_web::test]
    async fn provider_failure_is_a_bad_gateway_without_retry() {
        let synthesizer = Arc::new(FakeSynthesizer::always_failing());

        let response = call(synthesizer.clone(), serde_json::json!({ "theme": ["Ocean"] })).await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["error"], "Failed to generate image");
        assert_eq!(synthesizer.line_art_calls(), 1);
    }

    #[actix_web::test]
    async fn too_many_theme_tags_are_rejected() {
        let synthesizer = Arc::new(FakeSynthesizer::new());
        let theme: Vec<String> = (0..11).map(|i| format!("tag{}", i)).collect();

        let response = call(synthesizer.clone(), serde_json::json!({ "theme": theme })).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(synthesizer.line_art_calls(), 0);
    }
}
