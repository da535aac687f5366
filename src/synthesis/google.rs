use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ImageSynthesizer, SynthesisError};
use crate::prompt;

const MAX_ERROR_BODY_CHARS: usize = 300;

/// Connection settings for the Google Generative Language API
#[derive(Clone, Debug)]
pub struct GoogleImageSettings {
    pub api_key: String,
    pub base_url: String,
    /// Imagen model used for line art
    pub line_art_model: String,
    /// Gemini image model used for recoloring
    pub recolor_model: String,
    pub aspect_ratio: String,
    pub timeout: Duration,
}

/// Imagen `:predict` for line art, Gemini `:generateContent` for recoloring
pub struct GoogleImageClient {
    client: Client,
    settings: GoogleImageSettings,
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: Vec<PredictInstance<'a>>,
    parameters: PredictParameters<'a>,
}

#[derive(Serialize)]
struct PredictInstance<'a> {
    prompt: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters<'a> {
    sample_count: u32,
    aspect_ratio: &'a str,
    person_generation: &'a str,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    rai_filtered_reason: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(alias = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(rename = "inlineData", alias = "inline_data")]
    inline_data: Option<InlineData>,
}

impl GoogleImageClient {
    pub fn new(settings: GoogleImageSettings) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| SynthesisError::failed(format!("http client: {}", e)))?;

        Ok(Self { client, settings })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.settings.base_url.trim_end_matches('/'),
            model,
            method
        )
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<R, SynthesisError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.settings.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| SynthesisError::failed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(SynthesisError::failed(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| SynthesisError::failed(format!("invalid response: {}", e)))
    }
}

fn first_prediction(response: PredictResponse) -> Result<Vec<u8>, SynthesisError> {
    let mut filtered_reason = None;
    for prediction in response.predictions {
        if let Some(encoded) = prediction.bytes_base64_encoded {
            return STANDARD
                .decode(encoded)
                .map_err(|e| SynthesisError::failed(format!("image payload: {}", e)));
        }
        if filtered_reason.is_none() {
            filtered_reason = prediction.rai_filtered_reason;
        }
    }

    Err(SynthesisError::failed(match filtered_reason {
        Some(reason) => format!("image filtered by provider: {}", reason),
        None => "provider returned no images".to_string(),
    }))
}

fn first_inline_image(response: GenerateContentResponse) -> Result<Vec<u8>, SynthesisError> {
    let image = response
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .filter_map(|part| part.inline_data)
        .find(|data| data.mime_type.starts_with("image/"))
        .ok_or_else(|| SynthesisError::failed("response contained no image part"))?;

    STANDARD
        .decode(image.data)
        .map_err(|e| SynthesisError::failed(format!("image payload: {}", e)))
}

/// MIME type of a raster, guessed from its magic bytes; PNG when unknown
fn image_mime_type(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("image/png")
}

#[async_trait]
impl ImageSynthesizer for GoogleImageClient {
    async fn synthesize_line_art(&self, prompt_text: &str) -> Result<Vec<u8>, SynthesisError> {
        let url = self.model_url(&self.settings.line_art_model, "predict");
        let request = PredictRequest {
            instances: vec![PredictInstance { prompt: prompt_text }],
            parameters: PredictParameters {
                sample_count: 1,
                aspect_ratio: &self.settings.aspect_ratio,
                person_generation: "allow_adult",
            },
        };

        debug!(
            model = %self.settings.line_art_model,
            prompt = %prompt::excerpt(prompt_text),
            "Requesting line art"
        );

        let response: PredictResponse = self.post_json(&url, &request).await?;
        first_prediction(response)
    }

    async fn recolor(&self, source: &[u8], instruction: &str) -> Result<Vec<u8>, SynthesisError> {
        let url = self.model_url(&self.settings.recolor_model, "generateContent");
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text { text: instruction },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: image_mime_type(source).to_string(),
                            data: STANDARD.encode(source),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["TEXT", "IMAGE"],
            },
        };

        debug!(
            model = %self.settings.recolor_model,
            source_bytes = source.len(),
            prompt = %prompt::excerpt(instruction),
            "Requesting recolor"
        );

        let response: GenerateContentResponse = self.post_json(&url, &request).await?;
        first_inline_image(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, HttpServer, web};

    fn settings(base_url: String) -> GoogleImageSettings {
        GoogleImageSettings {
            api_key: "test-key".to_string(),
            base_url,
            line_art_model: "imagen-test".to_string(),
            recolor_model: "gemini-test".to_string(),
            aspect_ratio: "3:4".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    async fn fake_provider(status: u16, body: &'static str) -> (String, actix_web::dev::ServerHandle) {
        let server = HttpServer::new(move || {
            App::new().route(
                "/v1beta/models/{model_method}",
                web::post().to(move || async move {
                    HttpResponse::build(actix_web::http::StatusCode::from_u16(status).unwrap())
                        .content_type("application/json")
                        .body(body)
                }),
            )
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();

        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        (format!("http://{}", addr), handle)
    }

    #[test]
    fn prediction_bytes_are_decoded() {
        let response: PredictResponse = serde_json::from_str(
            r#"{"predictions":[{"bytesBase64Encoded":"aGVsbG8=","mimeType":"image/png"}]}"#,
        )
        .unwrap();

        assert_eq!(first_prediction(response).unwrap(), b"hello");
    }

    #[test]
    fn filtered_prediction_is_a_synthesis_failure() {
        let response: PredictResponse = serde_json::from_str(
            r#"{"predictions":[{"raiFilteredReason":"blocked by safety filter"}]}"#,
        )
        .unwrap();

        let error = first_prediction(response).unwrap_err();
        assert!(error.to_string().contains("blocked by safety filter"));
    }

    #[test]
    fn empty_predictions_are_a_synthesis_failure() {
        let response: PredictResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(first_prediction(response), Err(SynthesisError::Failed(_))));
    }

    #[test]
    fn first_inline_image_part_is_extracted() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[
                {"text":"Here is your page"},
                {"inlineData":{"mimeType":"image/png","data":"Zmlyc3Q="}},
                {"inlineData":{"mimeType":"image/png","data":"c2Vjb25k"}}
            ]}}]}"#,
        )
        .unwrap();

        assert_eq!(first_inline_image(response).unwrap(), b"first");
    }

    #[test]
    fn text_only_response_is_a_synthesis_failure() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"I cannot do that"}]}}]}"#,
        )
        .unwrap();

        assert!(first_inline_image(response).is_err());
    }

    #[test]
    fn mime_type_is_guessed_from_the_raster() {
        assert_eq!(image_mime_type(&crate::testing::png_fixture(4, 4)), "image/png");
        assert_eq!(image_mime_type(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]), "image/jpeg");
        assert_eq!(image_mime_type(b"not an image"), "image/png");
    }

    #[actix_web::test]
    async fn line_art_request_returns_decoded_image() {
        let (base_url, handle) =
            fake_provider(200, r#"{"predictions":[{"bytesBase64Encoded":"cG5n"}]}"#).await;
        let client = GoogleImageClient::new(settings(base_url)).unwrap();

        let bytes = client.synthesize_line_art("a friendly dragon").await.unwrap();

        assert_eq!(bytes, b"png");
        handle.stop(false).await;
    }

    #[actix_web::test]
    async fn provider_error_status_is_a_synthesis_failure() {
        let (base_url, handle) =
            fake_provider(429, r#"{"error":{"message":"quota exceeded"}}"#).await;
        let client = GoogleImageClient::new(settings(base_url)).unwrap();

        let error = client.recolor(b"\x89PNG", "color it").await.unwrap_err();

        assert!(error.to_string().contains("429"));
        assert!(error.to_string().contains("quota exceeded"));
        handle.stop(false).await;
    }
}
