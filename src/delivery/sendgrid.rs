use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use super::{Delivery, DeliveryError, DeliveryNotifier};

pub const SENDGRID_BASE_URL: &str = "https://api.sendgrid.com";
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Clone, Debug)]
pub struct SendGridSettings {
    pub api_key: String,
    pub from_email: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// SendGrid v3 `mail/send`
pub struct SendGridNotifier {
    client: Client,
    settings: SendGridSettings,
}

#[derive(Serialize)]
struct MailSend<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<MailAttachment<'a>>,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: &'static str,
    value: String,
}

#[derive(Serialize)]
struct MailAttachment<'a> {
    content: String,
    filename: &'a str,
    #[serde(rename = "type")]
    content_type: &'a str,
    disposition: &'static str,
}

impl SendGridNotifier {
    pub fn new(settings: SendGridSettings) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(format!("http client: {}", e)))?;

        Ok(Self { client, settings })
    }

    fn request_body<'a>(&'a self, delivery: &'a Delivery) -> Result<MailSend<'a>, DeliveryError> {
        Ok(MailSend {
            personalizations: vec![Personalization {
                to: vec![Address { email: &delivery.to }],
            }],
            from: Address {
                email: &self.settings.from_email,
            },
            subject: &delivery.subject,
            content: vec![Content {
                content_type: "text/html",
                value: delivery.html_body()?,
            }],
            attachments: delivery
                .attachment
                .iter()
                .map(|attachment| MailAttachment {
                    content: STANDARD.encode(&attachment.bytes),
                    filename: &attachment.filename,
                    content_type: attachment.content_type,
                    disposition: "attachment",
                })
                .collect(),
        })
    }
}

#[async_trait]
impl DeliveryNotifier for SendGridNotifier {
    async fn send(&self, delivery: &Delivery) -> Result<(), DeliveryError> {
        let url = format!("{}/v3/mail/send", self.settings.base_url.trim_end_matches('/'));
        debug!(to = %delivery.to, kind = ?delivery.kind, "Sending email via SendGrid");
        let body = self.request_body(delivery)?;

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        info!(to = %delivery.to, status = status.as_u16(), "Email accepted by SendGrid");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{ArtStyle, BookMetadata, Difficulty, Edition};
    use crate::delivery::{Attachment, DeliveryKind};
    use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
    use std::sync::{Arc, Mutex};

    fn delivery(attachment: Option<Attachment>) -> Delivery {
        Delivery {
            to: "parent@example.com".to_string(),
            subject: "Your custom coloring book is ready".to_string(),
            kind: DeliveryKind::BookReady,
            metadata: BookMetadata {
                edition: Edition::LineArtOnly,
                total_pages: 4,
                theme: "Ocean".to_string(),
                style: ArtStyle::Cartoon,
                difficulty: Difficulty::Easy,
            },
            attachment,
        }
    }

    fn notifier(base_url: String) -> SendGridNotifier {
        SendGridNotifier::new(SendGridSettings {
            api_key: "SG.test".to_string(),
            from_email: "books@example.com".to_string(),
            base_url,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    type Captured = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    async fn fake_sendgrid(status: u16) -> (String, Captured, actix_web::dev::ServerHandle) {
        let captured: Captured = Arc::default();
        let sink = captured.clone();
        let server = HttpServer::new(move || {
            let sink = sink.clone();
            App::new().route(
                "/v3/mail/send",
                web::post().to(move |req: HttpRequest, body: web::Json<serde_json::Value>| {
                    let sink = sink.clone();
                    async move {
                        let auth = req
                            .headers()
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        sink.lock().unwrap().push((auth, body.into_inner()));
                        HttpResponse::build(actix_web::http::StatusCode::from_u16(status).unwrap())
                            .body("{\"errors\":[{\"message\":\"bad sender\"}]}")
                    }
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
        (format!("http://{}", addr), captured, handle)
    }

    #[test]
    fn attachment_is_base64_encoded() {
        let notifier = notifier("http://unused".to_string());
        let delivery = delivery(Some(Attachment {
            filename: "coloring_book_x.pdf".to_string(),
            content_type: "application/pdf",
            bytes: b"%PDF".to_vec(),
        }));

        let body = serde_json::to_value(notifier.request_body(&delivery).unwrap()).unwrap();

        assert_eq!(body["attachments"][0]["content"], "JVBERg==");
        assert_eq!(body["attachments"][0]["type"], "application/pdf");
        assert_eq!(body["attachments"][0]["disposition"], "attachment");
        assert_eq!(body["personalizations"][0]["to"][0]["email"], "parent@example.com");
        assert_eq!(body["content"][0]["type"], "text/html");
    }

    #[test]
    fn confirmation_has_no_attachments_field() {
        let notifier = notifier("http://unused".to_string());

        let body = serde_json::to_value(notifier.request_body(&delivery(None)).unwrap()).unwrap();

        assert!(body.get("attachments").is_none());
    }

    #[actix_web::test]
    async fn accepted_mail_is_sent_with_bearer_key() {
        let (base_url, captured, handle) = fake_sendgrid(202).await;

        notifier(base_url).send(&delivery(None)).await.unwrap();

        let requests = captured.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0.as_deref(), Some("Bearer SG.test"));
        assert_eq!(requests[0].1["from"]["email"], "books@example.com");
        handle.stop(false).await;
    }

    #[actix_web::test]
    async fn rejected_mail_reports_status_and_body() {
        let (base_url, _captured, handle) = fake_sendgrid(403).await;

        let error = notifier(base_url).send(&delivery(None)).await.unwrap_err();

        match error {
            DeliveryError::Rejected { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("bad sender"));
            }
            other => panic!("unexpected error: {other}"),
        }
        handle.stop(false).await;
    }
}
