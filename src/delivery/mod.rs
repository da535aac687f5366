mod log_notifier;
mod sendgrid;
pub mod templates;

pub use log_notifier::LogNotifier;
pub use sendgrid::{SENDGRID_BASE_URL, SendGridNotifier, SendGridSettings};

use async_trait::async_trait;

use crate::book::{BookMetadata, Document};

pub const CONFIRMATION_SUBJECT: &str = "Payment confirmed - your coloring book is being created";
pub const BOOK_READY_SUBJECT: &str = "Your custom coloring book is ready";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind {
    OrderConfirmation,
    BookReady,
}

#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// One outgoing message to a purchaser
#[derive(Debug, Clone)]
pub struct Delivery {
    pub to: String,
    pub subject: String,
    pub kind: DeliveryKind,
    pub metadata: BookMetadata,
    pub attachment: Option<Attachment>,
}

impl Delivery {
    pub fn order_confirmation(to: &str, metadata: BookMetadata) -> Self {
        Self {
            to: to.to_string(),
            subject: CONFIRMATION_SUBJECT.to_string(),
            kind: DeliveryKind::OrderConfirmation,
            metadata,
            attachment: None,
        }
    }

    pub fn book_ready(to: &str, document: &Document) -> Self {
        Self {
            to: to.to_string(),
            subject: BOOK_READY_SUBJECT.to_string(),
            kind: DeliveryKind::BookReady,
            metadata: document.metadata.clone(),
            attachment: Some(Attachment {
                filename: document.file_name(),
                content_type: "application/pdf",
                bytes: document.bytes.clone(),
            }),
        }
    }

    pub fn html_body(&self) -> Result<String, DeliveryError> {
        let rendered = match self.kind {
            DeliveryKind::OrderConfirmation => templates::order_confirmation(&self.metadata),
            DeliveryKind::BookReady => templates::book_ready(&self.metadata),
        };
        rendered.map_err(|e| DeliveryError::Template(e.to_string()))
    }
}

/// Outbound email. Failures are reported to the caller, never retried here.
#[async_trait]
pub trait DeliveryNotifier: Send + Sync {
    async fn send(&self, delivery: &Delivery) -> Result<(), DeliveryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("email body could not be rendered: {0}")]
    Template(String),
    #[error("delivery failed: {0}")]
    Transport(String),
    #[error("delivery rejected by provider: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}
