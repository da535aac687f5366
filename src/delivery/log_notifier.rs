use async_trait::async_trait;
use tracing::info;

use super::{Delivery, DeliveryError, DeliveryNotifier};

/// Development notifier: logs the message instead of sending it
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl DeliveryNotifier for LogNotifier {
    async fn send(&self, delivery: &Delivery) -> Result<(), DeliveryError> {
        info!(
            to = %delivery.to,
            subject = %delivery.subject,
            kind = ?delivery.kind,
            attachment = delivery.attachment.as_ref().map(|a| a.filename.as_str()),
            attachment_bytes = delivery.attachment.as_ref().map(|a| a.bytes.len()),
            "Email provider not configured, logging delivery instead of sending"
        );
        Ok(())
    }
}
