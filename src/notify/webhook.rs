// src/notify/webhook.rs

//! Webhook notification backend.
//!
//! POSTs a small JSON payload to a configured endpoint. Any HTTP endpoint
//! that accepts `{"url", "subject", "message"}` works; chat-service
//! incoming webhooks are the usual target.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;
use crate::notify::NotificationGateway;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Gateway that delivers notifications to a webhook endpoint.
pub struct WebhookNotifier {
    client: Client,
    endpoint: String,
}

impl WebhookNotifier {
    /// Create a notifier for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl NotificationGateway for WebhookNotifier {
    fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }

    async fn send_notification(&self, url: &str, message: &str, subject: Option<&str>) -> bool {
        let payload = serde_json::json!({
            "url": url,
            "subject": subject,
            "message": message,
        });

        match self.client.post(&self.endpoint).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                log::debug!("Webhook accepted notification for {}", url);
                true
            }
            Ok(response) => {
                log::warn!(
                    "Webhook returned HTTP {} for {}",
                    response.status(),
                    url
                );
                false
            }
            Err(e) => {
                log::warn!("Webhook delivery failed for {}: {}", url, e);
                false
            }
        }
    }
}
