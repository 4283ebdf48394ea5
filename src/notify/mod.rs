// src/notify/mod.rs

//! Notification dispatch.
//!
//! Delivery backends live behind [`NotificationGateway`]; the pipeline only
//! ever sees that trait. Delivery failure is reported by return value and
//! never interrupts watching.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::Result;
use crate::models::{NotifyBackend, NotifyConfig};

mod webhook;

pub use webhook::WebhookNotifier;

/// Timestamp format used in notification bodies.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Something worth telling an external channel about.
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    /// Content changed; `diff` describes the change
    Changed { url: String, diff: String },
    /// All fetch attempts failed for a previously reachable target
    Unreachable { url: String, error: String },
    /// A previously unreachable target answered again
    Recovered {
        url: String,
        downtime: chrono::Duration,
    },
}

impl NotificationEvent {
    /// The URL the event concerns.
    pub fn url(&self) -> &str {
        match self {
            Self::Changed { url, .. }
            | Self::Unreachable { url, .. }
            | Self::Recovered { url, .. } => url,
        }
    }

    /// Subject line for the event, where one applies.
    pub fn subject(&self) -> Option<&'static str> {
        match self {
            Self::Changed { .. } => None,
            Self::Unreachable { .. } => Some("Site Down Alert"),
            Self::Recovered { .. } => Some("Site Recovery Alert"),
        }
    }

    /// Build the message body, truncating embedded diffs to `max_len`
    /// graphemes.
    pub fn message(&self, now: DateTime<Utc>, max_len: usize) -> String {
        let time = now.format(TIME_FORMAT);
        match self {
            Self::Changed { diff, .. } => {
                let mut body = format!("WEBSITE CHANGE DETECTED\nTime: {time}\n");
                if diff.trim().is_empty() {
                    body.push_str("Content changes detected.");
                } else {
                    body.push_str("Changes:\n");
                    body.push_str(&truncate_message(diff, max_len));
                }
                body
            }
            Self::Unreachable { url, error } => {
                format!("🔴 SITE UNREACHABLE\n\nURL: {url}\nError: {error}\nTime: {time}")
            }
            Self::Recovered { url, downtime } => {
                format!(
                    "🟢 SITE RECOVERED\n\nURL: {url}\nDowntime: {}\nTime: {time}",
                    format_downtime(*downtime)
                )
            }
        }
    }
}

/// Delivery channel for watch notifications.
///
/// Implementations must be callable from concurrent checks and report
/// failure through the return value rather than panicking.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Whether the gateway has everything it needs to deliver.
    fn is_configured(&self) -> bool;

    /// Deliver a message about `url`. Returns true on success.
    async fn send_notification(&self, url: &str, message: &str, subject: Option<&str>) -> bool;
}

/// Gateway that drops everything; used when notifications are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl NotificationGateway for NoopNotifier {
    fn is_configured(&self) -> bool {
        false
    }

    async fn send_notification(&self, _url: &str, _message: &str, _subject: Option<&str>) -> bool {
        false
    }
}

/// Build the gateway selected by the configuration.
pub fn build_gateway(config: &NotifyConfig) -> Result<Arc<dyn NotificationGateway>> {
    match config.backend {
        NotifyBackend::None => Ok(Arc::new(NoopNotifier)),
        NotifyBackend::Webhook => match &config.webhook_url {
            Some(webhook_url) => Ok(Arc::new(WebhookNotifier::new(webhook_url.clone())?)),
            None => {
                log::warn!("Webhook backend selected but notify.webhook_url is unset");
                Ok(Arc::new(NoopNotifier))
            }
        },
    }
}

/// Truncate `text` to at most `max_graphemes`, marking the cut.
///
/// Counts grapheme clusters rather than bytes so multi-byte content is
/// never split mid-character.
pub fn truncate_message(text: &str, max_graphemes: usize) -> String {
    if text.graphemes(true).count() <= max_graphemes {
        return text.to_string();
    }

    let truncated: String = text.graphemes(true).take(max_graphemes).collect();
    format!("{truncated}...\n[truncated]")
}

/// Format a downtime span as `H:MM:SS`.
pub fn format_downtime(downtime: chrono::Duration) -> String {
    let total = downtime.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}
