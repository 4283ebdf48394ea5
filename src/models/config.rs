//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP fetch behavior settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Scheduling and persistence settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Notification backend settings
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if self.fetch.max_retries == 0 {
            return Err(AppError::validation("fetch.max_retries must be > 0"));
        }
        if self.scheduler.max_concurrent == 0 {
            return Err(AppError::validation("scheduler.max_concurrent must be > 0"));
        }
        if self.scheduler.cache_file.trim().is_empty() {
            return Err(AppError::validation("scheduler.cache_file is empty"));
        }
        if self.notify.max_message_len == 0 {
            return Err(AppError::validation("notify.max_message_len must be > 0"));
        }
        if self.notify.backend == NotifyBackend::Webhook {
            match &self.notify.webhook_url {
                Some(webhook_url) => {
                    url::Url::parse(webhook_url)?;
                }
                None => {
                    return Err(AppError::validation(
                        "notify.webhook_url is required for the webhook backend",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// HTTP client and fetch retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum fetch attempts per check
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Base delay between retry attempts in milliseconds
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::max_retries(),
            retry_delay_ms: defaults::retry_delay(),
        }
    }
}

/// Scheduling and cache persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum concurrent checks
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Path to the snapshot cache file
    #[serde(default = "defaults::cache_file")]
    pub cache_file: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::max_concurrent(),
            cache_file: defaults::cache_file(),
        }
    }
}

/// Notification delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Which delivery backend to use
    #[serde(default)]
    pub backend: NotifyBackend,

    /// Endpoint for the webhook backend
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Maximum message body length in graphemes
    #[serde(default = "defaults::max_message_len")]
    pub max_message_len: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            backend: NotifyBackend::default(),
            webhook_url: None,
            max_message_len: defaults::max_message_len(),
        }
    }
}

/// Supported notification backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyBackend {
    /// Notifications disabled
    #[default]
    None,

    /// POST a JSON payload to a webhook endpoint
    Webhook,
}

mod defaults {
    // Fetch defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; sitewatch/1.0)".into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn retry_delay() -> u64 {
        5000
    }

    // Scheduler defaults
    pub fn max_concurrent() -> usize {
        5
    }
    pub fn cache_file() -> String {
        "watch_cache.json".into()
    }

    // Notify defaults
    pub fn max_message_len() -> usize {
        500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.fetch.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.scheduler.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_retries() {
        let mut config = Config::default();
        config.fetch.max_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_webhook_backend_requires_url() {
        let mut config = Config::default();
        config.notify.backend = NotifyBackend::Webhook;
        assert!(config.validate().is_err());

        config.notify.webhook_url = Some("not a url".to_string());
        assert!(config.validate().is_err());

        config.notify.webhook_url = Some("https://hooks.example.com/watch".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [fetch]
            max_retries = 5

            [notify]
            backend = "webhook"
            webhook_url = "https://hooks.example.com/watch"
            "#,
        )
        .unwrap();

        assert_eq!(config.fetch.max_retries, 5);
        assert_eq!(config.fetch.timeout_secs, 15);
        assert_eq!(config.scheduler.max_concurrent, 5);
        assert_eq!(config.notify.backend, NotifyBackend::Webhook);
        assert!(config.validate().is_ok());
    }
}
