// src/services/fetcher.rs

//! Resilient content fetching.
//!
//! Wraps a single HTTP GET in retry logic with exponential backoff.
//! Failures are classified so that errors which cannot succeed on retry
//! (missing pages, malformed URLs) give up immediately.

use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::error::Result;
use crate::models::FetchConfig;

/// Upper bound on the backoff delay between attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Result of one resilient fetch, after retries.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The page was retrieved
    Success { content: String, attempts: u32 },
    /// All attempts failed; `error` describes the last failure
    Failure { error: String, attempts: u32 },
}

/// How a single failed attempt should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureKind {
    /// Worth retrying (timeouts, connection errors, server errors)
    Transient,
    /// Retrying cannot help (404, malformed URL)
    Terminal,
}

/// One failed attempt, classified.
struct AttemptError {
    kind: FailureKind,
    message: String,
}

/// Service for fetching page content with retries.
pub struct ContentFetcher {
    client: Client,
    timeout_secs: u64,
    max_retries: u32,
    retry_delay: Duration,
}

impl ContentFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// Fetch `url`, retrying transient failures with exponential backoff.
    ///
    /// Never returns an error; unreachability is a normal outcome for a
    /// watcher, reported through [`FetchOutcome::Failure`].
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        if let Err(e) = url::Url::parse(url) {
            return FetchOutcome::Failure {
                error: format!("Invalid URL: {e}"),
                attempts: 0,
            };
        }

        let mut last_error = String::new();
        for attempt in 0..self.max_retries {
            match self.fetch_once(url).await {
                Ok(content) => {
                    return FetchOutcome::Success {
                        content,
                        attempts: attempt + 1,
                    };
                }
                Err(failure) => {
                    log::warn!(
                        "Attempt {}/{} failed for {}: {}",
                        attempt + 1,
                        self.max_retries,
                        url,
                        failure.message
                    );
                    last_error = failure.message;

                    if failure.kind == FailureKind::Terminal {
                        return FetchOutcome::Failure {
                            error: last_error,
                            attempts: attempt + 1,
                        };
                    }
                }
            }

            if attempt + 1 < self.max_retries {
                let delay = backoff_delay(self.retry_delay, attempt);
                log::info!("Waiting {:.1}s before retry...", delay.as_secs_f64());
                tokio::time::sleep(delay).await;
            }
        }

        FetchOutcome::Failure {
            error: last_error,
            attempts: self.max_retries,
        }
    }

    /// One GET attempt, with the failure classified for retry policy.
    async fn fetch_once(&self, url: &str) -> std::result::Result<String, AttemptError> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return Err(self.classify_request_error(&e)),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        response.text().await.map_err(|e| AttemptError {
            kind: FailureKind::Transient,
            message: format!("Failed to read response body: {e}"),
        })
    }

    fn classify_request_error(&self, error: &reqwest::Error) -> AttemptError {
        let message = if error.is_timeout() {
            format!("Request timed out after {}s", self.timeout_secs)
        } else if error.is_connect() {
            format!("Connection failed: {error}")
        } else {
            format!("Unexpected error: {error}")
        };

        AttemptError {
            kind: FailureKind::Transient,
            message,
        }
    }
}

fn classify_status(status: StatusCode) -> AttemptError {
    if status == StatusCode::NOT_FOUND {
        // A missing page stays missing; retrying only hammers the server.
        AttemptError {
            kind: FailureKind::Terminal,
            message: "Page not found (404)".to_string(),
        }
    } else {
        AttemptError {
            kind: FailureKind::Transient,
            message: format!("HTTP error: {status}"),
        }
    }
}

/// Exponential backoff: `base * 2^attempt`, capped at [`MAX_BACKOFF`].
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let multiplier = 2u32.saturating_pow(attempt);
    base.saturating_mul(multiplier).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> FetchConfig {
        FetchConfig {
            retry_delay_ms: 1,
            ..FetchConfig::default()
        }
    }

    #[tokio::test]
    async fn fetch_returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let fetcher = ContentFetcher::new(&test_config()).unwrap();
        match fetcher.fetch(&format!("{}/page", server.uri())).await {
            FetchOutcome::Success { content, attempts } => {
                assert_eq!(content, "hello");
                assert_eq!(attempts, 1);
            }
            FetchOutcome::Failure { error, .. } => panic!("unexpected failure: {error}"),
        }
    }

    #[tokio::test]
    async fn fetch_retries_transient_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;

        let fetcher = ContentFetcher::new(&test_config()).unwrap();
        match fetcher.fetch(&format!("{}/flaky", server.uri())).await {
            FetchOutcome::Success { content, attempts } => {
                assert_eq!(content, "recovered");
                assert_eq!(attempts, 3);
            }
            FetchOutcome::Failure { error, .. } => panic!("unexpected failure: {error}"),
        }
    }

    #[tokio::test]
    async fn fetch_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = ContentFetcher::new(&test_config()).unwrap();
        match fetcher.fetch(&format!("{}/down", server.uri())).await {
            FetchOutcome::Failure { error, attempts } => {
                assert_eq!(attempts, 3);
                assert!(error.contains("503"), "error was: {error}");
            }
            FetchOutcome::Success { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn fetch_does_not_retry_missing_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = ContentFetcher::new(&test_config()).unwrap();
        match fetcher.fetch(&format!("{}/gone", server.uri())).await {
            FetchOutcome::Failure { error, attempts } => {
                assert_eq!(attempts, 1);
                assert!(error.contains("404"), "error was: {error}");
            }
            FetchOutcome::Success { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn fetch_rejects_malformed_url_without_requesting() {
        let fetcher = ContentFetcher::new(&test_config()).unwrap();
        match fetcher.fetch("not a url at all").await {
            FetchOutcome::Failure { error, attempts } => {
                assert_eq!(attempts, 0);
                assert!(error.contains("Invalid URL"), "error was: {error}");
            }
            FetchOutcome::Success { .. } => panic!("expected failure"),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_secs(5);
        assert_eq!(backoff_delay(base, 0), Duration::from_secs(5));
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(10));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(20));
        assert_eq!(backoff_delay(base, 4), MAX_BACKOFF);
        assert_eq!(backoff_delay(base, 30), MAX_BACKOFF);
    }
}
