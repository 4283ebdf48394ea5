// src/pipeline/check.rs

//! Single-URL check pipeline: fetch, compare, persist, notify.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::notify::{NotificationEvent, NotificationGateway, format_downtime};
use crate::services::detector::{self, ChangeReport};
use crate::services::{ContentFetcher, FetchOutcome, ReachabilityTracker};
use crate::storage::CacheStore;

/// Shared mutable watch state: the snapshot cache plus reachability records.
pub struct WatchState {
    pub store: CacheStore,
    pub tracker: ReachabilityTracker,
}

impl WatchState {
    pub fn new(store: CacheStore) -> Self {
        Self {
            store,
            tracker: ReachabilityTracker::new(),
        }
    }
}

/// Everything a check needs; shared by all concurrent checks.
pub struct CheckContext {
    pub fetcher: ContentFetcher,
    pub state: Arc<Mutex<WatchState>>,
    pub gateway: Arc<dyn NotificationGateway>,
    pub max_message_len: usize,
}

/// Outcome of one check cycle for a single URL.
#[derive(Debug, Clone)]
pub enum CheckReport {
    /// First successful check; snapshot stored, nothing to compare
    FirstSeen,
    /// Content matches the stored snapshot
    Unchanged,
    /// Content changed; `diff` describes how
    Changed { diff: String },
    /// Every fetch attempt failed
    Unreachable { error: String, attempts: u32 },
}

/// Run one full check cycle for `url`.
///
/// The fetch happens outside the state lock; the lock is then held across
/// the whole compare-mutate-persist sequence so concurrent checks of other
/// targets interleave safely. Notifications are sent after the lock is
/// released.
pub async fn run_check(ctx: &CheckContext, url: &str) -> CheckReport {
    let outcome = ctx.fetcher.fetch(url).await;
    let now = Utc::now();

    let mut events: Vec<NotificationEvent> = Vec::new();
    let report;
    {
        let mut state = ctx.state.lock().await;
        match outcome {
            FetchOutcome::Success { content, attempts } => {
                log::debug!(
                    "Fetched {} ({} bytes, {} attempt(s))",
                    url,
                    content.len(),
                    attempts
                );
                // End any outage before looking at the content.
                events.extend(state.tracker.record_success(url, now));

                let hash = detector::content_hash(&content);
                match detector::evaluate(url, &content, &hash, state.store.entry(url)) {
                    ChangeReport::FirstObservation => {
                        state.store.apply_check(url, &content, &hash, false, now);
                        report = CheckReport::FirstSeen;
                    }
                    ChangeReport::Unchanged => {
                        state.store.apply_check(url, &content, &hash, false, now);
                        report = CheckReport::Unchanged;
                    }
                    ChangeReport::Changed { diff } => {
                        log::info!("Content changed for {}", url);
                        state.store.apply_check(url, &content, &hash, true, now);
                        events.push(NotificationEvent::Changed {
                            url: url.to_string(),
                            diff: diff.clone(),
                        });
                        report = CheckReport::Changed { diff };
                    }
                }

                // Cache trouble must not stop the watch.
                if let Err(e) = state.store.save().await {
                    log::warn!("Could not persist cache after checking {}: {}", url, e);
                }
            }
            FetchOutcome::Failure { error, attempts } => {
                events.extend(state.tracker.record_failure(url, &error, now));
                report = CheckReport::Unreachable { error, attempts };
            }
        }
    }

    dispatch_events(ctx, &events).await;
    report
}

/// Announce events on the console, then deliver them when a gateway is
/// configured.
async fn dispatch_events(ctx: &CheckContext, events: &[NotificationEvent]) {
    for event in events {
        match event {
            NotificationEvent::Changed { .. } => {}
            NotificationEvent::Unreachable { url, error } => {
                log::warn!("🔴 ALERT: {} is unreachable: {}", url, error);
            }
            NotificationEvent::Recovered { url, downtime } => {
                log::info!(
                    "🟢 RECOVERED: {} is back (downtime: {})",
                    url,
                    format_downtime(*downtime)
                );
            }
        }
    }

    if !ctx.gateway.is_configured() {
        return;
    }

    for event in events {
        let message = event.message(Utc::now(), ctx.max_message_len);
        let sent = ctx
            .gateway
            .send_notification(event.url(), &message, event.subject())
            .await;
        if sent {
            log::info!("Notification sent for {}", event.url());
        } else {
            log::warn!("Notification delivery failed for {}", event.url());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FetchConfig;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Gateway that records every delivery for assertions.
    #[derive(Default)]
    struct RecordingGateway {
        sent: Mutex<Vec<(String, String, Option<String>)>>,
    }

    #[async_trait::async_trait]
    impl NotificationGateway for RecordingGateway {
        fn is_configured(&self) -> bool {
            true
        }

        async fn send_notification(
            &self,
            url: &str,
            message: &str,
            subject: Option<&str>,
        ) -> bool {
            self.sent.lock().await.push((
                url.to_string(),
                message.to_string(),
                subject.map(str::to_string),
            ));
            true
        }
    }

    fn test_context(tmp: &TempDir, gateway: Arc<dyn NotificationGateway>) -> CheckContext {
        let config = FetchConfig {
            max_retries: 2,
            retry_delay_ms: 1,
            ..FetchConfig::default()
        };
        CheckContext {
            fetcher: ContentFetcher::new(&config).unwrap(),
            state: Arc::new(Mutex::new(WatchState::new(CacheStore::empty(
                tmp.path().join("cache.json"),
            )))),
            gateway,
            max_message_len: 500,
        }
    }

    #[tokio::test]
    async fn first_then_unchanged_then_changed() {
        let server = MockServer::start().await;
        let gateway = Arc::new(RecordingGateway::default());
        let tmp = TempDir::new().unwrap();
        let ctx = test_context(&tmp, gateway.clone());
        let url = format!("{}/page", server.uri());

        let page_a = Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("headline A\nbody\n"))
            .up_to_n_times(2)
            .mount_as_scoped(&server)
            .await;

        assert!(matches!(run_check(&ctx, &url).await, CheckReport::FirstSeen));
        assert!(matches!(run_check(&ctx, &url).await, CheckReport::Unchanged));
        drop(page_a);

        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("headline B\nbody\n"))
            .mount(&server)
            .await;

        let report = run_check(&ctx, &url).await;
        let CheckReport::Changed { diff } = report else {
            panic!("expected a change, got {report:?}");
        };
        assert!(diff.contains("-headline A"), "{diff}");
        assert!(diff.contains("+headline B"), "{diff}");
        assert!(diff.contains(&format!("{url} (previous)")), "{diff}");

        // Only the change notified; the first two checks were silent.
        let sent = gateway.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("WEBSITE CHANGE DETECTED"));
        assert_eq!(sent[0].2, None);

        // State persisted with the new snapshot.
        let state = ctx.state.lock().await;
        let entry = state.store.entry(&url).unwrap();
        assert_eq!(entry.check_count, 3);
        assert!(entry.last_changed.is_some());
    }

    #[tokio::test]
    async fn outage_and_recovery_notify_once_each() {
        let server = MockServer::start().await;
        let gateway = Arc::new(RecordingGateway::default());
        let tmp = TempDir::new().unwrap();
        let ctx = test_context(&tmp, gateway.clone());
        let url = format!("{}/page", server.uri());

        let down = Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(503))
            .mount_as_scoped(&server)
            .await;

        for _ in 0..3 {
            let report = run_check(&ctx, &url).await;
            assert!(matches!(report, CheckReport::Unreachable { .. }));
        }
        drop(down);

        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("back"))
            .mount(&server)
            .await;

        assert!(matches!(run_check(&ctx, &url).await, CheckReport::FirstSeen));

        let sent = gateway.sent.lock().await;
        assert_eq!(sent.len(), 2, "one down alert and one recovery alert");
        assert_eq!(sent[0].2.as_deref(), Some("Site Down Alert"));
        assert!(sent[0].1.contains("SITE UNREACHABLE"));
        assert_eq!(sent[1].2.as_deref(), Some("Site Recovery Alert"));
        assert!(sent[1].1.contains("SITE RECOVERED"));

        let state = ctx.state.lock().await;
        assert!(!state.tracker.is_unreachable(&url));
    }

    #[tokio::test]
    async fn failed_checks_leave_the_cache_alone() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();
        let ctx = test_context(&tmp, Arc::new(crate::notify::NoopNotifier));
        let url = format!("{}/page", server.uri());

        let up = Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("v1"))
            .mount_as_scoped(&server)
            .await;
        run_check(&ctx, &url).await;
        drop(up);

        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        run_check(&ctx, &url).await;

        let state = ctx.state.lock().await;
        let entry = state.store.entry(&url).unwrap();
        assert_eq!(entry.check_count, 1);
        assert_eq!(entry.content, "v1");
    }

    #[tokio::test]
    async fn outage_transitions_happen_without_a_gateway() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();
        let ctx = test_context(&tmp, Arc::new(crate::notify::NoopNotifier));
        let url = format!("{}/page", server.uri());

        let down = Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(503))
            .mount_as_scoped(&server)
            .await;
        let report = run_check(&ctx, &url).await;
        assert!(matches!(report, CheckReport::Unreachable { .. }));
        {
            let state = ctx.state.lock().await;
            let record = state.tracker.record(&url).unwrap();
            assert!(record.notified);
        }
        drop(down);

        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("back"))
            .mount(&server)
            .await;
        run_check(&ctx, &url).await;

        let state = ctx.state.lock().await;
        assert!(!state.tracker.is_unreachable(&url));
    }

    #[tokio::test]
    async fn unconfigured_gateway_is_never_called() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();
        let ctx = test_context(&tmp, Arc::new(crate::notify::NoopNotifier));
        let url = format!("{}/page", server.uri());

        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let report = run_check(&ctx, &url).await;
        let CheckReport::Unreachable { attempts, .. } = report else {
            panic!("expected unreachable");
        };
        assert_eq!(attempts, 1);
    }
}
