// src/pipeline/schedule.rs

//! Jittered multi-target scheduling.
//!
//! Each target has a nominal interval; the actual wait between checks is
//! re-randomized within ±20% every cycle so the polling cadence never
//! settles into a fixed pattern. Due targets are checked concurrently with
//! a bounded worker pool.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use rand::Rng;
use tokio::sync::{mpsc, watch};

use crate::models::MonitoredTarget;
use crate::pipeline::check::{CheckContext, CheckReport, run_check};

/// Fraction of the base interval used for randomization.
const JITTER_FACTOR: f64 = 0.2;

/// Minimum sleep between scheduler cycles.
const MIN_SLEEP_SECS: u64 = 1;

/// Progress events published by the scheduler for display layers.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A batch of due targets is about to be checked
    BatchStarted { count: usize },
    /// One check finished
    CheckCompleted { url: String, report: CheckReport },
    /// Nothing is due; sleeping until the next target comes up
    Sleeping { duration: Duration, next_url: String },
}

/// Final statistics for one target when watching stops.
#[derive(Debug, Clone)]
pub struct TargetSummary {
    pub url: String,
    pub check_count: u64,
    pub last_changed: Option<DateTime<Utc>>,
    pub unreachable: bool,
}

/// Per-target statistics reported after a watch run.
#[derive(Debug, Clone)]
pub struct WatchSummary {
    pub targets: Vec<TargetSummary>,
}

/// Draw this cycle's randomized interval for a base interval in seconds.
pub fn jittered_interval(base_secs: u64) -> u64 {
    let min = (base_secs as f64 * (1.0 - JITTER_FACTOR)) as u64;
    let max = (base_secs as f64 * (1.0 + JITTER_FACTOR)) as u64;
    rand::thread_rng().gen_range(min..=max)
}

/// Continuous watcher over a set of targets.
pub struct Scheduler {
    targets: Vec<MonitoredTarget>,
    ctx: CheckContext,
    max_concurrent: usize,
    events: Option<mpsc::UnboundedSender<SchedulerEvent>>,
}

impl Scheduler {
    pub fn new(targets: Vec<MonitoredTarget>, ctx: CheckContext, max_concurrent: usize) -> Self {
        Self {
            targets,
            ctx,
            max_concurrent: max_concurrent.max(1),
            events: None,
        }
    }

    /// Attach a channel that receives progress events.
    pub fn with_events(mut self, sender: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    fn emit(&self, event: SchedulerEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }

    /// Run until `shutdown` flips, then report per-target statistics.
    ///
    /// Every target is treated as due immediately on startup. Dueness is
    /// judged against the nominal interval; the sleep between cycles comes
    /// from a fresh jitter draw, and a target's last-checked time is set
    /// when its check completes rather than when it starts.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> WatchSummary {
        if self.targets.is_empty() {
            return self.summary().await;
        }

        let now = Utc::now();
        let mut last_checks: HashMap<String, DateTime<Utc>> = self
            .targets
            .iter()
            .map(|t| {
                let primed = now - chrono::Duration::seconds(t.interval as i64);
                (t.url.clone(), primed)
            })
            .collect();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let now = Utc::now();
            let due: Vec<String> = self
                .targets
                .iter()
                .filter(|t| (now - last_checks[&t.url]).num_seconds() >= t.interval as i64)
                .map(|t| t.url.clone())
                .collect();

            if !due.is_empty() {
                self.emit(SchedulerEvent::BatchStarted { count: due.len() });

                let ctx = &self.ctx;
                let mut checks = stream::iter(due)
                    .map(move |url| async move {
                        let report = run_check(ctx, &url).await;
                        (url, report)
                    })
                    .buffer_unordered(self.max_concurrent);

                while let Some((url, report)) = checks.next().await {
                    last_checks.insert(url.clone(), Utc::now());
                    self.emit(SchedulerEvent::CheckCompleted { url, report });
                }
            }

            // Fresh jitter draw each cycle keeps the cadence unpredictable.
            let now = Utc::now();
            let mut min_wait = f64::INFINITY;
            let mut next_url = String::new();
            for target in &self.targets {
                let jittered = jittered_interval(target.interval) as f64;
                let elapsed = (now - last_checks[&target.url]).num_milliseconds() as f64 / 1000.0;
                let wait = (jittered - elapsed).max(0.0);
                if wait < min_wait {
                    min_wait = wait;
                    next_url = target.url.clone();
                }
            }

            let duration = Duration::from_secs((min_wait as u64).max(MIN_SLEEP_SECS));
            self.emit(SchedulerEvent::Sleeping { duration, next_url });

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(duration) => {}
            }
        }

        self.summary().await
    }

    async fn summary(&self) -> WatchSummary {
        let state = self.ctx.state.lock().await;
        let targets = self
            .targets
            .iter()
            .map(|target| {
                let entry = state.store.entry(&target.url);
                TargetSummary {
                    url: target.url.clone(),
                    check_count: entry.map_or(0, |e| e.check_count),
                    last_changed: entry.and_then(|e| e.last_changed),
                    unreachable: state.tracker.is_unreachable(&target.url),
                }
            })
            .collect();

        WatchSummary { targets }
    }
}
