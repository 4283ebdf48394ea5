// src/services/reachability.rs

//! Per-target reachability state machine.
//!
//! Each URL is either reachable or unreachable. Transitions produce at most
//! one notification event, so an outage alerts once no matter how many
//! checks fail while it lasts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::notify::NotificationEvent;

/// State kept for a target while it is unreachable.
#[derive(Debug, Clone)]
pub struct UnreachableRecord {
    /// When the outage was first observed
    pub first_failure: DateTime<Utc>,
    /// Most recent failure description
    pub last_error: String,
    /// Whether a down event has been emitted for this outage
    pub notified: bool,
}

/// Tracks which targets are currently unreachable.
#[derive(Debug, Default)]
pub struct ReachabilityTracker {
    down: HashMap<String, UnreachableRecord>,
}

impl ReachabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed check.
    ///
    /// Returns a down event exactly once per outage; repeat failures only
    /// refresh `last_error`.
    pub fn record_failure(
        &mut self,
        url: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> Option<NotificationEvent> {
        let record = self
            .down
            .entry(url.to_string())
            .or_insert_with(|| UnreachableRecord {
                first_failure: now,
                last_error: error.to_string(),
                notified: false,
            });
        record.last_error = error.to_string();

        if record.notified {
            return None;
        }
        record.notified = true;

        Some(NotificationEvent::Unreachable {
            url: url.to_string(),
            error: error.to_string(),
        })
    }

    /// Record a successful check.
    ///
    /// If the target was unreachable, the outage ends: its record is removed
    /// and a recovery event carrying the total downtime is returned.
    pub fn record_success(&mut self, url: &str, now: DateTime<Utc>) -> Option<NotificationEvent> {
        self.down
            .remove(url)
            .map(|record| NotificationEvent::Recovered {
                url: url.to_string(),
                downtime: now - record.first_failure,
            })
    }

    /// Whether the target is currently considered unreachable.
    pub fn is_unreachable(&self, url: &str) -> bool {
        self.down.contains_key(url)
    }

    /// The outage record for a target, if it is down.
    pub fn record(&self, url: &str) -> Option<&UnreachableRecord> {
        self.down.get(url)
    }
}
