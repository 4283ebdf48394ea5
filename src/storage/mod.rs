//! Snapshot cache persistence.
//!
//! The cache is a single JSON object keyed by URL:
//!
//! ```text
//! {
//!   "https://example.com": {
//!     "content": "...",
//!     "hash": "sha256...",
//!     "last_checked": "2026-08-22T09:15:00Z",
//!     "last_changed": "2026-08-20T17:03:12Z",
//!     "check_count": 42
//!   }
//! }
//! ```
//!
//! A missing or unreadable cache file is a cold start, never an error.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// Cached snapshot of a monitored URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Full content of the last changed fetch
    pub content: String,

    /// Hex sha256 of `content`
    pub hash: String,

    /// When the URL was last successfully checked
    pub last_checked: DateTime<Utc>,

    /// When a change was last detected; absent until the first change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<DateTime<Utc>>,

    /// Number of successful checks
    #[serde(default)]
    pub check_count: u64,
}

/// File-backed store of snapshots for all monitored URLs.
#[derive(Debug)]
pub struct CacheStore {
    path: PathBuf,
    entries: HashMap<String, CacheEntry>,
}

impl CacheStore {
    /// Load the cache from `path`, starting empty when the file is missing
    /// or unreadable.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!(
                        "Cache file {} is not valid JSON: {}. Starting fresh.",
                        path.display(),
                        e
                    );
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                log::warn!(
                    "Could not read cache file {}: {}. Starting fresh.",
                    path.display(),
                    e
                );
                HashMap::new()
            }
        };

        Self { path, entries }
    }

    /// Create an empty store that will persist to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: HashMap::new(),
        }
    }

    /// Snapshot for a URL, if one exists.
    pub fn entry(&self, url: &str) -> Option<&CacheEntry> {
        self.entries.get(url)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Record a successful check for `url`.
    ///
    /// Always bumps `check_count` and `last_checked`; replaces the stored
    /// snapshot and stamps `last_changed` only when `changed` is set.
    pub fn apply_check(
        &mut self,
        url: &str,
        content: &str,
        hash: &str,
        changed: bool,
        now: DateTime<Utc>,
    ) {
        match self.entries.get_mut(url) {
            Some(entry) => {
                entry.check_count += 1;
                entry.last_checked = now;
                if changed {
                    entry.content = content.to_string();
                    entry.hash = hash.to_string();
                    entry.last_changed = Some(now);
                }
            }
            None => {
                self.entries.insert(
                    url.to_string(),
                    CacheEntry {
                        content: content.to_string(),
                        hash: hash.to_string(),
                        last_checked: now,
                        last_changed: None,
                        check_count: 1,
                    },
                );
            }
        }
    }

    /// Persist the cache atomically (write to temp, then rename).
    pub async fn save(&self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.entries)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
