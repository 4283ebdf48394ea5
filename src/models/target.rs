// src/models/target.rs

//! Monitored target definitions and the targets file format.
//!
//! A targets file is a JSON array of `{"url": ..., "interval": ...}` objects,
//! with intervals in seconds.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A URL under watch, with its nominal check interval in seconds.
///
/// The effective interval between checks is randomized per cycle; `interval`
/// is the base the randomization is applied to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredTarget {
    /// URL to watch
    pub url: String,

    /// Nominal seconds between checks
    pub interval: u64,
}

impl MonitoredTarget {
    /// Create a target for a single URL.
    pub fn new(url: impl Into<String>, interval: u64) -> Self {
        Self {
            url: url.into(),
            interval,
        }
    }

    /// Load all targets from a JSON file.
    pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let targets: Vec<Self> = serde_json::from_str(&content).map_err(|e| {
            AppError::config(format!("Malformed targets file {}: {}", path.display(), e))
        })?;
        Self::validate_all(&targets)?;
        Ok(targets)
    }

    /// Validate that targets are usable.
    pub fn validate_all(targets: &[Self]) -> Result<()> {
        if targets.is_empty() {
            return Err(AppError::validation("No targets defined"));
        }
        let mut seen = HashSet::new();
        for target in targets {
            if target.url.trim().is_empty() {
                return Err(AppError::validation("Target URL is empty"));
            }
            if target.interval == 0 {
                return Err(AppError::validation(format!(
                    "Interval for {} must be > 0",
                    target.url
                )));
            }
            if !seen.insert(target.url.as_str()) {
                return Err(AppError::validation(format!(
                    "Duplicate target URL: {}",
                    target.url
                )));
            }
        }
        Ok(())
    }

    /// Write a sample targets file to edit and rerun with.
    pub fn write_sample(path: impl AsRef<Path>) -> Result<()> {
        let sample = vec![
            Self::new("https://example.com", 300),
            Self::new("https://example.org", 600),
        ];
        let json = serde_json::to_string_pretty(&sample)?;
        fs::write(path, json)?;
        Ok(())
    }
}
