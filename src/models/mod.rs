// src/models/mod.rs

//! Domain models for the watcher application.

mod config;
mod target;

// Re-export all public types
pub use config::{Config, FetchConfig, NotifyBackend, NotifyConfig, SchedulerConfig};
pub use target::MonitoredTarget;
