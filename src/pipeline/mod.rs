//! Pipeline entry points for watch operations.
//!
//! - `run_check`: One fetch/compare/persist/notify pass for a single URL
//! - `Scheduler`: Repeated checks across many targets with jittered
//!   intervals and bounded concurrency

pub mod check;
pub mod schedule;

pub use check::{CheckContext, CheckReport, WatchState, run_check};
pub use schedule::{Scheduler, SchedulerEvent, TargetSummary, WatchSummary, jittered_interval};
