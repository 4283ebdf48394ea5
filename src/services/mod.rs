//! Service layer for the watcher application.
//!
//! This module contains the business logic for:
//! - Resilient content fetching (`ContentFetcher`)
//! - Change detection and diff rendering (`detector`)
//! - Reachability tracking (`ReachabilityTracker`)

pub mod detector;
mod fetcher;
mod reachability;

pub use detector::{ChangeReport, content_hash, evaluate};
pub use fetcher::{ContentFetcher, FetchOutcome};
pub use reachability::{ReachabilityTracker, UnreachableRecord};
