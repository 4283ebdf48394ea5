// src/services/detector.rs

//! Change detection for fetched content.
//!
//! Compares content hashes first; a full line diff is only rendered when
//! the hashes differ.

use sha2::{Digest, Sha256};
use similar::{ChangeTag, TextDiff};

use crate::storage::CacheEntry;

/// Message shown when a URL is seen for the first time.
pub const FIRST_CHECK_MESSAGE: &str =
    "First time checking this URL - no previous content to compare";

/// Diff placeholder when content differs without line-level changes.
const NO_LINE_DIFF_MESSAGE: &str = "Content changed but no line-by-line differences detected";

/// Result of comparing fetched content against the cached snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeReport {
    /// No snapshot existed for this URL
    FirstObservation,
    /// Content hash matches the snapshot
    Unchanged,
    /// Content differs; `diff` is a unified diff against the snapshot
    Changed { diff: String },
}

/// Hex-encoded sha256 of the content.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare fetched content against the previous snapshot, if any.
///
/// Pure over its inputs; persisting the new snapshot is the caller's job.
/// `hash` must be [`content_hash`] of `content`.
pub fn evaluate(
    url: &str,
    content: &str,
    hash: &str,
    previous: Option<&CacheEntry>,
) -> ChangeReport {
    let Some(previous) = previous else {
        return ChangeReport::FirstObservation;
    };

    if hash == previous.hash {
        return ChangeReport::Unchanged;
    }

    ChangeReport::Changed {
        diff: render_diff(url, &previous.content, content),
    }
}

/// Render a unified diff with URL-labelled headers.
fn render_diff(url: &str, old_content: &str, new_content: &str) -> String {
    let text_diff = TextDiff::from_lines(old_content, new_content);

    let has_line_changes = text_diff
        .iter_all_changes()
        .any(|change| change.tag() != ChangeTag::Equal);
    if !has_line_changes {
        return NO_LINE_DIFF_MESSAGE.to_string();
    }

    text_diff
        .unified_diff()
        .context_radius(3)
        .header(&format!("{url} (previous)"), &format!("{url} (current)"))
        .to_string()
}
