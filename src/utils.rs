//! Utility functions for text cleanup, string manipulation, and file system operations.
//!
//! This module provides helper functions used throughout the application:
//! - HTML-to-text conversion and whitespace normalization for scraped fields
//! - Summary and log truncation that respects UTF-8 character boundaries
//! - Slugification for per-source file names and Markdown anchors
//! - JSON error detection for handling LLM response truncation
//! - File system validation for output directories

use chrono::{NaiveDate, TimeDelta};
use scraper::Html;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Maximum length of an article summary, in characters.
pub const SUMMARY_MAX_CHARS: usize = 300;

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to at most `max` bytes (backing off to the
/// previous character boundary) with an ellipsis and byte count indicator
/// appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Clip a summary to [`SUMMARY_MAX_CHARS`] characters.
///
/// Longer text keeps its first `SUMMARY_MAX_CHARS - 3` characters followed
/// by `"..."`, so the result is never longer than the limit.
pub fn truncate_summary(text: &str) -> String {
    truncate_chars(text, SUMMARY_MAX_CHARS)
}

/// Clip `text` to `max` characters, ending in `"..."` when clipped.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Convert an HTML fragment to plain text.
///
/// Entities are decoded and tags dropped; text nodes are joined with
/// spaces and whitespace is normalized. Used for WordPress `rendered`
/// fields and RSS descriptions.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    normalize_whitespace(&text)
}

/// First day of a window covering the last `days` days before `today`.
///
/// Negative windows count as zero; windows reaching past the calendar's
/// range start at [`NaiveDate::MIN`].
pub fn window_start(today: NaiveDate, days: i64) -> NaiveDate {
    TimeDelta::try_days(days.max(0))
        .and_then(|span| today.checked_sub_signed(span))
        .unwrap_or(NaiveDate::MIN)
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When the LLM response is cut off (e.g., due to token limits), the
/// resulting JSON will fail to parse with an EOF error. This function
/// helps identify such cases for retry logic.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Convert a name to a URL- and filename-friendly slug.
///
/// Lowercases, keeps alphanumerics, and turns every other run of
/// characters into a single hyphen.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify("Kenya National Highways Authority"), "kenya-national-highways-authority");
/// assert_eq!(slugify("L'Economiste du Faso"), "l-economiste-du-faso");
/// ```
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Create `path` if needed and check that files can be written in it.
///
/// Stages call this before doing any work, so a read-only or mistyped
/// output directory fails the run up front instead of after scraping.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let marker = Path::new(path).join(".infra_news_write_check");
    stdfs::File::create(&marker)?;
    stdfs::remove_file(&marker)?;
    info!("Output directory is writable");
    Ok(())
}
