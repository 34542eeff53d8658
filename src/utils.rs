//! Utility functions for string manipulation and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - String truncation for logging proxy bodies
//! - Capitalisation and slugification for category titles and paths
//! - File system validation for output directories

use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a character boundary) with
/// an ellipsis and the number of dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
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

/// Convert a category or title to a URL- and path-friendly slug.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify("World News"), "world-news");
/// assert_eq!(slugify("../etc"), "etc");
/// ```
pub fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .replace(|c: char| !c.is_alphanumeric() && c != ' ' && c != '-', "")
        .trim()
        .replace(' ', "-")
}

/// Capitalize the first character of a string.
pub fn upcase(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
    }
}

/// Make sure the JSON output directory can be written before any feed is fetched.
///
/// # Arguments
///
/// * `path` - Output directory; created with its parents when missing
///
/// # Returns
///
/// An error when the path is not a directory or a marker file cannot be
/// written into it.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    let dir = Path::new(path);
    fs::create_dir_all(dir).await?;
    if !fs::metadata(dir).await?.is_dir() {
        error!("Output path is not a directory");
        return Err(format!("{path} is not a directory").into());
    }

    let marker = dir.join(".write-check");
    fs::write(&marker, b"ok").await?;
    fs::remove_file(&marker).await?;
    info!("Output directory is writable");
    Ok(())
}
