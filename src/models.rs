//! Data models for feed envelopes and normalized articles.
//!
//! This module defines the core data structures used throughout the application:
//! - [`FeedEnvelope`]: What a proxy hands back for one feed (`{ items, feed }`)
//! - [`RawItem`]: One feed item with every field optional
//! - [`Article`]: The normalized, markup-free representation of an item
//! - [`ArticlePage`]: One page of a category, as written to JSON
//!
//! Envelopes are read with optional-field access: anything missing or of an
//! unexpected type is treated as absent rather than as an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A normalized news article.
///
/// Articles are immutable once built by [`crate::normalize::parse_articles`].
/// `id`, `title`, and `image` are never empty and `description` never exceeds
/// 200 characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Stable id derived from the link.
    pub id: String,
    pub title: String,
    /// Plain-text description truncated to 200 characters.
    pub description: String,
    /// Plain-text description without truncation.
    pub full_description: String,
    pub link: String,
    /// Publication time; the fetch time when the feed did not provide one.
    pub pub_date: DateTime<Utc>,
    /// Category requested by the caller, not the feed's own categories.
    pub category: String,
    /// Image URL or the placeholder image.
    pub image: String,
    pub author: String,
    pub source: String,
    /// Up to 10 lowercase keywords in first-seen order.
    pub keywords: Vec<String>,
}

/// Feed-level metadata from the envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedInfo {
    pub title: Option<String>,
}

/// A single item as delivered by a proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub link: Option<String>,
    pub pub_date: Option<String>,
    pub author: Option<String>,
    pub thumbnail: Option<String>,
    pub enclosure_link: Option<String>,
    pub media_thumbnail: Option<String>,
}

/// The `{ items, feed }` envelope a proxy returns for one feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEnvelope {
    pub feed: FeedInfo,
    pub items: Vec<RawItem>,
}

impl FeedEnvelope {
    /// Read an envelope out of arbitrary JSON.
    ///
    /// Never fails: a missing `items` array yields zero items and a missing
    /// `feed` object yields an untitled feed.
    pub fn from_json(value: &Value) -> Self {
        let feed = FeedInfo {
            title: value.get("feed").and_then(|feed| string_field(feed, "title")),
        };
        let items = value
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(RawItem::from_json).collect())
            .unwrap_or_default();
        Self { feed, items }
    }
}

impl RawItem {
    pub fn from_json(value: &Value) -> Self {
        Self {
            title: string_field(value, "title"),
            description: string_field(value, "description"),
            content: string_field(value, "content"),
            link: string_field(value, "link"),
            pub_date: string_field(value, "pubDate"),
            author: string_field(value, "author"),
            thumbnail: string_field(value, "thumbnail"),
            enclosure_link: value
                .get("enclosure")
                .and_then(|enclosure| string_field(enclosure, "link")),
            media_thumbnail: value.get("media:thumbnail").and_then(|media| match media {
                Value::Array(entries) => entries.first().and_then(|m| string_field(m, "url")),
                other => string_field(other, "url"),
            }),
        }
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// One page of a category's merged articles.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePage<'a> {
    pub category: &'a str,
    pub page: usize,
    pub total_pages: usize,
    pub total_articles: usize,
    pub fetched_at: DateTime<Utc>,
    pub articles: &'a [Article],
}
