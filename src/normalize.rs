//! Normalization of raw feed items into [`Article`]s.
//!
//! Every item goes through the same steps:
//! - markup is stripped from title and description
//! - the description is truncated to [`DESCRIPTION_LIMIT`] characters
//! - an image is resolved (thumbnail, enclosure, media thumbnail, first
//!   `<img>` in the markup, then [`PLACEHOLDER_IMAGE`])
//! - author and source fall back through the feed title
//! - keywords are extracted from the title and full description
//!
//! Image discovery inside markup is a best-effort pattern match and will miss
//! images embedded in unusual markup.

use crate::models::{Article, FeedInfo, RawItem};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use sha2::{Digest, Sha256};
use url::Url;

/// Image used when an item carries no discoverable image.
pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/400x300/2563eb/ffffff?text=News";

/// Maximum characters kept in [`Article::description`].
pub const DESCRIPTION_LIMIT: usize = 200;

/// Maximum number of keywords per article.
pub const MAX_KEYWORDS: usize = 10;

/// Length of [`Article::id`].
pub const ID_LENGTH: usize = 16;

const STOP_WORDS: [&str; 13] = [
    "the", "is", "at", "which", "on", "a", "an", "and", "or", "but", "in", "with", "to",
];

static IMG_SRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<img[^>]+src="([^"]+)""#).expect("valid img regex"));

// `\w` is Unicode-aware here, so accented letters survive ("café" stays one keyword).
static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid punctuation regex"));

/// Convert a feed's raw items into articles tagged with `category`.
///
/// `fetched_at` stands in for items that carry no usable publication date.
pub fn parse_articles(
    items: &[RawItem],
    category: &str,
    feed: &FeedInfo,
    fetched_at: DateTime<Utc>,
) -> Vec<Article> {
    items
        .iter()
        .map(|item| parse_article(item, category, feed, fetched_at))
        .collect()
}

fn parse_article(
    item: &RawItem,
    category: &str,
    feed: &FeedInfo,
    fetched_at: DateTime<Utc>,
) -> Article {
    let title = non_empty(item.title.as_deref())
        .map(sanitize_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());
    let full_description = non_empty(item.description.as_deref())
        .or_else(|| non_empty(item.content.as_deref()))
        .map(sanitize_text)
        .unwrap_or_default();
    let description = truncate_chars(&full_description, DESCRIPTION_LIMIT);
    let link = item.link.as_deref().unwrap_or_default().trim().to_string();
    let feed_title = non_empty(feed.title.as_deref())
        .map(sanitize_text)
        .filter(|t| !t.is_empty());

    let author = non_empty(item.author.as_deref())
        .map(sanitize_text)
        .filter(|a| !a.is_empty())
        .or_else(|| feed_title.clone())
        .unwrap_or_else(|| "Unknown".to_string());
    let source = feed_title.unwrap_or_else(|| extract_domain(&link));

    let pub_date = item
        .pub_date
        .as_deref()
        .and_then(parse_pub_date)
        .unwrap_or(fetched_at);

    let keywords = extract_keywords(&format!("{title} {full_description}"));

    Article {
        id: generate_id(&link),
        title,
        description,
        full_description,
        image: extract_image(item),
        link,
        pub_date,
        category: category.to_string(),
        author,
        source,
        keywords,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Strip markup and decode entities, returning the visible text trimmed.
pub fn sanitize_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    fragment
        .root_element()
        .text()
        .collect::<String>()
        .trim()
        .to_string()
}

/// Stable 16-character id for a link: the leading hex digits of its SHA-256.
pub fn generate_id(link: &str) -> String {
    let digest = Sha256::digest(link.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(ID_LENGTH);
    id
}

/// Pick the first image the item offers, falling back to the placeholder.
pub fn extract_image(item: &RawItem) -> String {
    let attached = [&item.thumbnail, &item.enclosure_link, &item.media_thumbnail];
    if let Some(url) = attached.into_iter().find_map(|url| non_empty(url.as_deref())) {
        return url.trim().to_string();
    }

    let markup = non_empty(item.content.as_deref()).or_else(|| non_empty(item.description.as_deref()));
    if let Some(markup) = markup {
        if let Some(src) = IMG_SRC.captures(markup).and_then(|c| c.get(1)) {
            return src.as_str().trim().to_string();
        }
    }

    PLACEHOLDER_IMAGE.to_string()
}

/// Hostname of `link` without a leading `www.`, or `"News Source"`.
pub fn extract_domain(link: &str) -> String {
    Url::parse(link)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .filter(|host| !host.is_empty())
        .map(|host| host.strip_prefix("www.").unwrap_or(&host).to_string())
        .unwrap_or_else(|| "News Source".to_string())
}

/// Lowercase tokens longer than three characters, minus stop words,
/// deduplicated in first-seen order and capped at [`MAX_KEYWORDS`].
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, "");
    stripped
        .split_whitespace()
        .filter(|word| word.chars().count() > 3 && !STOP_WORDS.contains(word))
        .unique()
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

/// Parse the publication date formats feeds and proxies commonly emit.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
