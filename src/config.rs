//! Runtime configuration: the feed registry, proxy rotation, and timing knobs.
//!
//! Configuration is read from an optional YAML file. Every field falls back to
//! the built-in defaults, so a file only needs the keys it wants to override:
//!
//! ```yaml
//! cache_timeout_secs: 600
//! proxies:
//!   - base: "https://api.rss2json.com/v1/api.json?rss_url="
//!     kind: json
//! feeds:
//!   all:
//!     - "https://feeds.bbci.co.uk/news/rss.xml"
//!   rust:
//!     - "https://blog.rust-lang.org/feed.xml"
//! ```
//!
//! The registry must always contain an `all` category; unknown categories fall
//! back to it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// Category every unknown category falls back to.
pub const FALLBACK_CATEGORY: &str = "all";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("feed registry has no `{FALLBACK_CATEGORY}` category")]
    MissingFallbackCategory,
    #[error("no proxy endpoints configured")]
    NoProxies,
}

/// How a proxy hands back the feed it fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    /// The proxy converts the feed into a `{ items, feed }` JSON envelope.
    Json,
    /// The proxy passes the feed XML through untouched.
    Raw,
}

/// One entry of the proxy rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    /// URL prefix; the URL-encoded feed URL is appended to it.
    pub base: String,
    pub kind: ProxyKind,
}

impl ProxyEndpoint {
    pub fn new(base: impl Into<String>, kind: ProxyKind) -> Self {
        Self {
            base: base.into(),
            kind,
        }
    }
}

/// Site metadata used by the SEO outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Auto News Aggregator".to_string(),
            url: "https://news.example.com/".to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Proxy rotation, tried round-robin on failure.
    pub proxies: Vec<ProxyEndpoint>,
    /// Category name → ordered feed URLs.
    pub feeds: BTreeMap<String, Vec<String>>,
    /// How long a category's merged articles stay valid.
    pub cache_timeout_secs: u64,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
    /// Failover attempts after the first request for a feed.
    pub retries: usize,
    /// Base delay between failover attempts; 0 fails over immediately.
    pub retry_base_delay_ms: u64,
    /// Period of the `--watch` refresh loop.
    pub refresh_interval_secs: u64,
    pub site: SiteConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proxies: vec![
                ProxyEndpoint::new(
                    "https://api.rss2json.com/v1/api.json?rss_url=",
                    ProxyKind::Json,
                ),
                ProxyEndpoint::new("https://api.allorigins.win/raw?url=", ProxyKind::Raw),
            ],
            feeds: default_feeds(),
            cache_timeout_secs: 1800,
            request_timeout_secs: 10,
            retries: 2,
            retry_base_delay_ms: 0,
            refresh_interval_secs: 1800,
            site: SiteConfig::default(),
        }
    }
}

impl Config {
    pub fn cache_timeout(&self) -> Duration {
        Duration::from_secs(self.cache_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Check the invariants the rest of the pipeline relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proxies.is_empty() {
            return Err(ConfigError::NoProxies);
        }
        if !self.feeds.contains_key(FALLBACK_CATEGORY) {
            return Err(ConfigError::MissingFallbackCategory);
        }
        Ok(())
    }
}

/// Load and validate a YAML config file.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let config = parse_config(&raw)?;
    info!(
        categories = config.feeds.len(),
        proxies = config.proxies.len(),
        "Loaded configuration"
    );
    Ok(config)
}

/// Parse and validate YAML config text.
pub fn parse_config(raw: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

/// Static category → feed list mapping, immutable once built.
#[derive(Debug, Clone)]
pub struct FeedRegistry {
    feeds: BTreeMap<String, Vec<String>>,
}

impl FeedRegistry {
    pub fn new(feeds: BTreeMap<String, Vec<String>>) -> Result<Self, ConfigError> {
        if !feeds.contains_key(FALLBACK_CATEGORY) {
            return Err(ConfigError::MissingFallbackCategory);
        }
        Ok(Self { feeds })
    }

    /// Feed URLs for `category`, or the `all` list when it is unknown.
    pub fn feeds_for(&self, category: &str) -> &[String] {
        self.feeds
            .get(category)
            .or_else(|| self.feeds.get(FALLBACK_CATEGORY))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, category: &str) -> bool {
        self.feeds.contains_key(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.feeds.keys().map(String::as_str)
    }
}

fn default_feeds() -> BTreeMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 8] = [
        (
            "technology",
            &[
                "https://techcrunch.com/feed/",
                "https://www.theverge.com/rss/index.xml",
                "https://www.wired.com/feed/rss",
            ],
        ),
        (
            "business",
            &[
                "https://feeds.bloomberg.com/markets/news.rss",
                "https://www.cnbc.com/id/100003114/device/rss/rss.html",
            ],
        ),
        (
            "entertainment",
            &[
                "https://variety.com/feed/",
                "https://www.hollywoodreporter.com/feed/",
            ],
        ),
        (
            "sports",
            &[
                "https://www.espn.com/espn/rss/news",
                "http://rss.cnn.com/rss/edition_sport.rss",
            ],
        ),
        (
            "health",
            &[
                "https://www.medicalnewstoday.com/rss",
                "https://rss.sciencedaily.com/health.xml",
            ],
        ),
        (
            "science",
            &[
                "https://www.sciencedaily.com/rss/all.xml",
                "https://www.scientificamerican.com/feed/",
            ],
        ),
        (
            "world",
            &[
                "http://feeds.bbci.co.uk/news/world/rss.xml",
                "http://rss.cnn.com/rss/edition_world.rss",
            ],
        ),
        (
            "all",
            &[
                "http://rss.cnn.com/rss/edition.rss",
                "http://feeds.bbci.co.uk/news/rss.xml",
                "https://rss.nytimes.com/services/xml/rss/nyt/HomePage.xml",
            ],
        ),
    ];

    table
        .into_iter()
        .map(|(category, urls)| {
            (
                category.to_string(),
                urls.iter().map(|u| u.to_string()).collect(),
            )
        })
        .collect()
}
