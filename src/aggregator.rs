//! Feed aggregator: category → merged, sorted, cached articles.
//!
//! On a cache miss every feed configured for the category is fetched through
//! the [`FeedFetcher`] at once, the batch waits for all of them to settle, and
//! failed feeds are dropped. Surviving items are normalized, concatenated in
//! feed order, and stably sorted newest first.

use crate::cache::ArticleCache;
use crate::config::FeedRegistry;
use crate::gateway::FeedFetcher;
use crate::models::Article;
use crate::normalize::parse_articles;
use chrono::Utc;
use futures::future::join_all;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Articles per page.
pub const PAGE_SIZE: usize = 12;

#[derive(Debug)]
pub struct FeedAggregator<F> {
    fetcher: F,
    registry: FeedRegistry,
    cache: ArticleCache,
}

impl<F: FeedFetcher> FeedAggregator<F> {
    pub fn new(fetcher: F, registry: FeedRegistry, cache_timeout: Duration) -> Self {
        Self {
            fetcher,
            registry,
            cache: ArticleCache::new(cache_timeout),
        }
    }

    #[cfg(test)]
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// The category cache, exposed for manual invalidation.
    pub fn cache(&self) -> &ArticleCache {
        &self.cache
    }

    /// Merged articles for `category`, newest first.
    ///
    /// Unknown categories use the `all` feed list but keep their own cache key
    /// and article tag. Feeds that fail contribute nothing; if every feed
    /// fails the result is empty.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_category(&self, category: &str) -> Vec<Article> {
        if let Some(articles) = self.cache.get(category).await {
            info!(count = articles.len(), "Using cached data");
            return articles;
        }

        let feeds = self.registry.feeds_for(category);
        if !self.registry.contains(category) {
            debug!(feeds = feeds.len(), "Unknown category; using fallback feed list");
        }

        let t0 = Instant::now();
        let generation = self.cache.begin_batch();
        let results = join_all(feeds.iter().map(|feed| self.fetcher.fetch_feed(feed))).await;
        let fetched_at = Utc::now();

        let mut merged = Vec::new();
        let mut failed = 0usize;
        for (feed_url, result) in feeds.iter().zip(results) {
            match result {
                Some(envelope) => {
                    let articles = parse_articles(&envelope.items, category, &envelope.feed, fetched_at);
                    debug!(%feed_url, count = articles.len(), "Normalized feed items");
                    merged.extend(articles);
                }
                None => {
                    failed += 1;
                    warn!(%feed_url, "Feed contributed no articles");
                }
            }
        }

        sort_newest_first(&mut merged);

        if !self
            .cache
            .store(category, merged.clone(), generation, fetched_at)
            .await
        {
            info!(generation, "Superseded batch not cached");
        }

        info!(
            feeds = feeds.len(),
            failed,
            count = merged.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "Fetched category"
        );
        merged
    }
}

/// Stable sort by publication date, most recent first.
pub fn sort_newest_first(articles: &mut [Article]) {
    articles.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
}

/// The 1-indexed `page` of `articles`; empty when out of range.
pub fn get_paginated_articles(articles: &[Article], page: usize) -> &[Article] {
    let Some(start) = page.checked_sub(1).map(|p| p.saturating_mul(PAGE_SIZE)) else {
        return &[];
    };
    if start >= articles.len() {
        return &[];
    }
    let end = (start + PAGE_SIZE).min(articles.len());
    &articles[start..end]
}

/// Number of [`PAGE_SIZE`] pages needed for `articles`; zero when empty.
pub fn get_total_pages(articles: &[Article]) -> usize {
    articles.len().div_ceil(PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeedEnvelope, FeedInfo, RawItem};
    use chrono::{TimeZone, Utc};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;
    use tokio::sync::{Barrier, Notify};

    /// Serves canned envelopes and records every URL it is asked for.
    #[derive(Default)]
    struct ScriptedFetcher {
        feeds: HashMap<String, FeedEnvelope>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn with_feed(mut self, url: &str, title: &str, items: &[(&str, &str)]) -> Self {
            let items = items
                .iter()
                .map(|(link, date)| RawItem {
                    title: Some(format!("Story {link}")),
                    link: Some(format!("https://example.com/{link}")),
                    pub_date: Some(date.to_string()),
                    ..RawItem::default()
                })
                .collect();
            self.feeds.insert(
                url.to_string(),
                FeedEnvelope {
                    feed: FeedInfo {
                        title: Some(title.to_string()),
                    },
                    items,
                },
            );
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl FeedFetcher for ScriptedFetcher {
        async fn fetch_feed(&self, feed_url: &str) -> Option<FeedEnvelope> {
            self.calls.lock().unwrap().push(feed_url.to_string());
            tokio::task::yield_now().await;
            self.feeds.get(feed_url).cloned()
        }
    }

    /// Holds every fetch until the gate is opened.
    struct GatedFetcher {
        gate: Notify,
        inner: ScriptedFetcher,
    }

    impl GatedFetcher {
        fn new(inner: ScriptedFetcher) -> Self {
            Self {
                gate: Notify::new(),
                inner,
            }
        }
    }

    impl FeedFetcher for GatedFetcher {
        async fn fetch_feed(&self, feed_url: &str) -> Option<FeedEnvelope> {
            self.gate.notified().await;
            self.inner.fetch_feed(feed_url).await
        }
    }

    /// Releases fetches only once `n` of them are waiting at the same time.
    struct BarrierFetcher {
        barrier: Barrier,
        inner: ScriptedFetcher,
    }

    impl FeedFetcher for BarrierFetcher {
        async fn fetch_feed(&self, feed_url: &str) -> Option<FeedEnvelope> {
            self.barrier.wait().await;
            self.inner.fetch_feed(feed_url).await
        }
    }

    fn registry() -> FeedRegistry {
        let mut feeds = BTreeMap::new();
        feeds.insert("all".to_string(), vec!["https://feeds/all".to_string()]);
        feeds.insert(
            "technology".to_string(),
            vec!["https://feeds/a".to_string(), "https://feeds/b".to_string()],
        );
        feeds.insert(
            "sports".to_string(),
            vec!["https://feeds/espn".to_string(), "https://feeds/cnn".to_string()],
        );
        FeedRegistry::new(feeds).unwrap()
    }

    fn aggregator<F: FeedFetcher>(fetcher: F) -> FeedAggregator<F> {
        FeedAggregator::new(fetcher, registry(), Duration::from_secs(30 * 60))
    }

    fn articles(n: usize) -> Vec<Article> {
        (0..n)
            .map(|i| Article {
                id: format!("{i:016}"),
                title: format!("Story {i}"),
                description: String::new(),
                full_description: String::new(),
                link: format!("https://example.com/{i}"),
                pub_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                category: "all".to_string(),
                image: crate::normalize::PLACEHOLDER_IMAGE.to_string(),
                author: "Unknown".to_string(),
                source: "example.com".to_string(),
                keywords: vec![],
            })
            .collect()
    }

    #[tokio::test]
    async fn test_merges_feeds_newest_first() {
        let fetcher = ScriptedFetcher::default()
            .with_feed("https://feeds/a", "Feed A", &[("a1", "2024-01-01"), ("a3", "2024-01-03")])
            .with_feed("https://feeds/b", "Feed B", &[("b2", "2024-01-02")]);
        let aggregator = aggregator(fetcher);

        let result = aggregator.fetch_category("technology").await;
        let dates: Vec<String> = result
            .iter()
            .map(|a| a.pub_date.format("%m-%d").to_string())
            .collect();
        assert_eq!(dates, vec!["01-03", "01-02", "01-01"]);
        assert!(result.windows(2).all(|w| w[0].pub_date >= w[1].pub_date));
        assert!(result.iter().all(|a| a.category == "technology"));
        assert_eq!(result[0].source, "Feed A");
        assert_eq!(result[1].source, "Feed B");
        assert_eq!(aggregator.fetcher().calls().len(), 2);
    }

    #[tokio::test]
    async fn test_feeds_are_fetched_concurrently() {
        let fetcher = BarrierFetcher {
            barrier: Barrier::new(2),
            inner: ScriptedFetcher::default()
                .with_feed("https://feeds/espn", "ESPN", &[("e1", "2024-01-01")])
                .with_feed("https://feeds/cnn", "CNN", &[("c1", "2024-01-02")]),
        };
        let aggregator = aggregator(fetcher);

        // Neither fetch can finish until both have started.
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            aggregator.fetch_category("sports"),
        )
        .await
        .expect("feeds were fetched one after another");
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].source, "CNN");
    }

    #[tokio::test]
    async fn test_ties_keep_feed_then_item_order() {
        let fetcher = ScriptedFetcher::default()
            .with_feed("https://feeds/a", "Feed A", &[("a1", "2024-01-01"), ("a2", "2024-01-01")])
            .with_feed("https://feeds/b", "Feed B", &[("b1", "2024-01-01")]);
        let aggregator = aggregator(fetcher);

        let links: Vec<String> = aggregator
            .fetch_category("technology")
            .await
            .into_iter()
            .map(|a| a.link)
            .collect();
        assert_eq!(
            links,
            vec![
                "https://example.com/a1",
                "https://example.com/a2",
                "https://example.com/b1"
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_category_uses_all_feeds() {
        let fetcher = ScriptedFetcher::default().with_feed("https://feeds/all", "Wire", &[("w1", "2024-01-01")]);
        let aggregator = aggregator(fetcher);

        let result = aggregator.fetch_category("gardening").await;
        assert_eq!(aggregator.fetcher().calls(), vec!["https://feeds/all"]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].category, "gardening");
        assert!(aggregator.cache().entry("gardening").await.is_some());
    }

    #[tokio::test]
    async fn test_second_call_within_ttl_uses_cache() {
        let fetcher = ScriptedFetcher::default()
            .with_feed("https://feeds/a", "Feed A", &[("a1", "2024-01-01")])
            .with_feed("https://feeds/b", "Feed B", &[("b1", "2024-01-02")]);
        let aggregator = aggregator(fetcher);

        let first = aggregator.fetch_category("technology").await;
        let second = aggregator.fetch_category("technology").await;
        assert_eq!(first, second);
        assert_eq!(aggregator.fetcher().calls().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_forces_refetch() {
        let fetcher = ScriptedFetcher::default().with_feed("https://feeds/all", "Wire", &[("w1", "2024-01-01")]);
        let aggregator = aggregator(fetcher);

        aggregator.fetch_category("all").await;
        aggregator.cache().clear().await;
        let again = aggregator.fetch_category("all").await;
        assert_eq!(again.len(), 1);
        assert_eq!(aggregator.fetcher().calls().len(), 2);
    }

    #[tokio::test]
    async fn test_expired_cache_refetches() {
        let fetcher = ScriptedFetcher::default().with_feed("https://feeds/all", "Wire", &[("w1", "2024-01-01")]);
        let aggregator = FeedAggregator::new(fetcher, registry(), Duration::ZERO);

        aggregator.fetch_category("all").await;
        aggregator.fetch_category("all").await;
        assert_eq!(aggregator.fetcher().calls().len(), 2);
    }

    #[tokio::test]
    async fn test_all_feeds_failing_yields_empty_list() {
        let aggregator = aggregator(ScriptedFetcher::default());

        let result = aggregator.fetch_category("sports").await;
        assert!(result.is_empty());
        assert_eq!(
            aggregator.fetcher().calls(),
            vec!["https://feeds/espn", "https://feeds/cnn"]
        );
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_surviving_feeds() {
        let fetcher = ScriptedFetcher::default().with_feed("https://feeds/cnn", "CNN", &[("c1", "2024-01-05")]);
        let aggregator = aggregator(fetcher);

        let result = aggregator.fetch_category("sports").await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].source, "CNN");
    }

    #[tokio::test]
    async fn test_superseded_batch_is_not_cached() {
        let fetcher = GatedFetcher::new(
            ScriptedFetcher::default().with_feed("https://feeds/all", "Wire", &[("w1", "2024-01-01")]),
        );
        let aggregator = aggregator(fetcher);
        let newer = articles(3);

        let (late, stored) = tokio::join!(aggregator.fetch_category("all"), async {
            tokio::task::yield_now().await;
            let generation = aggregator.cache().begin_batch();
            let stored = aggregator
                .cache()
                .store("all", newer.clone(), generation, Utc::now())
                .await;
            aggregator.fetcher().gate.notify_one();
            stored
        });

        assert!(stored);
        assert_eq!(late.len(), 1);
        assert_eq!(aggregator.fetch_category("all").await, newer);
    }

    #[tokio::test]
    async fn test_batch_in_flight_during_clear_is_not_cached() {
        let fetcher = GatedFetcher::new(
            ScriptedFetcher::default().with_feed("https://feeds/all", "Wire", &[("w1", "2024-01-01")]),
        );
        let aggregator = aggregator(fetcher);

        let (result, ()) = tokio::join!(aggregator.fetch_category("all"), async {
            tokio::task::yield_now().await;
            aggregator.cache().clear().await;
            aggregator.fetcher().gate.notify_one();
        });

        assert_eq!(result.len(), 1);
        assert!(aggregator.cache().is_empty().await);
    }

    #[test]
    fn test_pagination_slices() {
        let all = articles(25);
        assert_eq!(get_paginated_articles(&all, 1).len(), 12);
        assert_eq!(get_paginated_articles(&all, 1)[0].title, "Story 0");
        assert_eq!(get_paginated_articles(&all, 2)[0].title, "Story 12");
        let last = get_paginated_articles(&all, 3);
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].title, "Story 24");
        assert!(get_paginated_articles(&all, 4).is_empty());
        assert!(get_paginated_articles(&all, 0).is_empty());
        assert!(get_paginated_articles(&all, usize::MAX).is_empty());
        assert!(get_paginated_articles(&[], 1).is_empty());
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(get_total_pages(&[]), 0);
        assert_eq!(get_total_pages(&articles(12)), 1);
        assert_eq!(get_total_pages(&articles(13)), 2);
        assert_eq!(get_total_pages(&articles(25)), 3);
    }
}
