//! In-memory cache of merged articles, keyed by category.
//!
//! Entries are replaced wholesale and never mutated in place. An entry is
//! valid while `now - fetched_at < ttl`.
//!
//! Every fetch batch takes a generation number before it starts. When it
//! finishes, its result is stored only if no newer batch already stored an
//! entry for the same category and the cache was not cleared after the batch
//! began. Late results from superseded batches are dropped instead of
//! overwriting fresher data.

use crate::models::Article;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// A category's most recent merge result.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub articles: Vec<Article>,
    pub fetched_at: DateTime<Utc>,
    pub generation: u64,
}

impl CacheEntry {
    pub fn is_valid_at(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        now - self.fetched_at < ttl
    }
}

#[derive(Debug)]
pub struct ArticleCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: TimeDelta,
    last_generation: AtomicU64,
    cleared_through: AtomicU64,
}

impl ArticleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            last_generation: AtomicU64::new(0),
            cleared_through: AtomicU64::new(0),
        }
    }

    /// Articles for `category` if a valid entry exists right now.
    pub async fn get(&self, category: &str) -> Option<Vec<Article>> {
        self.get_at(category, Utc::now()).await
    }

    pub async fn get_at(&self, category: &str, now: DateTime<Utc>) -> Option<Vec<Article>> {
        let entries = self.entries.read().await;
        entries
            .get(category)
            .filter(|entry| entry.is_valid_at(now, self.ttl))
            .map(|entry| entry.articles.clone())
    }

    /// The stored entry for `category`, valid or not.
    pub async fn entry(&self, category: &str) -> Option<CacheEntry> {
        self.entries.read().await.get(category).cloned()
    }

    /// Reserve the generation number for a new fetch batch.
    pub fn begin_batch(&self) -> u64 {
        self.last_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Store a finished batch. Returns `false` when the batch was stale and
    /// its result was discarded.
    pub async fn store(
        &self,
        category: &str,
        articles: Vec<Article>,
        generation: u64,
        fetched_at: DateTime<Utc>,
    ) -> bool {
        let mut entries = self.entries.write().await;
        if generation <= self.cleared_through.load(Ordering::SeqCst) {
            debug!(category, generation, "Batch started before cache clear; discarding");
            return false;
        }
        if let Some(existing) = entries.get(category) {
            if existing.generation > generation {
                debug!(
                    category,
                    generation,
                    newer = existing.generation,
                    "Newer batch already stored; discarding"
                );
                return false;
            }
        }
        entries.insert(
            category.to_string(),
            CacheEntry {
                articles,
                fetched_at,
                generation,
            },
        );
        true
    }

    /// Drop every entry and invalidate batches still in flight.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
        self.cleared_through
            .store(self.last_generation.load(Ordering::SeqCst), Ordering::SeqCst);
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
