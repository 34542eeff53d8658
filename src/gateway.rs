//! Proxy gateway: fetches one feed through a rotation of third-party proxies.
//!
//! The proxies do the actual cross-origin fetch and (for JSON proxies) the
//! RSS → JSON conversion. Each request is built as
//! `<proxy base><url-encoded feed url>`.
//!
//! # Retry Strategy
//!
//! - First attempt goes to the currently selected proxy
//! - On transport error, non-success status, or an undecodable body the
//!   gateway advances the rotation (round-robin, wrapping) and retries, up to
//!   the retry budget
//! - An exhausted budget yields `None`, a soft per-feed failure
//! - Optional backoff between attempts:
//!   `min(base * 2^(attempt-1), 5s) + jitter(0..=250ms)`; a zero base fails
//!   over immediately
//!
//! The rotation index belongs to the gateway and is shared by every fetch it
//! performs, so a proxy that failed for one feed stays deselected for the
//! next one.

use crate::config::{Config, ProxyEndpoint, ProxyKind};
use crate::models::FeedEnvelope;
use crate::rss::{parse_feed_xml, RssError};
use crate::utils::truncate_for_log;
use rand::{rng, Rng};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Anything that can turn a feed URL into an envelope.
///
/// `None` means the feed could not be fetched; callers treat it as that feed
/// contributing zero articles.
pub trait FeedFetcher {
    async fn fetch_feed(&self, feed_url: &str) -> Option<FeedEnvelope>;
}

/// Why a single proxy attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
    #[error("invalid json envelope: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid feed xml: {0}")]
    Xml(#[from] RssError),
    #[error("no proxy endpoints configured")]
    NoProxies,
}

/// Fetches feeds through a rotating list of proxies.
pub struct ProxyGateway {
    client: reqwest::Client,
    proxies: Vec<ProxyEndpoint>,
    current: AtomicUsize,
    retries: usize,
    retry_base_delay: Duration,
}

impl fmt::Debug for ProxyGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyGateway")
            .field("proxies", &self.proxies)
            .field("current", &self.current_index())
            .field("retries", &self.retries)
            .field("retry_base_delay", &self.retry_base_delay)
            .finish()
    }
}

impl ProxyGateway {
    /// Create a gateway over `proxies`.
    ///
    /// # Arguments
    ///
    /// * `proxies` - Rotation order; the first entry is tried first
    /// * `timeout` - Per-request timeout
    /// * `retries` - Failover attempts after the first request
    /// * `retry_base_delay` - Backoff base; zero disables backoff
    pub fn new(
        proxies: Vec<ProxyEndpoint>,
        timeout: Duration,
        retries: usize,
        retry_base_delay: Duration,
    ) -> Result<Self, GatewayError> {
        if proxies.is_empty() {
            return Err(GatewayError::NoProxies);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            proxies,
            current: AtomicUsize::new(0),
            retries,
            retry_base_delay,
        })
    }

    /// Build the gateway from the proxy rotation and timing knobs in `config`.
    ///
    /// # Returns
    ///
    /// [`GatewayError::NoProxies`] when `config.proxies` is empty, or the
    /// client build error.
    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        Self::new(
            config.proxies.clone(),
            config.request_timeout(),
            config.retries,
            config.retry_base_delay(),
        )
    }

    /// Position of the selected proxy in the rotation.
    pub fn current_index(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// The proxy the next request goes through.
    pub fn current_proxy(&self) -> &ProxyEndpoint {
        &self.proxies[self.current_index() % self.proxies.len()]
    }

    /// Advance the rotation to the next proxy, wrapping around.
    pub fn switch_proxy(&self) {
        let len = self.proxies.len();
        let _ = self
            .current
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |i| Some((i + 1) % len));
    }

    /// Select the first proxy again.
    #[cfg(test)]
    pub fn reset_rotation(&self) {
        self.current.store(0, Ordering::SeqCst);
    }

    /// Full request URL for `feed_url` through `proxy`.
    pub fn proxied_url(proxy: &ProxyEndpoint, feed_url: &str) -> String {
        format!("{}{}", proxy.base, urlencoding::encode(feed_url))
    }

    /// Fetch `feed_url`, failing over across proxies at most `retries` times.
    #[instrument(level = "info", skip_all, fields(%feed_url, retries))]
    pub async fn fetch_feed_with_retries(
        &self,
        feed_url: &str,
        retries: usize,
    ) -> Option<FeedEnvelope> {
        let total_t0 = Instant::now();
        let mut remaining = retries;
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let proxy = self.current_proxy().clone();
            let attempt_t0 = Instant::now();

            match self.fetch_once(&proxy, feed_url).await {
                Ok(envelope) => {
                    info!(
                        attempt,
                        proxy = %proxy.base,
                        items = envelope.items.len(),
                        elapsed_ms = attempt_t0.elapsed().as_millis(),
                        "Fetched feed"
                    );
                    return Some(envelope);
                }
                Err(e) => {
                    if remaining == 0 {
                        error!(
                            attempt,
                            proxy = %proxy.base,
                            elapsed_ms_total = total_t0.elapsed().as_millis(),
                            error = %e,
                            "Feed fetch exhausted retries"
                        );
                        return None;
                    }
                    remaining -= 1;
                    self.switch_proxy();

                    let delay = self.backoff_delay(attempt);
                    warn!(
                        attempt,
                        remaining,
                        proxy = %proxy.base,
                        next_proxy = %self.current_proxy().base,
                        elapsed_ms_attempt = attempt_t0.elapsed().as_millis(),
                        ?delay,
                        error = %e,
                        "Feed fetch failed; switching proxy"
                    );
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                }
            }
        }
    }

    async fn fetch_once(
        &self,
        proxy: &ProxyEndpoint,
        feed_url: &str,
    ) -> Result<FeedEnvelope, GatewayError> {
        let url = Self::proxied_url(proxy, feed_url);
        debug!(%url, "Requesting feed through proxy");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::HttpStatus(status.as_u16()));
        }
        let body = response.text().await?;

        let envelope = match proxy.kind {
            ProxyKind::Json => {
                let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
                    debug!(body = %truncate_for_log(&body, 200), "Proxy body is not JSON");
                    e
                })?;
                FeedEnvelope::from_json(&value)
            }
            ProxyKind::Raw => parse_feed_xml(&body)?,
        };
        Ok(envelope)
    }

    fn backoff_delay(&self, attempt: usize) -> Duration {
        if self.retry_base_delay.is_zero() {
            return Duration::ZERO;
        }
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self
            .retry_base_delay
            .saturating_mul(1 << shift)
            .min(MAX_RETRY_DELAY);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl FeedFetcher for ProxyGateway {
    async fn fetch_feed(&self, feed_url: &str) -> Option<FeedEnvelope> {
        self.fetch_feed_with_retries(feed_url, self.retries).await
    }
}
