//! # Awful News Aggregator
//!
//! Fetches RSS feeds by category through rotating third-party proxies,
//! normalizes them into articles, caches the merged result per category, and
//! renders paginated pages as console output, JSON, and HTML.
//!
//! ## Usage
//!
//! ```sh
//! awful_news_aggregator -c technology -j ./json --html-output ./site/index.html
//! ```
//!
//! ## Architecture
//!
//! 1. **Gateway**: each feed is fetched through the current proxy, failing over
//!    round-robin on errors
//! 2. **Aggregation**: all feeds of a category are fetched concurrently, merged,
//!    normalized and sorted newest first
//! 3. **Cache**: merged results are reused for `cache_timeout_secs`
//! 4. **Output**: the requested page is printed and optionally written as JSON
//!    (with SEO metadata) and HTML

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod aggregator;
mod cache;
mod cli;
mod config;
mod gateway;
mod models;
mod normalize;
mod outputs;
mod rss;
mod utils;

use aggregator::{get_paginated_articles, get_total_pages, FeedAggregator};
use cli::Cli;
use config::{load_config, Config, FeedRegistry};
use gateway::{FeedFetcher, ProxyGateway};
use models::ArticlePage;
use outputs::{html, json};
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("news aggregator starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    config.validate()?;

    if let Some(dir) = &args.json_output_dir {
        ensure_writable_dir(dir).await?;
    }

    let registry = FeedRegistry::new(config.feeds.clone())?;
    if !registry.contains(&args.category) {
        warn!(category = %args.category, "Unknown category; using the `all` feeds");
    }
    debug!(categories = ?registry.categories().collect::<Vec<_>>(), "Feed registry ready");

    let gateway = ProxyGateway::from_config(&config)?;
    debug!(?gateway, proxy = %gateway.current_proxy().base, "Proxy gateway ready");
    let aggregator = FeedAggregator::new(gateway, registry, config.cache_timeout());

    if args.watch {
        let mut ticker = tokio::time::interval(config.refresh_interval());
        info!(interval = ?config.refresh_interval(), "Watching for updates");
        loop {
            ticker.tick().await;
            info!("Auto-refreshing news");
            aggregator.cache().clear().await;
            run_once(&aggregator, &args, &config).await?;
        }
    }

    run_once(&aggregator, &args, &config).await
}

/// Fetch the requested category and emit the requested page.
#[instrument(level = "info", skip_all, fields(category = %args.category, page = args.page))]
async fn run_once<F: FeedFetcher>(
    aggregator: &FeedAggregator<F>,
    args: &Cli,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    let start_time = std::time::Instant::now();
    let category = args.category.as_str();

    let articles = aggregator.fetch_category(category).await;
    let total_pages = get_total_pages(&articles);
    let page_articles = get_paginated_articles(&articles, args.page);
    let now = Utc::now();

    if articles.is_empty() {
        warn!("No articles available");
        println!("No news available at the moment. Please try again later.");
    } else {
        println!(
            "{} (page {} of {}, {} articles)\n",
            html::category_title(category),
            args.page,
            total_pages,
            articles.len()
        );
        for article in page_articles {
            println!(
                "* {}\n  {} | {}\n  {}\n",
                article.title,
                article.source,
                html::format_date(article.pub_date, now),
                article.link
            );
        }
        if page_articles.is_empty() {
            println!("Page {} is past the last page ({total_pages}).", args.page);
        }
    }

    if let Some(dir) = &args.json_output_dir {
        let fetched_at = aggregator
            .cache()
            .entry(category)
            .await
            .map(|entry| entry.fetched_at)
            .unwrap_or(now);
        let page = ArticlePage {
            category,
            page: args.page,
            total_pages,
            total_articles: articles.len(),
            fetched_at,
            articles: page_articles,
        };
        json::write_page(&page, dir).await?;
        json::write_seo(category, &articles, &config.site, dir).await?;
    }

    if let Some(path) = &args.html_output {
        let body = html::render_page(
            category,
            &articles,
            page_articles,
            args.page,
            total_pages,
            &config.site,
            now,
        );
        tokio::fs::write(path, body).await?;
        info!(%path, "Wrote HTML page");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        articles = articles.len(),
        total_pages,
        "Run complete"
    );
    Ok(())
}
