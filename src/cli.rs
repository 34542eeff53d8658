//! Command-line interface definitions for the news aggregator.
//!
//! All arguments can be provided via command-line flags; the config path can
//! also come from the environment.

use clap::Parser;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Print the first page of the default category
/// awful_news_aggregator
///
/// # Second page of technology news, written as JSON and HTML
/// awful_news_aggregator -c technology -p 2 -j ./json --html-output ./site/index.html
///
/// # Custom feeds, refreshed every `refresh_interval_secs`
/// awful_news_aggregator --config feeds.yaml --watch
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Category to fetch; unknown categories use the `all` feeds
    #[arg(short, long, default_value = "all")]
    pub category: String,

    /// 1-indexed page to show
    #[arg(short, long, default_value_t = 1)]
    pub page: usize,

    /// Optional path to a YAML config file
    #[arg(long, env = "NEWS_CONFIG")]
    pub config: Option<String>,

    /// Output directory for page and SEO JSON files
    #[arg(short, long)]
    pub json_output_dir: Option<String>,

    /// Path of an HTML page to render
    #[arg(long)]
    pub html_output: Option<String>,

    /// Keep running, clearing the cache and refetching on every refresh interval
    #[arg(long)]
    pub watch: bool,
}
