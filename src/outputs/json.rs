//! JSON output for API consumers and crawlers.
//!
//! # Output Structure
//!
//! Files are organized by category slug:
//! ```text
//! json_output_dir/
//! └── technology/
//!     ├── page-1.json
//!     ├── structured-data.json
//!     ├── breadcrumb.json
//!     └── sitemap.json
//! ```

use crate::config::SiteConfig;
use crate::models::{Article, ArticlePage};
use crate::outputs::seo;
use crate::utils::slugify;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Directory holding a category's files; unusable slugs map to the fallback.
fn category_dir(json_output_dir: &str, category: &str) -> PathBuf {
    let slug = slugify(category);
    let slug = if slug.is_empty() {
        crate::config::FALLBACK_CATEGORY.to_string()
    } else {
        slug
    };
    PathBuf::from(json_output_dir).join(slug)
}

async fn create_category_dir(json_output_dir: &str, category: &str) -> Result<PathBuf, Box<dyn Error>> {
    let dir = category_dir(json_output_dir, category);
    info!(dir = %dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&dir).await {
        error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }
    Ok(dir)
}

/// Write one page of articles to `{dir}/{category}/page-{n}.json`.
#[instrument(level = "info", skip_all, fields(%json_output_dir, category = %page.category, page = page.page))]
pub async fn write_page(
    page: &ArticlePage<'_>,
    json_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(page)?;
    let path = create_category_dir(json_output_dir, page.category)
        .await?
        .join(format!("page-{}.json", page.page));

    fs::write(&path, json).await?;
    info!(path = %path.display(), articles = page.articles.len(), "Wrote page JSON");
    Ok(path)
}

/// Write structured data, breadcrumb and sitemap files for a category.
#[instrument(level = "info", skip_all, fields(%json_output_dir, %category))]
pub async fn write_seo(
    category: &str,
    articles: &[Article],
    site: &SiteConfig,
    json_output_dir: &str,
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let dir = create_category_dir(json_output_dir, category).await?;

    let files = [
        (
            "structured-data.json",
            serde_json::to_string_pretty(&seo::structured_data(articles, site))?,
        ),
        (
            "breadcrumb.json",
            serde_json::to_string_pretty(&seo::breadcrumb(category, site))?,
        ),
        (
            "sitemap.json",
            serde_json::to_string_pretty(&seo::sitemap_entries(articles))?,
        ),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, body) in files {
        let path = dir.join(name);
        fs::write(&path, body).await?;
        written.push(path);
    }
    info!(files = written.len(), "Wrote SEO JSON");
    Ok(written)
}
