//! Search-engine metadata derived from articles.
//!
//! Everything here reads articles and returns JSON values; nothing mutates
//! the articles. The values are embedded into the HTML page as JSON-LD and
//! written next to the page JSON by [`super::json::write_seo`].

use crate::config::SiteConfig;
use crate::models::Article;
use crate::utils::upcase;
use serde::Serialize;
use serde_json::{json, Value};

/// Number of articles listed in the `ItemList` structured data.
pub const STRUCTURED_DATA_LIMIT: usize = 10;

/// One `<url>` of a sitemap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: String,
    pub changefreq: &'static str,
    pub priority: &'static str,
}

/// schema.org `ItemList` of the leading articles.
pub fn structured_data(articles: &[Article], site: &SiteConfig) -> Value {
    let elements: Vec<Value> = articles
        .iter()
        .take(STRUCTURED_DATA_LIMIT)
        .enumerate()
        .map(|(index, article)| {
            json!({
                "@type": "ListItem",
                "position": index + 1,
                "item": {
                    "@type": "NewsArticle",
                    "headline": article.title,
                    "description": article.description,
                    "image": article.image,
                    "datePublished": article.pub_date.to_rfc3339(),
                    "author": { "@type": "Person", "name": article.author },
                    "publisher": {
                        "@type": "Organization",
                        "name": site.name,
                        "url": site.url,
                    },
                    "mainEntityOfPage": { "@type": "WebPage", "@id": article.link },
                    "keywords": article.keywords.join(", "),
                }
            })
        })
        .collect();

    json!({
        "@context": "https://schema.org",
        "@type": "ItemList",
        "itemListElement": elements,
    })
}

/// schema.org `BreadcrumbList`: Home → category.
pub fn breadcrumb(category: &str, site: &SiteConfig) -> Value {
    json!({
        "@context": "https://schema.org",
        "@type": "BreadcrumbList",
        "itemListElement": [
            {
                "@type": "ListItem",
                "position": 1,
                "name": "Home",
                "item": site.url,
            },
            {
                "@type": "ListItem",
                "position": 2,
                "name": upcase(category),
                "item": format!("{}#{}", site.url, category),
            }
        ]
    })
}

/// One daily-refreshed sitemap entry per article, dated by publication day.
pub fn sitemap_entries(articles: &[Article]) -> Vec<SitemapEntry> {
    articles
        .iter()
        .map(|article| SitemapEntry {
            loc: article.link.clone(),
            lastmod: article.pub_date.format("%Y-%m-%d").to_string(),
            changefreq: "daily",
            priority: "0.8",
        })
        .collect()
}
