//! HTML rendering of article pages.
//!
//! Produces a standalone page for one category page: a title, one card per
//! article with schema.org `NewsArticle` microdata, a "load more" footer, and
//! the JSON-LD blocks from [`super::seo`] in `<head>`.

use crate::config::SiteConfig;
use crate::models::Article;
use crate::outputs::seo;
use crate::utils::upcase;
use chrono::{DateTime, Utc};
use std::fmt::Write;

/// Escape text for use in HTML content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

/// Human-friendly age of `date` relative to `now`.
pub fn format_date(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - date).abs();
    let days = diff.num_days();

    match days {
        0 => {
            let hours = diff.num_hours();
            if hours == 0 {
                format!("{} minutes ago", diff.num_minutes())
            } else {
                format!("{hours} hours ago")
            }
        }
        1 => "Yesterday".to_string(),
        2..=6 => format!("{days} days ago"),
        _ => date.format("%b %-d, %Y").to_string(),
    }
}

/// Heading for a category page.
pub fn category_title(category: &str) -> String {
    if category == crate::config::FALLBACK_CATEGORY {
        "All News".to_string()
    } else {
        format!("{} News", upcase(category))
    }
}

/// One article as a `NewsArticle` card.
///
/// # Arguments
///
/// * `article` - Article to render; every text field is HTML-escaped
/// * `now` - Reference time for the relative date label
pub fn render_card(article: &Article, now: DateTime<Utc>) -> String {
    let image = escape_html(&article.image);
    let title = escape_html(&article.title);
    let link = escape_html(&article.link);

    format!(
        r#"<article class="news-card" itemscope itemtype="https://schema.org/NewsArticle">
  <div class="news-card-image">
    <img src="{image}" alt="{title}" loading="lazy" itemprop="image">
  </div>
  <div class="news-card-content">
    <div class="news-card-meta">
      <span class="category-badge">{category}</span>
      <time datetime="{datetime}" itemprop="datePublished">{age}</time>
    </div>
    <h3 class="news-card-title" itemprop="headline">
      <a href="{link}" target="_blank" rel="noopener noreferrer nofollow" itemprop="url">{title}</a>
    </h3>
    <p class="news-card-description" itemprop="description">{description}</p>
    <div class="news-card-footer">
      <a href="{link}" class="read-more" target="_blank" rel="noopener noreferrer nofollow">Read More →</a>
      <span class="source-name" itemprop="publisher" itemscope itemtype="https://schema.org/Organization">
        <span itemprop="name">{source}</span>
      </span>
    </div>
  </div>
</article>
"#,
        category = escape_html(&article.category),
        datetime = article.pub_date.to_rfc3339(),
        age = format_date(article.pub_date, now),
        description = escape_html(&article.description),
        source = escape_html(&article.source),
    )
}

/// Render `page` (1-indexed) of a category.
///
/// `all_articles` feeds the structured data; `page_articles` are the cards.
pub fn render_page(
    category: &str,
    all_articles: &[Article],
    page_articles: &[Article],
    page: usize,
    total_pages: usize,
    site: &SiteConfig,
    now: DateTime<Utc>,
) -> String {
    let heading = escape_html(&category_title(category));
    let mut html = String::new();

    writeln!(html, "<!DOCTYPE html>\n<html lang=\"en\">\n<head>").unwrap();
    writeln!(html, "<meta charset=\"utf-8\">").unwrap();
    writeln!(html, "<title>{heading} | {}</title>", escape_html(&site.name)).unwrap();
    writeln!(html, "<link rel=\"canonical\" href=\"{}\">", escape_html(&site.url)).unwrap();
    if !all_articles.is_empty() {
        writeln!(
            html,
            "<script type=\"application/ld+json\" id=\"structured-data\">{}</script>",
            json_ld(&seo::structured_data(all_articles, site))
        )
        .unwrap();
        writeln!(
            html,
            "<script type=\"application/ld+json\" id=\"breadcrumb-data\">{}</script>",
            json_ld(&seo::breadcrumb(category, site))
        )
        .unwrap();
    }
    writeln!(html, "</head>\n<body>").unwrap();
    writeln!(html, "<h2 id=\"category-title\">{heading}</h2>").unwrap();
    writeln!(html, "<div id=\"news-container\" class=\"news-grid\">").unwrap();

    if all_articles.is_empty() {
        writeln!(
            html,
            "<div class=\"no-news\"><p>No news available at the moment. Please try again later.</p></div>"
        )
        .unwrap();
    } else {
        for article in page_articles {
            html.push_str(&render_card(article, now));
        }
    }
    writeln!(html, "</div>").unwrap();

    if !all_articles.is_empty() {
        let (disabled, label) = if page >= total_pages {
            (" disabled", "No More News")
        } else {
            ("", "Load More News")
        };
        writeln!(
            html,
            "<button id=\"load-more-btn\" data-next-page=\"{}\"{disabled}>{label}</button>",
            page + 1
        )
        .unwrap();
    }
    writeln!(html, "</body>\n</html>").unwrap();
    html
}

/// JSON for a `<script>` block; `</` is escaped so content cannot close it.
fn json_ld(value: &serde_json::Value) -> String {
    value.to_string().replace("</", "<\\/")
}
