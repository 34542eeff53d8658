//! Conversion of raw feed XML into a [`FeedEnvelope`].
//!
//! Raw-mode proxies pass the feed document through untouched, so the gateway
//! turns it into the same `{ items, feed }` shape the JSON proxies produce.
//! RSS 2.0, RSS 1.0 (RDF) and Atom are recognised; everything the envelope
//! does not carry is skipped.

use crate::models::{FeedEnvelope, RawItem};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Errors raised while reading feed XML.
#[derive(Debug, thiserror::Error)]
pub enum RssError {
    #[error("malformed xml: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("document is not an RSS or Atom feed")]
    NotAFeed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    FeedTitle,
    Title,
    Description,
    Content,
    Link,
    PubDate,
    Author,
}

impl Field {
    /// Fields whose nested elements are kept as markup for later image lookup.
    fn keeps_markup(self) -> bool {
        matches!(self, Field::Description | Field::Content)
    }
}

/// Parse an RSS/Atom document.
pub fn parse_feed_xml(xml: &str) -> Result<FeedEnvelope, RssError> {
    let mut reader = Reader::from_str(xml);

    let mut envelope = FeedEnvelope::default();
    let mut saw_feed_root = false;
    let mut current: Option<RawItem> = None;
    let mut field: Option<Field> = None;
    let mut depth_in_author = false;
    // Open elements nested inside the field being read.
    let mut nested = 0usize;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name();
                let name = name.as_ref();
                if let Some(open) = field {
                    if !is_author_child(name, depth_in_author) {
                        nested += 1;
                        if open.keeps_markup() {
                            text.push('<');
                            text.push_str(&String::from_utf8_lossy(&e));
                            text.push('>');
                        }
                        continue;
                    }
                }
                match name {
                    b"rss" | b"rdf:RDF" | b"feed" => saw_feed_root = true,
                    b"item" | b"entry" => current = Some(RawItem::default()),
                    _ => {}
                }
                match current.as_mut() {
                    Some(item) => {
                        apply_attributes(item, &e);
                        if name == b"author" {
                            depth_in_author = true;
                        }
                        field = item_field(name, depth_in_author);
                    }
                    None => {
                        field = (name == b"title" && envelope.feed.title.is_none())
                            .then_some(Field::FeedTitle);
                    }
                }
                text.clear();
            }
            Event::Empty(e) => match field {
                Some(open) => {
                    if open.keeps_markup() {
                        text.push('<');
                        text.push_str(&String::from_utf8_lossy(&e));
                        text.push_str("/>");
                    }
                }
                None => {
                    if let Some(item) = current.as_mut() {
                        apply_attributes(item, &e);
                    }
                }
            },
            Event::Text(e) => {
                if let Some(open) = field {
                    let raw = String::from_utf8_lossy(&e);
                    if nested > 0 && open.keeps_markup() {
                        text.push_str(&raw);
                        continue;
                    }
                    match unescape(&raw) {
                        Ok(decoded) => text.push_str(&decoded),
                        Err(_) => text.push_str(&raw),
                    }
                }
            }
            Event::CData(e) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::GeneralRef(e) => {
                if let Some(open) = field {
                    let reference = format!("&{};", String::from_utf8_lossy(&e));
                    if nested > 0 && open.keeps_markup() {
                        text.push_str(&reference);
                        continue;
                    }
                    match unescape(&reference) {
                        Ok(decoded) => text.push_str(&decoded),
                        Err(_) => text.push_str(&reference),
                    }
                }
            }
            Event::End(e) => {
                let name = e.name();
                let name = name.as_ref();
                if nested > 0 {
                    nested -= 1;
                    if field.is_some_and(Field::keeps_markup) {
                        text.push_str("</");
                        text.push_str(&String::from_utf8_lossy(name));
                        text.push('>');
                    }
                    continue;
                }
                if let Some(done) = field.take() {
                    let value = text.trim().to_string();
                    text.clear();
                    match (done, current.as_mut()) {
                        (Field::FeedTitle, _) => envelope.feed.title = Some(value),
                        (_, Some(item)) => assign(item, done, value),
                        (_, None) => {}
                    }
                }
                match name {
                    b"author" => depth_in_author = false,
                    b"item" | b"entry" => {
                        if let Some(item) = current.take() {
                            envelope.items.push(item);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_feed_root {
        return Err(RssError::NotAFeed);
    }
    Ok(envelope)
}

/// Atom `<author>` children select the author name instead of nesting in it.
fn is_author_child(name: &[u8], in_author: bool) -> bool {
    in_author && matches!(name, b"name" | b"email" | b"uri")
}

fn item_field(name: &[u8], in_author: bool) -> Option<Field> {
    match name {
        b"title" => Some(Field::Title),
        b"description" | b"summary" => Some(Field::Description),
        b"content:encoded" | b"content" => Some(Field::Content),
        b"link" => Some(Field::Link),
        b"pubDate" | b"published" | b"updated" | b"dc:date" => Some(Field::PubDate),
        b"author" | b"dc:creator" => Some(Field::Author),
        b"name" if in_author => Some(Field::Author),
        _ => None,
    }
}

fn assign(item: &mut RawItem, field: Field, value: String) {
    if value.is_empty() {
        return;
    }
    let slot = match field {
        Field::FeedTitle => return,
        Field::Title => &mut item.title,
        Field::Description => &mut item.description,
        Field::Content => &mut item.content,
        Field::Link => &mut item.link,
        Field::PubDate => &mut item.pub_date,
        Field::Author => &mut item.author,
    };
    // First occurrence wins (`published` before `updated`, first `link`).
    if slot.is_none() {
        *slot = Some(value);
    }
}

/// Pick up URL-carrying attributes: `<enclosure url>`, `<media:thumbnail url>`,
/// `<media:content url>` and Atom's `<link href>`.
fn apply_attributes(item: &mut RawItem, element: &BytesStart<'_>) {
    let name = element.name();
    let name = name.as_ref();
    let wanted: &[u8] = match name {
        b"enclosure" | b"media:thumbnail" | b"media:content" => b"url",
        b"link" => b"href",
        _ => return,
    };

    let mut value = None;
    let mut rel = None;
    for attr in element.attributes().flatten() {
        let raw = String::from_utf8_lossy(&attr.value).into_owned();
        let decoded = unescape(&raw).map(|c| c.into_owned()).unwrap_or(raw);
        if attr.key.as_ref() == wanted {
            value = Some(decoded);
        } else if attr.key.as_ref() == b"rel" {
            rel = Some(decoded);
        }
    }
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        return;
    };

    let slot = match name {
        b"enclosure" => &mut item.enclosure_link,
        b"media:thumbnail" | b"media:content" => &mut item.media_thumbnail,
        _ if rel.as_deref().is_none_or(|r| r == "alternate") => &mut item.link,
        _ => return,
    };
    if slot.is_none() {
        *slot = Some(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>BBC News &amp; More</title>
    <link>https://www.bbc.co.uk/news</link>
    <item>
      <title><![CDATA[Storm <em>hits</em> coast]]></title>
      <description><![CDATA[<p>Winds of 90mph <img src="https://ichef/1.jpg"></p>]]></description>
      <link>https://www.bbc.co.uk/news/1?a=1&amp;b=2</link>
      <pubDate>Wed, 03 Jan 2024 10:00:00 GMT</pubDate>
      <dc:creator>Weather Desk</dc:creator>
      <media:thumbnail width="240" height="135" url="https://ichef/thumb.jpg"/>
    </item>
    <item>
      <title>Second story</title>
      <enclosure url="https://ichef/enc.jpg" type="image/jpeg" length="0"/>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_rss_channel() {
        let envelope = parse_feed_xml(RSS).unwrap();
        assert_eq!(envelope.feed.title.as_deref(), Some("BBC News & More"));
        assert_eq!(envelope.items.len(), 2);

        let first = &envelope.items[0];
        assert_eq!(first.title.as_deref(), Some("Storm <em>hits</em> coast"));
        assert_eq!(first.link.as_deref(), Some("https://www.bbc.co.uk/news/1?a=1&b=2"));
        assert_eq!(first.pub_date.as_deref(), Some("Wed, 03 Jan 2024 10:00:00 GMT"));
        assert_eq!(first.author.as_deref(), Some("Weather Desk"));
        assert_eq!(first.media_thumbnail.as_deref(), Some("https://ichef/thumb.jpg"));
        assert!(first.description.as_deref().unwrap().contains("<img"));

        let second = &envelope.items[1];
        assert_eq!(second.title.as_deref(), Some("Second story"));
        assert_eq!(second.enclosure_link.as_deref(), Some("https://ichef/enc.jpg"));
        assert_eq!(second.link, None);
    }

    #[test]
    fn test_parse_atom_feed() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Rust Blog</title>
  <entry>
    <title>Announcing Rust 1.80</title>
    <link rel="alternate" href="https://blog.rust-lang.org/1.80"/>
    <published>2024-07-25T00:00:00+00:00</published>
    <updated>2024-07-26T00:00:00+00:00</updated>
    <author><name>The Release Team</name></author>
    <summary>Lazy cells and more.</summary>
  </entry>
</feed>"#;
        let envelope = parse_feed_xml(atom).unwrap();
        assert_eq!(envelope.feed.title.as_deref(), Some("Rust Blog"));
        let entry = &envelope.items[0];
        assert_eq!(entry.link.as_deref(), Some("https://blog.rust-lang.org/1.80"));
        assert_eq!(entry.pub_date.as_deref(), Some("2024-07-25T00:00:00+00:00"));
        assert_eq!(entry.author.as_deref(), Some("The Release Team"));
        assert_eq!(entry.description.as_deref(), Some("Lazy cells and more."));
    }

    #[test]
    fn test_nested_markup_inside_title_keeps_text() {
        let xml = r#"<rss><channel><title>F</title>
  <item>
    <title>Big <b>news</b> today</title>
    <description>Lead <a href="https://example.com/more">more</a> &amp; after</description>
    <link>https://example.com/1</link>
  </item>
</channel></rss>"#;
        let envelope = parse_feed_xml(xml).unwrap();
        let item = &envelope.items[0];
        assert_eq!(item.title.as_deref(), Some("Big news today"));
        assert_eq!(
            item.description.as_deref(),
            Some(r#"Lead <a href="https://example.com/more">more</a> & after"#)
        );
        assert_eq!(item.link.as_deref(), Some("https://example.com/1"));
    }

    #[test]
    fn test_atom_xhtml_content_keeps_markup() {
        let atom = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Desk</title>
  <entry>
    <title>Harbour reopens</title>
    <author><email>desk@example.com</email><name>Harbour Desk</name></author>
    <content type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml"><p>Body text <img src="https://example.com/harbour.jpg"/></p></div></content>
    <link href="https://example.com/harbour"/>
  </entry>
</feed>"#;
        let envelope = parse_feed_xml(atom).unwrap();
        let entry = &envelope.items[0];
        assert_eq!(entry.title.as_deref(), Some("Harbour reopens"));
        assert_eq!(entry.author.as_deref(), Some("Harbour Desk"));
        assert_eq!(entry.link.as_deref(), Some("https://example.com/harbour"));

        let content = entry.content.as_deref().unwrap();
        assert!(content.contains("<p>Body text"));
        assert_eq!(
            crate::normalize::extract_image(entry),
            "https://example.com/harbour.jpg"
        );
        assert_eq!(crate::normalize::sanitize_text(content), "Body text");
    }

    #[test]
    fn test_html_page_is_not_a_feed() {
        let html = "<html><head><title>Blocked</title></head><body></body></html>";
        assert!(matches!(parse_feed_xml(html), Err(RssError::NotAFeed)));
    }
}
