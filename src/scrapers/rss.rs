//! RSS 2.0 feed sources.
//!
//! Only `<item>` children `title`, `link`, `description` and `pubDate` are
//! read; descriptions are HTML and reduced to text.

use super::{parse_date, RawItem, ScrapeContext};
use crate::utils::html_to_text;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::error::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

#[derive(Clone, Copy)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
}

fn resolve_entity(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    resolve_predefined_entity(name).map(str::to_string)
}

/// Parse the items of an RSS document.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedItem>, Box<dyn Error>> {
    // Text is not trimmed per event: entity references split text events,
    // and the spaces around them belong to the value
    let mut reader = Reader::from_str(xml);

    let mut items = Vec::new();
    let mut current: Option<FeedItem> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"item" => current = Some(FeedItem::default()),
                b"title" if current.is_some() => field = Some(Field::Title),
                b"link" if current.is_some() => field = Some(Field::Link),
                b"description" if current.is_some() => field = Some(Field::Description),
                b"pubDate" if current.is_some() => field = Some(Field::PubDate),
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"item" => {
                    if let Some(mut item) = current.take() {
                        for value in [&mut item.title, &mut item.link, &mut item.description, &mut item.pub_date] {
                            *value = value.trim().to_string();
                        }
                        items.push(item);
                    }
                    field = None;
                }
                b"title" | b"link" | b"description" | b"pubDate" => field = None,
                _ => {}
            },
            Event::Text(t) => push_text(&mut current, field, &String::from_utf8_lossy(&t)),
            Event::CData(t) => push_text(&mut current, field, &String::from_utf8_lossy(&t)),
            Event::GeneralRef(r) => {
                let name = String::from_utf8_lossy(&r).into_owned();
                let text = resolve_entity(&name).unwrap_or_else(|| format!("&{name};"));
                push_text(&mut current, field, &text);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(items)
}

fn push_text(current: &mut Option<FeedItem>, field: Option<Field>, text: &str) {
    let (Some(item), Some(field)) = (current.as_mut(), field) else {
        return;
    };
    let target = match field {
        Field::Title => &mut item.title,
        Field::Link => &mut item.link,
        Field::Description => &mut item.description,
        Field::PubDate => &mut item.pub_date,
    };
    target.push_str(text);
}

impl From<FeedItem> for RawItem {
    fn from(item: FeedItem) -> Self {
        RawItem {
            title: html_to_text(&item.title),
            url: item.link.trim().to_string(),
            date: parse_date(&item.pub_date),
            text: html_to_text(&item.description),
            status: None,
        }
    }
}

/// Fetch and parse every feed. The source fails only if all feeds fail.
#[instrument(level = "info", skip(ctx))]
pub async fn collect(ctx: &ScrapeContext, feeds: &[String]) -> Result<Vec<RawItem>, Box<dyn Error>> {
    let mut items = Vec::new();
    let mut last_error = None;
    let mut succeeded = 0usize;

    for feed in feeds {
        let parsed = match ctx.get_text(feed).await {
            Ok(body) => parse_feed(&body),
            Err(e) => Err(e),
        };
        match parsed {
            Ok(feed_items) => {
                info!(%feed, count = feed_items.len(), "Parsed feed");
                succeeded += 1;
                items.extend(feed_items.into_iter().map(RawItem::from));
            }
            Err(e) => {
                warn!(%feed, error = %e, "Feed failed; skipping");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if succeeded == 0 => Err(e),
        _ => Ok(items),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>SAnews</title>
    <link>https://www.sanews.gov.za</link>
    <description>Government news</description>
    <item>
      <title>Transnet &amp; partners sign Durban container terminal deal</title>
      <link>https://www.sanews.gov.za/south-africa/durban-terminal</link>
      <description><![CDATA[<p>The <b>Pier 2</b> concession was approved.</p>]]></description>
      <pubDate>Mon, 20 Oct 2025 14:00:00 +0200</pubDate>
      <dc:creator>SAnews</dc:creator>
    </item>
    <item>
      <title>N3 upgrade reaches &#8216;final phase&#8217;</title>
      <link>https://www.sanews.gov.za/south-africa/n3-upgrade</link>
      <description>Work on the N3 is 90% complete.</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed() {
        let items = parse_feed(FEED).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Transnet & partners sign Durban container terminal deal");
        assert_eq!(items[0].link, "https://www.sanews.gov.za/south-africa/durban-terminal");
        assert_eq!(items[0].pub_date, "Mon, 20 Oct 2025 14:00:00 +0200");
        assert_eq!(items[1].title, "N3 upgrade reaches \u{2018}final phase\u{2019}");
        assert_eq!(items[1].pub_date, "");
    }

    #[test]
    fn test_channel_fields_are_not_items() {
        let items = parse_feed(FEED).unwrap();
        assert!(items.iter().all(|i| i.title != "SAnews"));
    }

    #[test]
    fn test_feed_item_to_raw() {
        let raw: RawItem = parse_feed(FEED).unwrap().remove(0).into();
        assert_eq!(raw.text, "The Pier 2 concession was approved.");
        assert_eq!(raw.date, NaiveDate::from_ymd_opt(2025, 10, 20));
        assert_eq!(raw.status, None);
    }

    #[test]
    fn test_resolve_entity() {
        assert_eq!(resolve_entity("amp").as_deref(), Some("&"));
        assert_eq!(resolve_entity("#x2013").as_deref(), Some("\u{2013}"));
        assert_eq!(resolve_entity("#8217").as_deref(), Some("\u{2019}"));
        assert_eq!(resolve_entity("nbsp"), None);
    }

    #[test]
    fn test_malformed_feed_errors() {
        assert!(parse_feed("<rss><channel><item><title>x</titl></item>").is_err());
    }
}
