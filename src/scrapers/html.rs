//! HTML listing page sources.
//!
//! For sites without an API or feed, listing pages are read with CSS
//! selectors from the source's config:
//!
//! - `item_selector` picks one element per article on the listing page
//! - `link_selector` (within the item) gives the headline text and `href`
//! - `summary_selector` (optional) gives the teaser text; when missing or
//!   shorter than 20 characters the title is used instead
//! - `date_selector` (optional) gives a `datetime` attribute or date text;
//!   otherwise the date is read from the URL
//!
//! When `content_selector` or `article_date_selector` is set, every
//! discovered article page is fetched as well. Its body text replaces the
//! teaser, and its date (from the selector, else the
//! `article:published_time` meta tag) replaces the listing date. A page
//! that cannot be fetched keeps its listing data.

use super::{date_from_url, parse_date, RawItem, ScrapeContext};
use crate::utils::normalize_whitespace;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

const MIN_SUMMARY_CHARS: usize = 20;

static PUBLISHED_META: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="article:published_time"], meta[name="date"]"#).expect("valid selector")
});

#[derive(Debug)]
pub struct Selectors {
    item: Selector,
    link: Selector,
    summary: Option<Selector>,
    date: Option<Selector>,
    content: Option<Selector>,
    article_date: Option<Selector>,
}

fn selector(css: &str) -> Result<Selector, Box<dyn Error>> {
    Selector::parse(css).map_err(|e| format!("invalid selector {css:?}: {e}").into())
}

impl Selectors {
    pub fn parse(
        item: &str,
        link: &str,
        summary: Option<&str>,
        date: Option<&str>,
    ) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            item: selector(item)?,
            link: selector(link)?,
            summary: summary.map(selector).transpose()?,
            date: date.map(selector).transpose()?,
            content: None,
            article_date: None,
        })
    }

    /// Selectors applied to each article page. With neither set, article
    /// pages are not fetched.
    pub fn with_article(mut self, content: Option<&str>, date: Option<&str>) -> Result<Self, Box<dyn Error>> {
        self.content = content.map(selector).transpose()?;
        self.article_date = date.map(selector).transpose()?;
        Ok(self)
    }

    fn reads_articles(&self) -> bool {
        self.content.is_some() || self.article_date.is_some()
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn element_date(el: ElementRef<'_>) -> Option<NaiveDate> {
    el.value()
        .attr("datetime")
        .and_then(parse_date)
        .or_else(|| parse_date(&element_text(el)))
}

fn item_date(item: ElementRef<'_>, selectors: &Selectors, url: &str) -> Option<NaiveDate> {
    selectors
        .date
        .as_ref()
        .and_then(|sel| item.select(sel).next())
        .and_then(element_date)
        .or_else(|| date_from_url(url))
}

/// Extract raw items from one listing page. Relative links resolve against `page_url`.
pub fn parse_listing(html: &str, page_url: &Url, selectors: &Selectors) -> Vec<RawItem> {
    let document = Html::parse_document(html);
    let mut items = Vec::new();

    for item in document.select(&selectors.item) {
        let Some(link) = item.select(&selectors.link).next() else {
            continue;
        };
        let Some(url) = link.value().attr("href").and_then(|href| page_url.join(href).ok()) else {
            continue;
        };
        let title = element_text(link);
        if title.is_empty() {
            continue;
        }
        let url = url.to_string();

        let summary = selectors
            .summary
            .as_ref()
            .and_then(|sel| item.select(sel).next())
            .map(element_text)
            .filter(|s| s.chars().count() >= MIN_SUMMARY_CHARS)
            .unwrap_or_else(|| title.clone());

        items.push(RawItem {
            date: item_date(item, selectors, &url),
            title,
            url,
            text: summary,
            status: None,
        });
    }
    debug!(page = %page_url, count = items.len(), "Parsed listing page");
    items
}

/// Update `item` from its article page: body text from the content
/// selector, date from the article date selector or the publication meta tag.
pub fn parse_article(html: &str, selectors: &Selectors, item: &mut RawItem) {
    let document = Html::parse_document(html);

    if let Some(sel) = &selectors.content {
        let body = normalize_whitespace(&document.select(sel).map(element_text).collect::<Vec<_>>().join(" "));
        if body.chars().count() >= MIN_SUMMARY_CHARS {
            item.text = body;
        }
    }

    let date = selectors
        .article_date
        .as_ref()
        .and_then(|sel| document.select(sel).find_map(element_date))
        .or_else(|| {
            document
                .select(&PUBLISHED_META)
                .find_map(|meta| meta.value().attr("content").and_then(parse_date))
        });
    if date.is_some() {
        item.date = date;
    }
}

/// Fetch article pages concurrently and fill in their text and dates.
async fn fetch_articles(ctx: &ScrapeContext, items: Vec<RawItem>, selectors: &Selectors) -> Vec<RawItem> {
    let concurrency = ctx.config.concurrency.max(1);
    stream::iter(items)
        .map(|mut item| async move {
            match ctx.get_text(&item.url).await {
                Ok(body) => parse_article(&body, selectors, &mut item),
                Err(e) => warn!(url = %item.url, error = %e, "Article page failed; keeping listing data"),
            }
            item
        })
        .buffer_unordered(concurrency)
        .collect()
        .await
}

/// Fetch every listing page, then each article page when configured.
/// The source fails only if all listing pages fail.
#[instrument(level = "info", skip(ctx, selectors))]
pub async fn collect(
    ctx: &ScrapeContext,
    listing_urls: &[String],
    selectors: &Selectors,
) -> Result<Vec<RawItem>, Box<dyn Error>> {
    let mut items = Vec::new();
    let mut last_error = None;
    let mut succeeded = 0usize;

    for listing in listing_urls {
        let page = async {
            let page_url = Url::parse(listing)?;
            let body = ctx.get_text(listing).await?;
            Ok::<_, Box<dyn Error>>(parse_listing(&body, &page_url, selectors))
        };
        match page.await {
            Ok(found) => {
                info!(%listing, count = found.len(), "Parsed listing");
                succeeded += 1;
                items.extend(found);
            }
            Err(e) => {
                warn!(%listing, error = %e, "Listing page failed; skipping");
                last_error = Some(e);
            }
        }
    }

    if let (Some(e), 0) = (last_error, succeeded) {
        return Err(e);
    }
    if selectors.reads_articles() && !items.is_empty() {
        info!(count = items.len(), "Fetching article pages");
        items = fetch_articles(ctx, items, selectors).await;
    }
    Ok(items)
}
