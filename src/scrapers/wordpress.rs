//! WordPress REST API sources.
//!
//! Government portals and trade outlets built on WordPress expose
//! `/wp-json/wp/v2/posts`. Posts are requested 100 at a time, newest first,
//! restricted to the date window with `after=`. The total page count comes
//! from the `X-WP-TotalPages` response header.
//!
//! Category names like "Completed Projects" or "On-going Projects" carry
//! the project status, so the site's categories are fetched once and mapped
//! to [`Status`] before paging posts.

use super::{parse_date, RawItem, ScrapeContext};
use crate::classify::status_from_label;
use crate::models::Status;
use crate::utils::{html_to_text, truncate_summary};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const PER_PAGE: u32 = 100;
const MIN_TITLE_CHARS: usize = 10;
const MIN_SUMMARY_CHARS: usize = 30;

#[derive(Debug, Deserialize)]
pub struct Rendered {
    #[serde(default)]
    pub rendered: String,
}

#[derive(Debug, Deserialize)]
pub struct WpPost {
    pub title: Rendered,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub content: Option<Rendered>,
    #[serde(default)]
    pub excerpt: Option<Rendered>,
    #[serde(default)]
    pub categories: Vec<u64>,
}

#[derive(Debug, Deserialize)]
pub struct WpCategory {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

fn api_url(base_url: &str, endpoint: &str) -> String {
    format!("{}/wp-json/wp/v2/{endpoint}", base_url.trim_end_matches('/'))
}

/// Map category ids to the status their name (or slug) implies.
pub fn status_map(categories: &[WpCategory]) -> HashMap<u64, Status> {
    categories
        .iter()
        .filter_map(|c| {
            status_from_label(&html_to_text(&c.name))
                .or_else(|| status_from_label(&c.slug))
                .map(|s| (c.id, s))
        })
        .collect()
}

/// Convert posts to raw items, skipping stubs with too little text.
///
/// The summary comes from the full content when present, else the excerpt.
pub fn posts_to_items(posts: Vec<WpPost>, statuses: &HashMap<u64, Status>) -> Vec<RawItem> {
    posts
        .into_iter()
        .filter_map(|post| {
            let title = html_to_text(&post.title.rendered);
            let body = post
                .content
                .as_ref()
                .map(|c| html_to_text(&c.rendered))
                .filter(|t| !t.is_empty())
                .or_else(|| post.excerpt.as_ref().map(|e| html_to_text(&e.rendered)))
                .unwrap_or_default();
            let summary = truncate_summary(&body);
            if title.chars().count() < MIN_TITLE_CHARS || summary.chars().count() < MIN_SUMMARY_CHARS {
                debug!(link = %post.link, "Skipping short WordPress post");
                return None;
            }
            Some(RawItem {
                status: post.categories.iter().find_map(|id| statuses.get(id).copied()),
                date: parse_date(&post.date),
                url: post.link,
                title,
                text: summary,
            })
        })
        .collect()
}

/// `X-WP-TotalPages`, defaulting to a single page.
pub fn total_pages(headers: &reqwest::header::HeaderMap) -> u32 {
    headers
        .get("x-wp-totalpages")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(1)
}

#[instrument(level = "debug", skip(ctx))]
async fn fetch_categories(ctx: &ScrapeContext, base_url: &str) -> Result<Vec<WpCategory>, Box<dyn Error>> {
    let url = api_url(base_url, "categories");
    let per_page = PER_PAGE.to_string();
    let categories = ctx
        .client
        .get(&url)
        .query(&[("per_page", per_page.as_str())])
        .send()
        .await?
        .error_for_status()?
        .json::<Vec<WpCategory>>()
        .await?;
    Ok(categories)
}

#[instrument(level = "debug", skip(ctx))]
async fn fetch_page(
    ctx: &ScrapeContext,
    base_url: &str,
    page: u32,
    after: &str,
) -> Result<(Vec<WpPost>, u32), Box<dyn Error>> {
    let url = api_url(base_url, "posts");
    let (page, per_page) = (page.to_string(), PER_PAGE.to_string());
    let response = ctx
        .client
        .get(&url)
        .query(&[
            ("page", page.as_str()),
            ("per_page", per_page.as_str()),
            ("after", after),
            ("orderby", "date"),
            ("order", "desc"),
        ])
        .send()
        .await?
        .error_for_status()?;
    let pages = total_pages(response.headers());
    let posts = response.json::<Vec<WpPost>>().await?;
    Ok((posts, pages))
}

/// Collect every post published on or after `since`.
///
/// Failure to read categories only loses status hints; failure on the
/// first page of posts fails the source; failure on a later page stops
/// paging and keeps what was collected.
#[instrument(level = "info", skip(ctx))]
pub async fn collect(ctx: &ScrapeContext, base_url: &str, since: NaiveDate) -> Result<Vec<RawItem>, Box<dyn Error>> {
    let statuses = match fetch_categories(ctx, base_url).await {
        Ok(categories) => status_map(&categories),
        Err(e) => {
            warn!(error = %e, "Could not read WordPress categories; status from text only");
            HashMap::new()
        }
    };

    let after = format!("{since}T00:00:00");
    let (posts, pages) = fetch_page(ctx, base_url, 1, &after).await?;
    info!(pages, "Fetched first page of posts");
    let mut items = posts_to_items(posts, &statuses);

    for page in 2..=pages {
        tokio::time::sleep(Duration::from_millis(ctx.config.page_delay_ms)).await;
        match fetch_page(ctx, base_url, page, &after).await {
            Ok((posts, _)) if posts.is_empty() => break,
            Ok((posts, _)) => items.extend(posts_to_items(posts, &statuses)),
            Err(e) => {
                warn!(page, error = %e, "WordPress page failed; stopping pagination");
                break;
            }
        }
    }
    Ok(items)
}
