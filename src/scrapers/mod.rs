//! Configurable news source scrapers.
//!
//! Every source in `config.yaml` is one of three kinds, each in its own
//! submodule:
//!
//! | Kind | Module | Method | Notes |
//! |------|--------|--------|-------|
//! | `wordpress` | [`wordpress`] | WordPress REST API | Paginated; category names map to project status |
//! | `rss` | [`rss`] | RSS 2.0 feeds | Several feeds per source |
//! | `html` | [`html`] | HTML listing pages | CSS selectors from config; dates from markup or URL; optional article page fetch |
//!
//! # Common Pipeline
//!
//! Each kind only discovers [`RawItem`]s. This module turns them into
//! [`Article`]s the same way for every source:
//!
//! 1. Normalize title and summary text; clip the summary to 300 characters
//! 2. Apply the source's include/exclude keywords to title + summary
//! 3. Drop items older than the source's date window (undated items stay)
//! 4. Deduplicate by URL or title
//! 5. Fill in status (from the item, else from keywords) and the source's
//!    pre-filled category
//!
//! A failing source is logged and reported; it never aborts the run.

pub mod html;
pub mod rss;
#[cfg(test)]
pub mod test_server;
pub mod wordpress;

use crate::classify::{extract_status, is_relevant, KeywordSet};
use crate::config::{ScrapeConfig, SourceConfig, SourceKind};
use crate::merge::Deduper;
use crate::models::{Article, Status};
use crate::outputs::csv::write_articles;
use crate::utils::{normalize_whitespace, slugify, truncate_summary, window_start};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;
use tracing::{debug, error, info, instrument, warn};

/// An item as discovered by a source, before shared filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem {
    pub title: String,
    pub url: String,
    pub date: Option<NaiveDate>,
    /// Body, excerpt, or description text used for the summary.
    pub text: String,
    /// Status known from the source itself (e.g. a WordPress category).
    pub status: Option<Status>,
}

/// Shared state for a scrape run.
#[derive(Debug, Clone)]
pub struct ScrapeContext {
    pub client: reqwest::Client,
    pub config: ScrapeConfig,
    pub today: NaiveDate,
}

impl ScrapeContext {
    pub fn new(config: ScrapeConfig, today: NaiveDate) -> Result<Self, Box<dyn Error>> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(StdDuration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self { client, config, today })
    }

    /// GET `url` and return the body, failing on non-2xx statuses.
    pub async fn get_text(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let body = self.client.get(url).send().await?.error_for_status()?.text().await?;
        Ok(body)
    }
}

/// Outcome of scraping one source.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub name: String,
    pub kind: &'static str,
    pub articles: usize,
    pub path: Option<String>,
    pub error: Option<String>,
}

/// Parse the date formats seen across sources into a calendar date.
///
/// Accepts RFC 3339, RFC 2822 (RSS), WordPress' naive `2025-10-20T09:30:00`,
/// `2025-10-20`, and English long forms like `20 October 2025` or
/// `Oct 20, 2025`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    ["%Y-%m-%d", "%d %B %Y", "%d %b %Y", "%B %d, %Y", "%b %d, %Y", "%d/%m/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

static URL_DATE_DASHED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("valid regex"));
static URL_DATE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d{4})/(\d{2})/(\d{2})(?:/|$)").expect("valid regex"));

/// Date embedded in a URL: `/article/title-2025-10-20` or `/2025/10/20/slug`.
pub fn date_from_url(url: &str) -> Option<NaiveDate> {
    let caps = URL_DATE_DASHED
        .captures_iter(url)
        .last()
        .or_else(|| URL_DATE_PATH.captures(url))?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Compiled per-source filtering rules.
#[derive(Debug)]
pub struct SourceRules {
    include: KeywordSet,
    exclude: KeywordSet,
    cutoff: NaiveDate,
}

impl SourceRules {
    pub fn new(source: &SourceConfig, ctx: &ScrapeContext) -> Result<Self, Box<dyn Error>> {
        let days = source.days_back.unwrap_or(ctx.config.days_back);
        Ok(Self {
            include: KeywordSet::new(&source.include)?,
            exclude: KeywordSet::new(&source.exclude)?,
            cutoff: window_start(ctx.today, days),
        })
    }

    /// `YYYY-MM-DD` of the oldest day still inside the window.
    pub fn cutoff(&self) -> NaiveDate {
        self.cutoff
    }
}

/// Apply the shared pipeline to a source's raw items.
pub fn finalize(source: &SourceConfig, rules: &SourceRules, items: Vec<RawItem>) -> Vec<Article> {
    let mut deduper = Deduper::new();
    let mut articles = Vec::new();
    let (mut irrelevant, mut stale, mut duplicates) = (0usize, 0usize, 0usize);

    for item in items {
        let title = normalize_whitespace(&item.title);
        if title.is_empty() || item.url.trim().is_empty() {
            continue;
        }
        let summary = truncate_summary(&normalize_whitespace(&item.text));

        let text = format!("{title} {summary}");
        if !is_relevant(&text, &rules.include, &rules.exclude) {
            irrelevant += 1;
            continue;
        }
        if item.date.is_some_and(|d| d < rules.cutoff) {
            stale += 1;
            continue;
        }

        let article = Article {
            country: source.country.clone(),
            source: source.name.clone(),
            status: item.status.or_else(|| extract_status(&text)),
            category: source.category,
            title,
            date_iso: item.date.map(|d| d.to_string()).unwrap_or_default(),
            summary,
            url: item.url.trim().to_string(),
        };
        if !deduper.admit(&article) {
            duplicates += 1;
            continue;
        }
        articles.push(article);
    }

    debug!(
        source = %source.name,
        kept = articles.len(),
        irrelevant,
        stale,
        duplicates,
        "Filtered source items"
    );
    articles
}

/// Scrape one source end to end.
#[instrument(level = "info", skip_all, fields(source = %source.name, kind = source.kind.name()))]
pub async fn scrape_source(ctx: &ScrapeContext, source: &SourceConfig) -> Result<Vec<Article>, Box<dyn Error>> {
    let rules = SourceRules::new(source, ctx)?;
    let items = match &source.kind {
        SourceKind::Wordpress { base_url } => wordpress::collect(ctx, base_url, rules.cutoff()).await?,
        SourceKind::Rss { feeds } => rss::collect(ctx, feeds).await?,
        SourceKind::Html {
            listing_urls,
            item_selector,
            link_selector,
            summary_selector,
            date_selector,
            content_selector,
            article_date_selector,
        } => {
            let selectors = html::Selectors::parse(
                item_selector,
                link_selector,
                summary_selector.as_deref(),
                date_selector.as_deref(),
            )?
            .with_article(content_selector.as_deref(), article_date_selector.as_deref())?;
            html::collect(ctx, listing_urls, &selectors).await?
        }
    };
    let discovered = items.len();
    let articles = finalize(source, &rules, items);
    info!(discovered, kept = articles.len(), "Scraped source");
    Ok(articles)
}

/// `<out_dir>/<slug of the source name>.csv`
pub fn source_csv_path(out_dir: &str, name: &str) -> PathBuf {
    Path::new(out_dir).join(format!("{}.csv", slugify(name)))
}

/// Turn one source's result into its report, writing the CSV when there
/// is something to write.
async fn record(source: &SourceConfig, result: Result<Vec<Article>, Box<dyn Error>>, out_dir: &str) -> SourceReport {
    let mut report = SourceReport {
        name: source.name.clone(),
        kind: source.kind.name(),
        articles: 0,
        path: None,
        error: None,
    };
    match result {
        Ok(articles) if articles.is_empty() => {
            warn!(source = %source.name, "Source produced no articles");
        }
        Ok(articles) => {
            let path = source_csv_path(out_dir, &source.name);
            report.articles = articles.len();
            match write_articles(&path, &articles).await {
                Ok(()) => report.path = Some(path.display().to_string()),
                Err(e) => {
                    error!(source = %source.name, error = %e, "Failed to write source CSV");
                    report.error = Some(e.to_string());
                }
            }
        }
        Err(e) => {
            error!(source = %source.name, error = %e, "Source failed; skipping");
            report.error = Some(e.to_string());
        }
    }
    report
}

/// Scrape every source concurrently and write one CSV per source into `out_dir`.
#[instrument(level = "info", skip_all, fields(sources = sources.len(), out_dir = %out_dir))]
pub async fn scrape_all(ctx: &ScrapeContext, sources: &[SourceConfig], out_dir: &str) -> Vec<SourceReport> {
    let concurrency = ctx.config.concurrency.max(1);
    let reports: Vec<SourceReport> = stream::iter(sources)
        .map(|source| async move { record(source, scrape_source(ctx, source).await, out_dir).await })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    let total: usize = reports.iter().map(|r| r.articles).sum();
    info!(sources = reports.len(), failed, articles = total, "Scrape complete");
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::outputs::csv::read_articles;
    use test_server::{serve, Route};

    fn source(include: &[&str], exclude: &[&str]) -> SourceConfig {
        SourceConfig {
            name: "Kenya National Highways Authority".to_string(),
            country: "Kenya".to_string(),
            category: Some(Category::Highway),
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
            days_back: None,
            kind: SourceKind::Wordpress {
                base_url: "https://kenha.co.ke".to_string(),
            },
        }
    }

    fn ctx() -> ScrapeContext {
        ScrapeContext::new(ScrapeConfig::default(), NaiveDate::from_ymd_opt(2025, 10, 25).unwrap()).unwrap()
    }

    fn item(title: &str, url: &str, date: Option<&str>) -> RawItem {
        RawItem {
            title: title.to_string(),
            url: url.to_string(),
            date: date.and_then(parse_date),
            text: format!("{title}. Works on the corridor continue this quarter."),
            status: None,
        }
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 10, 23);
        assert_eq!(parse_date("2025-10-23T09:30:00"), expected);
        assert_eq!(parse_date("2025-10-23T09:30:00+02:00"), expected);
        assert_eq!(parse_date("Thu, 23 Oct 2025 09:30:00 +0200"), expected);
        assert_eq!(parse_date("2025-10-23"), expected);
        assert_eq!(parse_date("23 October 2025"), expected);
        assert_eq!(parse_date("Oct 23, 2025"), expected);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("  "), None);
    }

    #[test]
    fn test_date_from_url() {
        assert_eq!(
            date_from_url("https://www.engineeringnews.co.za/article/new-berth-2025-10-20"),
            NaiveDate::from_ymd_opt(2025, 10, 20)
        );
        assert_eq!(
            date_from_url("https://constructionkenya.com/2025/09/30/bypass-works/"),
            NaiveDate::from_ymd_opt(2025, 9, 30)
        );
        assert_eq!(date_from_url("https://example.com/news/item-42"), None);
    }

    #[test]
    fn test_finalize_filters_and_fills() {
        let src = source(&["road", "bypass", "bridge"], &["vacancy"]);
        let rules = SourceRules::new(&src, &ctx()).unwrap();
        let items = vec![
            item("Kisumu bypass construction underway", "https://kenha.co.ke/1", Some("2025-10-20")),
            item("Vacancy: bridge inspector", "https://kenha.co.ke/2", Some("2025-10-20")),
            item("Board approves annual budget", "https://kenha.co.ke/3", Some("2025-10-20")),
            item("Old road contract awarded", "https://kenha.co.ke/4", Some("2025-08-01")),
            item("Kisumu  bypass construction underway", "https://kenha.co.ke/5", None),
            item("Undated bridge handed over and opened", "https://kenha.co.ke/6", None),
        ];

        let articles = finalize(&src, &rules, items);
        let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Kisumu bypass construction underway", "Undated bridge handed over and opened"]
        );

        assert_eq!(articles[0].date_iso, "2025-10-20");
        assert_eq!(articles[0].status, Some(Status::Ongoing));
        assert_eq!(articles[0].category, Some(Category::Highway));
        assert_eq!(articles[0].country, "Kenya");
        assert_eq!(articles[1].date_iso, "");
        assert_eq!(articles[1].status, Some(Status::Completed));
    }

    #[test]
    fn test_finalize_prefers_item_status_and_clips_summary() {
        let src = source(&[], &[]);
        let rules = SourceRules::new(&src, &ctx()).unwrap();
        let mut raw = item("Bridge project", "https://kenha.co.ke/1", Some("2025-10-20"));
        raw.status = Some(Status::Planned);
        raw.text = "word ".repeat(200);

        let articles = finalize(&src, &rules, vec![raw]);
        assert_eq!(articles[0].status, Some(Status::Planned));
        assert_eq!(articles[0].summary.chars().count(), 300);
    }

    #[test]
    fn test_days_back_override() {
        let mut src = source(&[], &[]);
        src.days_back = Some(7);
        let rules = SourceRules::new(&src, &ctx()).unwrap();
        assert_eq!(rules.cutoff(), NaiveDate::from_ymd_opt(2025, 10, 18).unwrap());

        src.days_back = Some(i64::MAX);
        let rules = SourceRules::new(&src, &ctx()).unwrap();
        assert_eq!(rules.cutoff(), NaiveDate::MIN);
    }

    fn html_source(name: &str, listing_urls: &[&str]) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            country: "Ghana".to_string(),
            category: None,
            include: Vec::new(),
            exclude: Vec::new(),
            days_back: None,
            kind: SourceKind::Html {
                listing_urls: listing_urls.iter().map(|s| s.to_string()).collect(),
                item_selector: "article".to_string(),
                link_selector: "a[href]".to_string(),
                summary_selector: None,
                date_selector: None,
                content_selector: None,
                article_date_selector: None,
            },
        }
    }

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>SAnews</title>
  <item>
    <title>Transnet awards Durban container terminal contract</title>
    <link>https://www.sanews.gov.za/south-africa/transnet-durban-terminal</link>
    <pubDate>Thu, 23 Oct 2025 09:30:00 +0200</pubDate>
    <description>The terminal expansion adds 1.1 million TEU of capacity.</description>
  </item>
</channel></rss>"#;

    #[test]
    fn test_source_csv_path() {
        assert_eq!(
            source_csv_path("data/sources", "Kenya National Highways Authority"),
            Path::new("data/sources/kenya-national-highways-authority.csv")
        );
        assert_eq!(
            source_csv_path("out", "L'Economiste du Faso"),
            Path::new("out/l-economiste-du-faso.csv")
        );
    }

    #[tokio::test]
    async fn test_scrape_all_isolates_failures() {
        let base = serve(vec![Route::ok("/feed", FEED)]).await;
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().to_str().unwrap();

        let mut sanews = html_source("SAnews", &[]);
        sanews.country = "South Africa".to_string();
        sanews.kind = SourceKind::Rss {
            feeds: vec![format!("{base}/feed")],
        };
        let sources = vec![
            html_source("Broken Portal", &["not a url"]),
            html_source("Quiet Portal", &[]),
            sanews,
        ];

        let mut reports = scrape_all(&ctx(), &sources, out_dir).await;
        reports.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(reports.len(), 3);

        let broken = &reports[0];
        assert_eq!(broken.name, "Broken Portal");
        assert_eq!(broken.kind, "html");
        assert!(broken.error.is_some());
        assert!(broken.path.is_none());

        let quiet = &reports[1];
        assert!(quiet.error.is_none());
        assert_eq!(quiet.articles, 0);
        assert!(quiet.path.is_none());

        let ok = &reports[2];
        assert!(ok.error.is_none());
        assert_eq!(ok.articles, 1);
        let path = source_csv_path(out_dir, "SAnews");
        assert_eq!(ok.path.as_deref(), Some(path.display().to_string().as_str()));

        let rows = read_articles(&path).await.unwrap();
        assert_eq!(rows[0].country, "South Africa");
        assert_eq!(rows[0].date_iso, "2025-10-23");

        assert!(!source_csv_path(out_dir, "Broken Portal").exists());
        assert!(!source_csv_path(out_dir, "Quiet Portal").exists());
    }
}
