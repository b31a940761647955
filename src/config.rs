//! YAML configuration: LLM settings, categorization policy, scraping
//! defaults, the source list, and default paths.
//!
//! Every field has a default so a missing or partial `config.yaml` still
//! yields a usable configuration. A fully annotated example lives in
//! `config.example.yaml` at the repository root.

use crate::models::Category;
use serde::Deserialize;
use std::error::Error;
use std::path::Path;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub categorize: CategorizeConfig,
    pub scrape: ScrapeConfig,
    pub paths: PathsConfig,
    pub sources: Vec<SourceConfig>,
}

/// Settings for the Anthropic Messages API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    /// Usually supplied through `ANTHROPIC_API_KEY` instead.
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Backoff retries around a failing API call.
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.anthropic.com/v1".to_string(),
            api_key: None,
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 2000,
            temperature: 0.2,
            max_retries: 3,
            base_delay_ms: 1000,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CategorizeConfig {
    /// Articles per model request.
    pub batch_size: usize,
    /// Batches in flight at once. 1 keeps requests strictly sequential.
    pub concurrency: usize,
    /// Requests per batch when the answer holds no JSON array.
    pub max_attempts: usize,
    /// Sources whose pre-filled categories are re-assigned anyway.
    pub force_recategorize_sources: Vec<String>,
    pub drop_non_infra: bool,
}

impl Default for CategorizeConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            concurrency: 1,
            max_attempts: 3,
            force_recategorize_sources: vec!["L'Economiste du Faso".to_string()],
            drop_non_infra: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub days_back: i64,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Sources scraped at once.
    pub concurrency: usize,
    /// Pause between paginated requests to the same site.
    pub page_delay_ms: u64,
    /// Several government portals serve broken certificate chains.
    pub accept_invalid_certs: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            days_back: 30,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36"
                .to_string(),
            timeout_secs: 30,
            concurrency: 4,
            page_delay_ms: 500,
            accept_invalid_certs: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding one CSV per source.
    pub scrape_dir: String,
    /// The merged dataset.
    pub dataset: String,
    /// Where `report.md` and `stats.json` go.
    pub report_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            scrape_dir: "data/sources".to_string(),
            dataset: "data/combined_data.csv".to_string(),
            report_dir: "data/report".to_string(),
        }
    }
}

/// One configured news source.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub country: String,
    /// Pre-filled category for specialized sources (e.g. a highways authority).
    #[serde(default)]
    pub category: Option<Category>,
    /// At least one must match for an article to be kept. Empty keeps all.
    #[serde(default)]
    pub include: Vec<String>,
    /// Any match drops the article.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Overrides `scrape.days_back` for this source.
    #[serde(default)]
    pub days_back: Option<i64>,
    #[serde(flatten)]
    pub kind: SourceKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceKind {
    /// WordPress REST API (`/wp-json/wp/v2/posts`).
    Wordpress { base_url: String },
    /// RSS 2.0 feeds.
    Rss { feeds: Vec<String> },
    /// Plain HTML listing pages read with CSS selectors.
    Html {
        listing_urls: Vec<String>,
        item_selector: String,
        link_selector: String,
        #[serde(default)]
        summary_selector: Option<String>,
        #[serde(default)]
        date_selector: Option<String>,
        /// Article body on each linked page. Setting this or
        /// `article_date_selector` makes every article page be fetched.
        #[serde(default)]
        content_selector: Option<String>,
        #[serde(default)]
        article_date_selector: Option<String>,
    },
}

impl SourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Wordpress { .. } => "wordpress",
            SourceKind::Rss { .. } => "rss",
            SourceKind::Html { .. } => "html",
        }
    }
}

impl Config {
    /// Parse a configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, Box<dyn Error>> {
        // An empty document deserializes as null; treat it as all defaults
        if text.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load configuration from `path`.
    ///
    /// A missing file is not an error: defaults are returned and a warning
    /// is logged, so `categorize`, `merge` and `query` work without one.
    #[instrument(level = "info")]
    pub async fn load(path: &str) -> Result<Self, Box<dyn Error>> {
        if !Path::new(path).exists() {
            warn!(path, "Config file not found; using defaults");
            return Ok(Config::default());
        }
        let text = tokio::fs::read_to_string(path).await?;
        let config = Config::from_yaml(&text)?;
        info!(path, sources = config.sources.len(), "Loaded configuration");
        Ok(config)
    }
}
