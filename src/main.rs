//! # infra_news
//!
//! A news pipeline for African infrastructure projects. It scrapes
//! government portals, news outlets and trade sites, merges everything into
//! one deduplicated CSV dataset, and categorizes each article into a fixed
//! taxonomy with a language model (or offline keyword rules).
//!
//! ## Features
//!
//! - Config-driven sources: WordPress REST API, RSS feeds, and HTML listing
//!   pages read with CSS selectors
//! - Keyword relevance filtering and project status extraction per source
//! - Merge with URL/title deduplication and an optional date window
//! - Batch categorization through the Anthropic Messages API, tolerant of
//!   malformed and truncated replies
//! - Markdown + JSON reports and a filtering `query` command
//!
//! ## Usage
//!
//! ```sh
//! infra_news run
//! infra_news query --country Kenya --category highway
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Scraping**: Each source writes `data/sources/<source>.csv`
//! 2. **Merging**: Per-source CSVs become `data/combined_data.csv`
//! 3. **Categorizing**: Rows without a category are sent to the model in batches
//! 4. **Reporting**: Statistics go to `data/report/report.md` and `stats.json`

use chrono::Local;
use clap::Parser;
use serde::Serialize;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod api;
mod categorize;
mod classify;
mod cli;
mod config;
mod merge;
mod models;
mod outputs;
mod query;
mod report;
mod scrapers;
mod utils;

use api::client_with_backoff;
use categorize::{categorize_offline, categorize_with_model, CategorizeStats};
use cli::{CategorizeArgs, Cli, Command, MergeArgs, OutputFormat, QueryArgs, ReportArgs, ScrapeArgs};
use config::{Config, SourceConfig};
use merge::{merge_dir, MergeOptions, MergeStats};
use outputs::csv::{articles_to_csv, read_articles, write_articles};
use outputs::{json, markdown};
use query::Filter;
use report::Stats;
use scrapers::{scrape_all, ScrapeContext, SourceReport};
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("infra_news starting up");

    let args = Cli::parse();
    debug!(config = %args.config, command = ?args.command, "Parsed CLI arguments");

    let config = Config::load(&args.config).await?;
    let api_key = args.api_key.clone().or_else(|| config.llm.api_key.clone());

    match args.command {
        Command::Scrape(a) => {
            scrape(&config, &a).await?;
        }
        Command::Merge(a) => {
            merge(&config, &a).await?;
        }
        Command::Categorize(a) => {
            categorize(&config, api_key.as_deref(), &a).await?;
        }
        Command::Report(a) => {
            report(&config, &a).await?;
        }
        Command::Query(a) => query(&config, &a).await?,
        Command::Run(a) => {
            // ---- Scrape ----
            let reports = scrape(&config, &a.scrape).await?;
            let failed = reports.iter().filter(|r| r.error.is_some()).count();

            // ---- Merge ----
            let merge_args = MergeArgs {
                input_dir: a.scrape.output_dir.clone(),
                output: None,
                days: a.days,
            };
            let merged = merge(&config, &merge_args).await?;

            // ---- Categorize ----
            let categorize_args = CategorizeArgs {
                offline: a.offline,
                keep_non_infra: a.keep_non_infra,
                ..CategorizeArgs::default()
            };
            let categorized = categorize(&config, api_key.as_deref(), &categorize_args).await?;

            // ---- Report ----
            report(&config, &ReportArgs::default()).await?;

            info!(
                sources = reports.len(),
                failed_sources = failed,
                merged = merged.kept,
                removed_non_infra = categorized.removed,
                "Pipeline complete"
            );
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Sources named in `names` (case-insensitive), or all when empty.
fn select_sources(sources: &[SourceConfig], names: &[String]) -> Vec<SourceConfig> {
    if names.is_empty() {
        return sources.to_vec();
    }
    for name in names {
        if !sources.iter().any(|s| s.name.eq_ignore_ascii_case(name)) {
            warn!(%name, "No configured source with this name");
        }
    }
    sources
        .iter()
        .filter(|s| names.iter().any(|n| s.name.eq_ignore_ascii_case(n)))
        .cloned()
        .collect()
}

#[instrument(level = "info", skip_all)]
async fn scrape(config: &Config, args: &ScrapeArgs) -> Result<Vec<SourceReport>, Box<dyn Error>> {
    let out_dir = args.output_dir.as_deref().unwrap_or(&config.paths.scrape_dir);

    // Early check: ensure the scrape dir is writable
    if let Err(e) = ensure_writable_dir(out_dir).await {
        error!(path = %out_dir, error = %e, "Scrape directory is not writable");
        return Err(e);
    }

    let sources = select_sources(&config.sources, &args.sources);
    if sources.is_empty() {
        warn!(config_sources = config.sources.len(), "No sources to scrape");
        return Ok(Vec::new());
    }

    let ctx = ScrapeContext::new(config.scrape.clone(), Local::now().date_naive())?;
    let reports = scrape_all(&ctx, &sources, out_dir).await;
    for r in &reports {
        match (&r.path, &r.error) {
            (_, Some(e)) => warn!(source = %r.name, kind = r.kind, error = %e, "Source failed"),
            (Some(path), None) => info!(source = %r.name, articles = r.articles, %path, "Wrote source CSV"),
            (None, None) => info!(source = %r.name, "No CSV written"),
        }
    }
    Ok(reports)
}

#[instrument(level = "info", skip_all)]
async fn merge(config: &Config, args: &MergeArgs) -> Result<MergeStats, Box<dyn Error>> {
    let input_dir = args.input_dir.as_deref().unwrap_or(&config.paths.scrape_dir);
    let output = args.output.as_deref().unwrap_or(&config.paths.dataset);
    let options = MergeOptions {
        days: args.days,
        today: Local::now().date_naive(),
    };
    merge_dir(Path::new(input_dir), Path::new(output), &options).await
}

#[instrument(level = "info", skip_all, fields(offline = args.offline))]
async fn categorize(
    config: &Config,
    api_key: Option<&str>,
    args: &CategorizeArgs,
) -> Result<CategorizeStats, Box<dyn Error>> {
    let input = args.input.as_deref().unwrap_or(&config.paths.dataset);
    let output = args.output.as_deref().unwrap_or(input);

    let mut settings = config.categorize.clone();
    if args.keep_non_infra {
        settings.drop_non_infra = false;
    }

    let mut articles = read_articles(input).await?;
    let stats = if args.offline {
        categorize_offline(&mut articles, &settings)
    } else {
        let Some(key) = api_key.filter(|k| !k.trim().is_empty()) else {
            error!("No API key; set ANTHROPIC_API_KEY or pass --offline");
            return Err("missing Anthropic API key (set ANTHROPIC_API_KEY or use --offline)".into());
        };
        let client = client_with_backoff(&config.llm, key)?;
        categorize_with_model(&mut articles, &client, &settings).await
    };

    write_articles(output, &articles).await?;
    info!(path = %output, rows = articles.len(), "Wrote categorized dataset");
    Ok(stats)
}

#[derive(Serialize)]
struct StatsSnapshot<'a> {
    generated_at: &'a str,
    #[serde(flatten)]
    stats: &'a Stats,
}

#[instrument(level = "info", skip_all)]
async fn report(config: &Config, args: &ReportArgs) -> Result<Stats, Box<dyn Error>> {
    let input = args.input.as_deref().unwrap_or(&config.paths.dataset);
    let out_dir = args.output_dir.as_deref().unwrap_or(&config.paths.report_dir);

    if let Err(e) = ensure_writable_dir(out_dir).await {
        error!(path = %out_dir, error = %e, "Report directory is not writable");
        return Err(e);
    }

    let articles = read_articles(input).await?;
    let stats = Stats::compute(&articles);
    let generated_at = Local::now().format("%Y-%m-%d %H:%M").to_string();

    // ---- Markdown output ----
    let md = markdown::report_to_markdown(&stats, &articles, &generated_at);
    let md_path = Path::new(out_dir).join("report.md");
    info!(path = %md_path.display(), "Writing Markdown");
    if let Err(e) = tokio::fs::write(&md_path, md).await {
        error!(path = %md_path.display(), error = %e, "Failed writing Markdown");
    }

    // ---- JSON output ----
    let snapshot = StatsSnapshot {
        generated_at: &generated_at,
        stats: &stats,
    };
    if let Err(e) = json::write_json(&snapshot, out_dir, "stats.json").await {
        error!(error = %e, "Failed to write stats JSON");
    }

    info!(
        total = stats.total,
        countries = stats.countries,
        sources = stats.sources,
        "Report complete"
    );
    Ok(stats)
}

#[instrument(level = "info", skip_all)]
async fn query(config: &Config, args: &QueryArgs) -> Result<(), Box<dyn Error>> {
    let input = args.input.as_deref().unwrap_or(&config.paths.dataset);
    let articles = read_articles(input).await?;

    let filter = Filter {
        countries: args.countries.clone(),
        categories: args.categories.clone(),
        search: args.search.clone(),
        since: args.since,
        until: args.until,
    };
    let rows: Vec<models::Article> = filter.apply(&articles).into_iter().cloned().collect();
    info!("Showing {} of {} records", rows.len(), articles.len());

    let out = match args.format {
        OutputFormat::Table => markdown::articles_table(&rows),
        OutputFormat::Json => serde_json::to_string_pretty(&rows)?,
        OutputFormat::Csv => articles_to_csv(&rows)?,
    };
    println!("{out}");
    Ok(())
}
