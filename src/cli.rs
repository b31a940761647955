//! Command-line interface definitions for infra_news.
//!
//! This module defines the subcommands and options using the `clap` crate.
//! Secrets can be provided via environment variables; paths default to the
//! `paths` section of `config.yaml`.

use crate::models::Category;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Collect, merge and categorize African infrastructure news.
///
/// # Examples
///
/// ```sh
/// # Full pipeline with the sources in config.yaml
/// infra_news run
///
/// # Scrape two sources only
/// infra_news scrape --source "Kenya National Highways Authority" --source SAnews
///
/// # Categorize without network access
/// infra_news categorize --offline
///
/// # Ghanaian port and rail news since October
/// infra_news query --country Ghana --category port --category rail --since 2025-10-01
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to config.yaml
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: String,

    /// Anthropic API key (overrides `llm.api_key` in the config)
    #[arg(long, global = true, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run configured sources and write one CSV per source
    Scrape(ScrapeArgs),
    /// Combine per-source CSVs into one deduplicated dataset
    Merge(MergeArgs),
    /// Assign categories to rows that need them
    Categorize(CategorizeArgs),
    /// Write summary statistics as Markdown and JSON
    Report(ReportArgs),
    /// Filter the dataset and print the matching rows
    Query(QueryArgs),
    /// scrape, merge, categorize and report in one go
    Run(RunArgs),
}

#[derive(Args, Debug, Default)]
pub struct ScrapeArgs {
    /// Only run sources with this name (repeatable)
    #[arg(short, long = "source")]
    pub sources: Vec<String>,

    /// Directory for per-source CSVs [default: paths.scrape_dir]
    #[arg(short, long)]
    pub output_dir: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct MergeArgs {
    /// Directory searched recursively for CSVs [default: paths.scrape_dir]
    #[arg(short, long)]
    pub input_dir: Option<String>,

    /// Merged dataset path [default: paths.dataset]
    #[arg(short, long)]
    pub output: Option<String>,

    /// Keep only articles from the last N days
    #[arg(short, long, value_parser = clap::value_parser!(i64).range(0..))]
    pub days: Option<i64>,
}

#[derive(Args, Debug, Default)]
pub struct CategorizeArgs {
    /// Dataset to categorize [default: paths.dataset]
    #[arg(short, long)]
    pub input: Option<String>,

    /// Where to write the result [default: overwrite the input]
    #[arg(short, long)]
    pub output: Option<String>,

    /// Use keyword rules instead of the language model
    #[arg(long)]
    pub offline: bool,

    /// Keep rows categorized as NonInfra
    #[arg(long)]
    pub keep_non_infra: bool,
}

#[derive(Args, Debug, Default)]
pub struct ReportArgs {
    /// Dataset to summarize [default: paths.dataset]
    #[arg(short, long)]
    pub input: Option<String>,

    /// Directory for report.md and stats.json [default: paths.report_dir]
    #[arg(short, long)]
    pub output_dir: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub scrape: ScrapeArgs,

    /// Keep only articles from the last N days when merging
    #[arg(short, long, value_parser = clap::value_parser!(i64).range(0..))]
    pub days: Option<i64>,

    /// Use keyword rules instead of the language model
    #[arg(long)]
    pub offline: bool,

    /// Keep rows categorized as NonInfra
    #[arg(long)]
    pub keep_non_infra: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Markdown table
    #[default]
    Table,
    Json,
    Csv,
}

#[derive(Args, Debug, Default)]
pub struct QueryArgs {
    /// Dataset to read [default: paths.dataset]
    #[arg(short, long)]
    pub input: Option<String>,

    /// Country to include (repeatable)
    #[arg(long = "country")]
    pub countries: Vec<String>,

    /// Category to include (repeatable), e.g. port, "smart city", SEZ
    #[arg(long = "category", value_parser = parse_category)]
    pub categories: Vec<Category>,

    /// Case-insensitive text to find in the title or summary
    #[arg(short, long)]
    pub search: Option<String>,

    /// Earliest date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<NaiveDate>,

    /// Latest date, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub until: Option<NaiveDate>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

fn parse_category(raw: &str) -> Result<Category, String> {
    raw.parse()
}
