//! CSV reading and writing for article datasets.
//!
//! Every file this crate writes uses the header from
//! [`CSV_HEADERS`](crate::models::CSV_HEADERS) and standard quoting, so
//! titles and summaries keep their commas. Reading is tolerant: extra
//! columns are ignored, missing optional columns default, and rows that fail
//! to decode are logged and skipped.

use crate::models::Article;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

/// Parse articles from CSV text. `origin` only labels log lines.
pub fn parse_articles(data: &str, origin: &str) -> Result<Vec<Article>, Box<dyn Error>> {
    let mut reader = ::csv::ReaderBuilder::new()
        .flexible(true)
        .trim(::csv::Trim::Headers)
        .from_reader(data.as_bytes());

    let mut articles = Vec::new();
    let mut skipped = 0usize;
    for (i, record) in reader.deserialize::<Article>().enumerate() {
        match record {
            Ok(article) => articles.push(article),
            Err(e) => {
                skipped += 1;
                // +2: header line, 1-based
                warn!(origin, line = i + 2, error = %e, "Skipping undecodable CSV row");
            }
        }
    }
    if skipped > 0 {
        warn!(origin, skipped, "Some rows were skipped");
    }
    Ok(articles)
}

/// Serialize articles to CSV text, header included even when empty.
pub fn articles_to_csv(articles: &[Article]) -> Result<String, Box<dyn Error>> {
    let mut writer = ::csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(crate::models::CSV_HEADERS)?;
    for article in articles {
        writer.serialize(article)?;
    }
    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    Ok(String::from_utf8(bytes)?)
}

/// Read a dataset from disk.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub async fn read_articles(path: impl AsRef<Path>) -> Result<Vec<Article>, Box<dyn Error>> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).await?;
    let articles = parse_articles(&data, &path.display().to_string())?;
    info!(count = articles.len(), "Read articles");
    Ok(articles)
}

/// Write a dataset to disk, creating parent directories as needed.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display(), count = articles.len()))]
pub async fn write_articles(path: impl AsRef<Path>, articles: &[Article]) -> Result<(), Box<dyn Error>> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let data = articles_to_csv(articles)?;
    fs::write(path, data).await?;
    info!("Wrote CSV");
    Ok(())
}
