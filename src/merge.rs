//! Merging per-source CSVs into one deduplicated dataset.
//!
//! Files are read in sorted path order and the first occurrence of an
//! article wins. An article is a duplicate when its normalized URL **or**
//! its normalized title has been seen before; the same outlet often
//! republishes a story under a new URL, and aggregators link the same URL
//! under different headlines.

use crate::models::Article;
use crate::outputs::csv::read_articles;
use crate::utils::window_start;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};
use url::Url;
use walkdir::WalkDir;

/// Canonical form of a URL for duplicate detection.
///
/// Drops the fragment and any trailing `/`; scheme and host come out
/// lowercased from the parser. Unparseable input is only trimmed.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let normalized = match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => trimmed.to_string(),
    };
    normalized.trim_end_matches('/').to_string()
}

/// Canonical form of a title: trimmed, whitespace collapsed, lowercased.
pub fn normalize_title(raw: &str) -> String {
    crate::utils::normalize_whitespace(raw).to_lowercase()
}

/// Tracks seen URLs and titles.
#[derive(Debug, Default)]
pub struct Deduper {
    urls: HashSet<String>,
    titles: HashSet<String>,
}

impl Deduper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `article` and return true if neither its URL nor its title
    /// was seen before. Empty keys never collide.
    pub fn admit(&mut self, article: &Article) -> bool {
        let url = normalize_url(&article.url);
        let title = normalize_title(&article.title);
        if (!url.is_empty() && self.urls.contains(&url))
            || (!title.is_empty() && self.titles.contains(&title))
        {
            return false;
        }
        if !url.is_empty() {
            self.urls.insert(url);
        }
        if !title.is_empty() {
            self.titles.insert(title);
        }
        true
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MergeOptions {
    /// Keep only articles from the last `days` days (undated rows are kept).
    pub days: Option<i64>,
    pub today: NaiveDate,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct MergeStats {
    pub files: usize,
    pub rows_read: usize,
    /// Rows with neither a title nor a URL.
    pub empty: usize,
    pub duplicates: usize,
    pub out_of_window: usize,
    pub kept: usize,
}

/// Merge already-loaded per-source rows, in the order given.
///
/// The result is sorted newest first, undated rows last; ties keep input order.
pub fn merge_articles(sources: Vec<Vec<Article>>, options: &MergeOptions) -> (Vec<Article>, MergeStats) {
    let cutoff = options.days.map(|d| window_start(options.today, d));
    let mut stats = MergeStats {
        files: sources.len(),
        ..MergeStats::default()
    };
    let mut deduper = Deduper::new();
    let mut merged = Vec::new();

    for article in sources.into_iter().flatten() {
        stats.rows_read += 1;
        if article.title.trim().is_empty() && article.url.trim().is_empty() {
            stats.empty += 1;
            continue;
        }
        if let (Some(cutoff), Some(date)) = (cutoff, article.date()) {
            if date < cutoff {
                stats.out_of_window += 1;
                continue;
            }
        }
        if !deduper.admit(&article) {
            debug!(url = %article.url, title = %article.title, "Duplicate article");
            stats.duplicates += 1;
            continue;
        }
        merged.push(article);
    }

    merged.sort_by(|a, b| b.date().cmp(&a.date()));
    stats.kept = merged.len();
    (merged, stats)
}

/// All `*.csv` files under `dir`, sorted, excluding `exclude` (the output file).
pub fn find_csv_files(dir: &Path, exclude: &Path) -> Vec<PathBuf> {
    let excluded = exclude.canonicalize().ok();
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                warn!(error = %err, "Skipping unreadable directory entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
        .filter(|p| excluded.is_none() || p.canonicalize().ok() != excluded)
        .collect();
    files.sort();
    files
}

/// Merge every CSV under `input_dir` into `output`.
///
/// A missing input directory is an error. When no source file could be
/// read, an existing non-empty `output` is left untouched and an error is
/// returned instead of replacing it with an empty dataset.
#[instrument(level = "info", skip_all, fields(input_dir = %input_dir.display(), output = %output.display()))]
pub async fn merge_dir(
    input_dir: &Path,
    output: &Path,
    options: &MergeOptions,
) -> Result<MergeStats, Box<dyn Error>> {
    match fs::metadata(input_dir).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(format!("merge input {} is not a directory", input_dir.display()).into()),
        Err(e) => {
            error!(error = %e, "Cannot read merge input directory");
            return Err(format!("cannot read merge input {}: {e}", input_dir.display()).into());
        }
    }

    let files = find_csv_files(input_dir, output);
    info!(files = files.len(), "Found source CSVs");

    let mut sources = Vec::with_capacity(files.len());
    for file in &files {
        match read_articles(file).await {
            Ok(rows) => sources.push(rows),
            Err(e) => warn!(path = %file.display(), error = %e, "Failed to read source CSV; skipping"),
        }
    }

    if sources.is_empty() && fs::try_exists(output).await? {
        let existing = read_articles(output).await?;
        if !existing.is_empty() {
            error!(rows = existing.len(), "No readable source CSVs; keeping existing dataset");
            return Err(format!(
                "no readable CSVs under {}; refusing to overwrite {} ({} rows)",
                input_dir.display(),
                output.display(),
                existing.len()
            )
            .into());
        }
    }

    let (merged, stats) = merge_articles(sources, options);
    crate::outputs::csv::write_articles(output, &merged).await?;
    info!(
        files = stats.files,
        rows_read = stats.rows_read,
        empty = stats.empty,
        duplicates = stats.duplicates,
        out_of_window = stats.out_of_window,
        kept = stats.kept,
        "Merge complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::article;
    use crate::outputs::csv::write_articles;

    fn options(days: Option<i64>) -> MergeOptions {
        MergeOptions {
            days,
            today: NaiveDate::from_ymd_opt(2025, 10, 25).unwrap(),
        }
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url(" HTTPS://Kenha.co.ke/news/item/#comments "),
            "https://kenha.co.ke/news/item"
        );
        assert_eq!(normalize_url("https://kenha.co.ke/"), "https://kenha.co.ke");
        assert_eq!(normalize_url("/relative/path/"), "/relative/path");
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Lamu  Port\nExpansion "), "lamu port expansion");
    }

    #[test]
    fn test_dedup_by_url_or_title() {
        let first = article("A", "Lamu port expansion", "https://a.com/1");
        let same_url = article("B", "Different headline", "https://a.com/1/");
        let same_title = article("C", "LAMU PORT  expansion", "https://c.com/9");
        let fresh = article("D", "Kisumu bypass", "https://d.com/2");

        let (merged, stats) = merge_articles(
            vec![vec![first, same_url], vec![same_title, fresh]],
            &options(None),
        );
        let titles: Vec<&str> = merged.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Lamu port expansion", "Kisumu bypass"]);
        assert_eq!(stats.files, 2);
        assert_eq!(stats.rows_read, 4);
        assert_eq!(stats.duplicates, 2);
        assert_eq!(stats.kept, 2);
    }

    #[test]
    fn test_empty_keys_do_not_collide() {
        let a = article("A", "First untitled link", "");
        let b = article("B", "Second untitled link", "");
        let c = article("C", "", "");

        let (merged, stats) = merge_articles(vec![vec![a, b, c]], &options(None));
        assert_eq!(merged.len(), 2);
        assert_eq!(stats.empty, 1);
        assert_eq!(stats.duplicates, 0);
    }

    #[test]
    fn test_date_window_and_sorting() {
        let mut old = article("A", "Old", "https://a.com/old");
        old.date_iso = "2025-08-01".to_string();
        let mut undated = article("A", "Undated", "https://a.com/u");
        undated.date_iso = String::new();
        let mut mid = article("A", "Mid", "https://a.com/m");
        mid.date_iso = "2025-10-10".to_string();
        let mut new = article("A", "New", "https://a.com/n");
        new.date_iso = "2025-10-24".to_string();

        let (merged, stats) = merge_articles(vec![vec![old, undated, mid, new]], &options(Some(30)));
        let titles: Vec<&str> = merged.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["New", "Mid", "Undated"]);
        assert_eq!(stats.out_of_window, 1);
    }

    #[test]
    fn test_huge_window_keeps_everything() {
        let mut old = article("A", "Old", "https://a.com/old");
        old.date_iso = "1901-01-01".to_string();
        let new = article("A", "New", "https://a.com/n");

        let (merged, stats) = merge_articles(vec![vec![old, new]], &options(Some(100_000_000_000)));
        assert_eq!(merged.len(), 2);
        assert_eq!(stats.out_of_window, 0);

        let (merged, _) = merge_articles(vec![merged], &options(Some(i64::MAX)));
        assert_eq!(merged.len(), 2);
    }

    #[tokio::test]
    async fn test_merge_dir_excludes_output_and_recurses() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_articles(root.join("kenya/kenha.csv"), &[article("KeNHA", "Bridge", "https://k/1")])
            .await
            .unwrap();
        write_articles(
            root.join("ghana/gna.csv"),
            &[article("GNA", "Port", "https://g/1"), article("GNA", "Bridge", "https://g/2")],
        )
        .await
        .unwrap();
        std::fs::write(root.join("notes.txt"), "ignore me").unwrap();

        let output = root.join("combined_data.csv");
        let stats = merge_dir(root, &output, &options(None)).await.unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.kept, 2);
        assert_eq!(stats.duplicates, 1);

        // Running again must not read the previous output as a source
        let again = merge_dir(root, &output, &options(None)).await.unwrap();
        assert_eq!(again, stats);

        let merged = read_articles(&output).await.unwrap();
        // ghana/ sorts before kenya/, so GNA's "Bridge" wins
        assert!(merged.iter().any(|a| a.source == "GNA" && a.title == "Bridge"));
    }

    #[tokio::test]
    async fn test_missing_input_dir_keeps_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("combined_data.csv");
        write_articles(&output, &[article("KeNHA", "Bridge", "https://k/1")]).await.unwrap();

        let result = merge_dir(&dir.path().join("typo_dir"), &output, &options(None)).await;
        assert!(result.is_err());
        assert_eq!(read_articles(&output).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_dir_keeps_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("sources");
        std::fs::create_dir(&input).unwrap();
        let output = dir.path().join("combined_data.csv");
        write_articles(&output, &[article("KeNHA", "Bridge", "https://k/1")]).await.unwrap();

        let err = merge_dir(&input, &output, &options(None)).await.unwrap_err();
        assert!(err.to_string().contains("refusing to overwrite"));
        assert_eq!(read_articles(&output).await.unwrap().len(), 1);

        // Nothing to protect: an empty merge still writes a header-only file
        let fresh = dir.path().join("fresh.csv");
        let stats = merge_dir(&input, &fresh, &options(None)).await.unwrap();
        assert_eq!(stats.kept, 0);
        assert!(fresh.exists());
    }
}
