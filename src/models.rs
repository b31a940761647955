//! Data models for scraped and categorized infrastructure articles.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Article`]: One row of the dataset, as written to and read from CSV
//! - [`Category`]: The fixed taxonomy assigned by the model or keyword rules
//! - [`Status`]: Project lifecycle stage extracted from the article text
//!
//! The CSV header is `country,source,title,date_iso,summary,url,category,status`.
//! Empty `category` means the row still needs categorization.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column order of every CSV this crate writes.
pub const CSV_HEADERS: [&str; 8] = [
    "country", "source", "title", "date_iso", "summary", "url", "category", "status",
];

/// Category assigned to an article.
///
/// Serialized spellings match the taxonomy the model is prompted with
/// (`"port"`, `"SEZ"`, `"smart city"`, ...), so CSVs written by older
/// tooling read back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Category {
    #[serde(rename = "NonInfra")]
    NonInfra,
    #[serde(rename = "port")]
    Port,
    #[serde(rename = "rail")]
    Rail,
    #[serde(rename = "highway")]
    Highway,
    #[serde(rename = "SEZ")]
    Sez,
    #[serde(rename = "smart city")]
    SmartCity,
    #[serde(rename = "economic")]
    Economic,
    #[serde(rename = "energy")]
    Energy,
    #[serde(rename = "technology")]
    Technology,
    #[serde(rename = "Infrastructure")]
    Infrastructure,
}

impl Category {
    /// Every category, in taxonomy order.
    pub const ALL: [Category; 10] = [
        Category::NonInfra,
        Category::Port,
        Category::Rail,
        Category::Highway,
        Category::Sez,
        Category::SmartCity,
        Category::Economic,
        Category::Energy,
        Category::Technology,
        Category::Infrastructure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::NonInfra => "NonInfra",
            Category::Port => "port",
            Category::Rail => "rail",
            Category::Highway => "highway",
            Category::Sez => "SEZ",
            Category::SmartCity => "smart city",
            Category::Economic => "economic",
            Category::Energy => "energy",
            Category::Technology => "technology",
            Category::Infrastructure => "Infrastructure",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .copied()
            .ok_or_else(|| format!("unknown category: {wanted:?}"))
    }
}

impl TryFrom<String> for Category {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Lifecycle stage of the project an article talks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Status {
    Completed,
    Ongoing,
    Planned,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Completed => "completed",
            Status::Ongoing => "ongoing",
            Status::Planned => "planned",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "completed" => Ok(Status::Completed),
            "ongoing" | "on-going" => Ok(Status::Ongoing),
            "planned" => Ok(Status::Planned),
            other => Err(format!("unknown status: {other:?}")),
        }
    }
}

impl TryFrom<String> for Status {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A single article row.
///
/// Unknown `category`/`status` values and missing columns read as `None`
/// rather than failing the whole row.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Article {
    pub country: String,
    pub source: String,
    pub title: String,
    /// Publication date as `YYYY-MM-DD`, empty when unknown.
    #[serde(default)]
    pub date_iso: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub category: Option<Category>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub status: Option<Status>,
}

impl Article {
    /// Whether this row should be sent through categorization.
    ///
    /// Rows without a category always qualify. Rows from sources whose
    /// pre-filled categories are known to be unreliable qualify too.
    pub fn needs_categorization(&self, force_sources: &[String]) -> bool {
        self.category.is_none() || force_sources.iter().any(|s| s == &self.source)
    }

    /// Publication date, if `date_iso` holds a valid `YYYY-MM-DD`.
    pub fn date(&self) -> Option<chrono::NaiveDate> {
        chrono::NaiveDate::parse_from_str(self.date_iso.trim(), "%Y-%m-%d").ok()
    }

    /// Host of the article URL without a leading `www.`.
    /// For example: "https://www.kenha.co.ke/news/x" -> "kenha.co.ke"
    pub fn source_host(&self) -> Option<String> {
        let parsed = url::Url::parse(&self.url).ok()?;
        let host = parsed.host_str()?;
        Some(host.trim_start_matches("www.").to_string())
    }
}

#[cfg(test)]
pub(crate) fn article(source: &str, title: &str, url: &str) -> Article {
    Article {
        country: "Kenya".to_string(),
        source: source.to_string(),
        title: title.to_string(),
        date_iso: "2025-10-20".to_string(),
        summary: format!("{title} summary text that is long enough"),
        url: url.to_string(),
        category: None,
        status: None,
    }
}
