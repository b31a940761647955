//! Keyword rules: relevance filtering, status extraction, and the offline
//! category classifier.
//!
//! Matching is case-insensitive and anchored on word boundaries, so `"port"`
//! matches "Port of Mombasa" but not "support" or "report".

use crate::models::{Category, Status};
use once_cell::sync::Lazy;
use regex::Regex;

/// A compiled set of keywords or phrases.
#[derive(Debug, Clone)]
pub struct KeywordSet {
    // None when the set is empty
    pattern: Option<Regex>,
}

impl KeywordSet {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = keywords
            .iter()
            .map(|k| k.as_ref().trim())
            .filter(|k| !k.is_empty())
            .map(bounded)
            .collect();
        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }
        let pattern = Regex::new(&format!("(?i)(?:{})", alternatives.join("|")))?;
        Ok(Self { pattern: Some(pattern) })
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(text))
    }
}

/// Escape `keyword` and anchor each end that is a word character.
fn bounded(keyword: &str) -> String {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let start = if is_word(keyword.chars().next()) { r"\b" } else { "" };
    let end = if is_word(keyword.chars().last()) { r"\b" } else { "" };
    format!("{start}{}{end}", regex::escape(keyword))
}

fn table(keywords: &[&str]) -> KeywordSet {
    // Static tables are plain words; escaping makes them valid regexes
    KeywordSet::new(keywords).expect("static keyword table compiles")
}

/// Whether `text` passes a source's include/exclude lists.
///
/// An empty include list accepts everything not excluded.
pub fn is_relevant(text: &str, include: &KeywordSet, exclude: &KeywordSet) -> bool {
    (include.is_empty() || include.matches(text)) && !exclude.matches(text)
}

static COMPLETED: Lazy<KeywordSet> = Lazy::new(|| {
    table(&["completed", "commissioned", "inaugurated", "opened", "operational"])
});
static ONGOING: Lazy<KeywordSet> = Lazy::new(|| {
    table(&["ongoing", "on-going", "under construction", "construction", "underway", "% complete"])
});
static PLANNED: Lazy<KeywordSet> = Lazy::new(|| {
    table(&["planned", "proposed", "upcoming", "approved", "awarded", "tender"])
});

/// Project status mentioned in `text`, checked completed → ongoing → planned.
pub fn extract_status(text: &str) -> Option<Status> {
    if COMPLETED.matches(text) {
        Some(Status::Completed)
    } else if ONGOING.matches(text) {
        Some(Status::Ongoing)
    } else if PLANNED.matches(text) {
        Some(Status::Planned)
    } else {
        None
    }
}

/// Status implied by a WordPress category name or slug, e.g.
/// "Completed Projects" or "on-going-projects".
pub fn status_from_label(label: &str) -> Option<Status> {
    let label = label.to_lowercase();
    if label.contains("completed") {
        Some(Status::Completed)
    } else if label.contains("ongoing") || label.contains("on-going") || label.contains("maintenance") {
        Some(Status::Ongoing)
    } else if label.contains("planned") {
        Some(Status::Planned)
    } else {
        None
    }
}

static CATEGORY_RULES: Lazy<Vec<(Category, KeywordSet)>> = Lazy::new(|| {
    vec![
        (
            Category::Port,
            table(&[
                "port", "ports", "airport", "airports", "maritime", "shipping", "cargo terminal",
                "container terminal", "harbour", "harbor", "vessel", "vessels", "berth", "seaport",
            ]),
        ),
        (
            Category::Rail,
            table(&[
                "railway", "railways", "rail", "train", "trains", "metro", "standard gauge",
                "sgr", "locomotive", "locomotives", "railway station",
            ]),
        ),
        (
            Category::Highway,
            table(&[
                "road", "roads", "highway", "highways", "bridge", "bridges", "expressway",
                "motorway", "bypass", "interchange", "dual carriageway", "dualling", "flyover",
            ]),
        ),
        (
            Category::Sez,
            table(&[
                "special economic zone", "special economic zones", "sez", "industrial park",
                "free trade zone", "free zone", "export processing zone",
            ]),
        ),
        (
            Category::Energy,
            table(&[
                "solar", "wind farm", "hydropower", "hydroelectric", "nuclear", "thermal plant",
                "renewable energy", "power plant", "power station", "electricity", "grid",
                "dam", "transmission line", "geothermal", "megawatt", "mw",
            ]),
        ),
        (
            Category::Technology,
            table(&[
                "broadband", "5g", "data centre", "data center", "ict", "fibre optic",
                "fiber optic", "artificial intelligence", "cybersecurity", "telecommunications",
                "telecom", "digital transformation",
            ]),
        ),
        (
            Category::SmartCity,
            table(&["smart city", "smart cities", "e-government", "urban technology", "digital city"]),
        ),
        (
            Category::Economic,
            table(&[
                "finance", "trade", "economy", "economic", "investment", "fintech",
                "stock exchange", "banking", "bank", "commerce", "export", "import", "crypto",
            ]),
        ),
    ]
});

static GENERAL_INFRA: Lazy<KeywordSet> = Lazy::new(|| {
    table(&[
        "infrastructure", "construction", "project", "water supply", "sanitation", "housing",
        "building", "buildings", "recycling", "waste", "rehabilitation", "development",
    ])
});

/// Offline stand-in for model categorization.
///
/// Checks the specific categories in a fixed order and falls back to
/// `Infrastructure` for general development news, `NonInfra` otherwise.
pub fn guess_category(title: &str, summary: &str) -> Category {
    let text = format!("{title} {summary}");
    CATEGORY_RULES
        .iter()
        .find(|(_, keywords)| keywords.matches(&text))
        .map(|(category, _)| *category)
        .unwrap_or_else(|| {
            if GENERAL_INFRA.matches(&text) {
                Category::Infrastructure
            } else {
                Category::NonInfra
            }
        })
}
