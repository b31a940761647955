//! Dataset filters: country and category selection, free-text search, and
//! date bounds.

use crate::models::{Article, Category};
use chrono::NaiveDate;

#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Exact country names; empty matches all.
    pub countries: Vec<String>,
    /// Empty matches all.
    pub categories: Vec<Category>,
    /// Case-insensitive substring of the title or summary.
    pub search: Option<String>,
    /// Inclusive lower bound on `date_iso`.
    pub since: Option<NaiveDate>,
    /// Inclusive upper bound on `date_iso`.
    pub until: Option<NaiveDate>,
}

impl Filter {
    pub fn matches(&self, article: &Article) -> bool {
        if !self.countries.is_empty()
            && !self.countries.iter().any(|c| c.eq_ignore_ascii_case(article.country.trim()))
        {
            return false;
        }
        if !self.categories.is_empty()
            && !article.category.is_some_and(|c| self.categories.contains(&c))
        {
            return false;
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            if !article.title.to_lowercase().contains(&term)
                && !article.summary.to_lowercase().contains(&term)
            {
                return false;
            }
        }
        if self.since.is_some() || self.until.is_some() {
            let Some(date) = article.date() else {
                return false;
            };
            if self.since.is_some_and(|since| date < since) || self.until.is_some_and(|until| date > until) {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, articles: &'a [Article]) -> Vec<&'a Article> {
        articles.iter().filter(|a| self.matches(a)).collect()
    }
}
