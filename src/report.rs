//! Summary statistics over a dataset: the numbers behind the dashboard's
//! overview, breakdowns, and timeline.

use crate::models::Article;
use itertools::Itertools;
use serde::Serialize;
use std::collections::HashMap;

/// One labelled count in a breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Count {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub countries: usize,
    pub sources: usize,
    /// Oldest and newest `date_iso`, ignoring undated rows.
    pub date_range: Option<(String, String)>,
    pub by_country: Vec<Count>,
    pub by_category: Vec<Count>,
    pub by_status: Vec<Count>,
    pub by_source: Vec<Count>,
    /// Article URL hosts, for spotting sources that republish other sites.
    pub by_domain: Vec<Count>,
    /// Articles per day, oldest first.
    pub timeline: Vec<Count>,
}

const UNCATEGORIZED: &str = "uncategorized";
const UNKNOWN_STATUS: &str = "unknown";

/// Sort by count descending, then label, so ties come out stable.
fn ranked(counts: HashMap<String, usize>) -> Vec<Count> {
    counts
        .into_iter()
        .map(|(label, count)| Count { label, count })
        .sorted_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)))
        .collect()
}

impl Stats {
    pub fn compute(articles: &[Article]) -> Self {
        let by_country = ranked(articles.iter().map(|a| a.country.clone()).counts());
        let by_source = ranked(articles.iter().map(|a| a.source.clone()).counts());
        let by_domain = ranked(articles.iter().filter_map(Article::source_host).counts());
        let by_category = ranked(
            articles
                .iter()
                .map(|a| a.category.map_or(UNCATEGORIZED, |c| c.as_str()).to_string())
                .counts(),
        );
        let by_status = ranked(
            articles
                .iter()
                .map(|a| a.status.map_or(UNKNOWN_STATUS, |s| s.as_str()).to_string())
                .counts(),
        );

        let timeline: Vec<Count> = articles
            .iter()
            .filter_map(Article::date)
            .counts()
            .into_iter()
            .sorted_by_key(|(date, _)| *date)
            .map(|(date, count)| Count {
                label: date.to_string(),
                count,
            })
            .collect();

        let date_range = match (timeline.first(), timeline.last()) {
            (Some(first), Some(last)) => Some((first.label.clone(), last.label.clone())),
            _ => None,
        };

        Stats {
            total: articles.len(),
            countries: by_country.len(),
            sources: by_source.len(),
            date_range,
            by_country,
            by_category,
            by_status,
            by_source,
            by_domain,
            timeline,
        }
    }
}
