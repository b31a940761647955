//! Markdown rendering of the dataset report and query results.

use crate::models::Article;
use crate::report::{Count, Stats};
use crate::utils::slugify;
use itertools::Itertools;

/// Latest articles listed per country in the report.
const LATEST_PER_COUNTRY: usize = 10;

/// Escape characters that would break a Markdown table cell or link text.
fn cell(text: &str) -> String {
    text.replace('|', "\\|")
        .replace('[', "\\[")
        .replace(']', "\\]")
        .replace('\n', " ")
}

fn counts_table(out: &mut String, heading: &str, column: &str, counts: &[Count]) {
    out.push_str(&format!("## {heading}\n\n"));
    if counts.is_empty() {
        out.push_str("_No data._\n\n");
        return;
    }
    out.push_str(&format!("| {column} | Articles |\n"));
    out.push_str("|---|---:|\n");
    for c in counts {
        out.push_str(&format!("| {} | {} |\n", cell(&c.label), c.count));
    }
    out.push('\n');
}

/// Render the full report: overview, breakdowns, timeline, and the latest
/// articles for each country.
///
/// `articles` should be sorted newest first (as `merge` writes them).
pub fn report_to_markdown(stats: &Stats, articles: &[Article], generated_at: &str) -> String {
    let mut md = String::new();
    md.push_str("# African Infrastructure News Report\n\n");
    md.push_str(&format!("_Generated {generated_at}_\n\n"));

    md.push_str("| Articles | Countries | Sources | Date range |\n");
    md.push_str("|---:|---:|---:|---|\n");
    let range = stats
        .date_range
        .as_ref()
        .map(|(from, to)| format!("{from} to {to}"))
        .unwrap_or_else(|| "n/a".to_string());
    md.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        stats.total, stats.countries, stats.sources, range
    ));

    counts_table(&mut md, "By Country", "Country", &stats.by_country);
    counts_table(&mut md, "By Category", "Category", &stats.by_category);
    counts_table(&mut md, "By Status", "Status", &stats.by_status);
    counts_table(&mut md, "By Source", "Source", &stats.by_source);
    counts_table(&mut md, "By Domain", "Domain", &stats.by_domain);
    counts_table(&mut md, "Articles Over Time", "Date", &stats.timeline);

    md.push_str("## Latest by Country\n\n");
    for c in &stats.by_country {
        md.push_str(&format!("- [{}](#{})\n", cell(&c.label), slugify(&c.label)));
    }
    md.push('\n');

    let by_country = articles.iter().into_group_map_by(|a| a.country.as_str());
    for c in &stats.by_country {
        md.push_str(&format!("### {}\n\n", c.label));
        let Some(rows) = by_country.get(c.label.as_str()) else {
            continue;
        };
        for a in rows.iter().take(LATEST_PER_COUNTRY) {
            let date = if a.date_iso.is_empty() { "undated" } else { a.date_iso.as_str() };
            let category = a.category.map_or("uncategorized", |c| c.as_str());
            md.push_str(&format!(
                "- {date} - [{}]({}) <small>{} · `{category}`</small>\n",
                cell(&a.title),
                a.url,
                cell(&a.source)
            ));
        }
        md.push('\n');
    }
    md
}

/// Render rows as a Markdown table, the `query` command's default output.
pub fn articles_table(articles: &[Article]) -> String {
    let mut md = String::new();
    md.push_str("| Date | Country | Source | Category | Status | Title |\n");
    md.push_str("|---|---|---|---|---|---|\n");
    for a in articles {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | [{}]({}) |\n",
            a.date_iso,
            cell(&a.country),
            cell(&a.source),
            a.category.map_or("", |c| c.as_str()),
            a.status.map_or("", |s| s.as_str()),
            cell(&a.title),
            a.url
        ));
    }
    md
}
