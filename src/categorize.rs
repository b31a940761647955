//! Category assignment for merged articles.
//!
//! Rows without a category (or from sources whose pre-filled categories are
//! unreliable) are sent to the model in batches. Each batch asks for a JSON
//! array with one category per article. Model replies are often wrapped in
//! code fences, cut short, or the wrong length, so parsing is lenient:
//!
//! | Reply                               | Result                                 |
//! |-------------------------------------|----------------------------------------|
//! | API error after retries             | every row `Infrastructure`             |
//! | no JSON array / truncated array     | re-ask, up to `max_attempts` requests  |
//! | invalid JSON or not an array        | every row `NonInfra`                   |
//! | unknown category / odd element      | that row `NonInfra`                    |
//! | too few elements                    | padded with `Infrastructure`           |
//! | too many elements                   | truncated                              |
//!
//! `NonInfra` rows are removed afterwards unless configured otherwise.

use crate::api::AskAsync;
use crate::classify::guess_category;
use crate::config::CategorizeConfig;
use crate::models::{Article, Category};
use crate::utils::{looks_truncated, truncate_chars, truncate_for_log};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

/// Characters of each summary included in the prompt.
const PROMPT_SUMMARY_CHARS: usize = 500;

const PROMPT_RULES: &str = r#"You classify African infrastructure and development projects. Focus on actual projects, not general corporate news.

CATEGORIES (choose ONE per article):
• port: ONLY if it mentions ports, airports, maritime, shipping, cargo terminals, harbours, vessels
• rail: ONLY if it mentions railways, trains, metro, rail tracks, stations, locomotives
• highway: ONLY if it mentions roads, highways, bridges, expressways, motorways
• SEZ: ONLY if it mentions Special Economic Zones, industrial parks, free trade zones
• smart city: Smart city initiatives, digital infrastructure, e-government, urban tech
• economic: Finance, trade, economy, investment, fintech, stock exchange, banking, commerce, export/import
• energy: Solar, wind, hydropower, nuclear, thermal, renewable energy, power plants, electricity, grid, dams
• technology: Digital transformation, broadband, 5G, data centers, ICT, fiber optic, AI, cybersecurity, telecommunications
• Infrastructure: Water projects, housing, buildings, general construction, recycling, waste
• NonInfra: NOT a project (HR news, awards, earnings, general announcements) and not infrastructure-related

RULES:
- port/rail/highway/SEZ need explicit keywords. Without them, use "Infrastructure"
- Infrastructure is the default for any development project that doesn't clearly fit another category
- NonInfra is only for non-project content (appointments, awards, earnings, generic news)
- When in doubt, "Infrastructure" is safer than guessing a specific category

ARTICLES:
"#;

/// Why a model reply could not be turned into categories.
#[derive(Debug, PartialEq)]
pub enum ReplyError {
    /// No complete JSON array; asking again may help.
    Incomplete,
    /// Unusable content; asking again is not expected to help.
    Invalid(String),
}

/// Counters reported after a categorization run.
#[derive(Debug, Default, Serialize)]
pub struct CategorizeStats {
    pub total: usize,
    /// Rows whose existing category was kept.
    pub preserved: usize,
    pub categorized: usize,
    /// `NonInfra` rows dropped from the dataset.
    pub removed: usize,
    /// Remaining rows per category, in taxonomy order, zeros omitted.
    pub breakdown: Vec<(Category, usize)>,
}

/// Build the prompt for one batch.
pub fn build_prompt(batch: &[&Article]) -> String {
    let mut prompt = String::from(PROMPT_RULES);
    for (i, article) in batch.iter().enumerate() {
        let summary = truncate_chars(&article.summary, PROMPT_SUMMARY_CHARS);
        prompt.push_str(&format!("\n[{i}] Title: {}\nSummary: {summary}\n", article.title));
    }
    prompt.push_str(&format!(
        "\nReturn a JSON array with {} categories, in article order. No explanations. \
         Example: [\"port\", \"economic\", \"energy\", \"technology\", \"Infrastructure\"]\n\n[",
        batch.len()
    ));
    prompt
}

/// Remove a surrounding Markdown code fence, with or without a `json` tag.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = rest.split("```").next().unwrap_or(rest);
    inner.strip_prefix("json").unwrap_or(inner).trim()
}

fn element_category(element: &Value) -> Category {
    let label = match element {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("category").and_then(Value::as_str),
        _ => None,
    };
    label
        .and_then(|l| l.parse().ok())
        .unwrap_or(Category::NonInfra)
}

/// Locate the first complete top-level JSON array in `body`.
///
/// Brackets inside string literals are ignored. The prompt ends with "[",
/// so a `]` reached before any opening bracket closes an array whose `[`
/// was never repeated; the returned text then has it restored.
fn first_array(body: &str) -> Option<String> {
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in body.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            ']' => match (depth, start) {
                (0, _) => return Some(format!("[{}", &body[..=i])),
                (1, Some(open)) => return Some(body[open..=i].to_string()),
                _ => depth -= 1,
            },
            _ => {}
        }
    }
    None
}

/// Turn a model reply into exactly `expected` categories.
pub fn parse_categories(reply: &str, expected: usize) -> Result<Vec<Category>, ReplyError> {
    let body = strip_code_fence(reply);
    let Some(array_text) = first_array(body) else {
        return Err(ReplyError::Incomplete);
    };

    let value: Value = match serde_json::from_str(&array_text) {
        Ok(v) => v,
        Err(e) if looks_truncated(&e) => return Err(ReplyError::Incomplete),
        Err(e) => return Err(ReplyError::Invalid(e.to_string())),
    };
    let Value::Array(elements) = value else {
        return Err(ReplyError::Invalid("reply is not a JSON array".to_string()));
    };

    if elements.len() != expected {
        warn!(expected, got = elements.len(), "Category count mismatch; padding or truncating");
    }
    let mut categories: Vec<Category> = elements.iter().take(expected).map(element_category).collect();
    categories.resize(expected, Category::Infrastructure);
    Ok(categories)
}

/// Categorize one batch, never failing: errors map to fallback categories.
#[instrument(level = "info", skip_all, fields(size = batch.len()))]
pub async fn categorize_batch<A>(api: &A, batch: &[&Article], max_attempts: usize) -> Vec<Category>
where
    A: AskAsync<Response = String>,
{
    let prompt = build_prompt(batch);
    let max_attempts = max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let reply = match api.ask(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                // Keep the rows: Infrastructure survives the NonInfra filter
                error!(error = %e, "API call failed; defaulting batch to Infrastructure");
                return vec![Category::Infrastructure; batch.len()];
            }
        };

        match parse_categories(&reply, batch.len()) {
            Ok(categories) => return categories,
            Err(ReplyError::Incomplete) if attempt < max_attempts => {
                warn!(
                    attempt,
                    max_attempts,
                    reply = %truncate_for_log(&reply, 200),
                    "Incomplete reply; re-asking"
                );
            }
            Err(e) => {
                warn!(
                    error = ?e,
                    reply = %truncate_for_log(&reply, 200),
                    "Unusable reply; marking batch NonInfra"
                );
                return vec![Category::NonInfra; batch.len()];
            }
        }
    }
    vec![Category::NonInfra; batch.len()]
}

fn select(articles: &[Article], config: &CategorizeConfig) -> Vec<usize> {
    articles
        .iter()
        .enumerate()
        .filter(|(_, a)| a.needs_categorization(&config.force_recategorize_sources))
        .map(|(i, _)| i)
        .collect()
}

/// Drop `NonInfra` rows (if configured) and tally the result.
fn finish(articles: &mut Vec<Article>, selected: usize, config: &CategorizeConfig) -> CategorizeStats {
    let total = articles.len();
    if config.drop_non_infra {
        articles.retain(|a| a.category != Some(Category::NonInfra));
    }
    let removed = total - articles.len();

    let breakdown = Category::ALL
        .iter()
        .map(|c| (*c, articles.iter().filter(|a| a.category == Some(*c)).count()))
        .filter(|(_, n)| *n > 0)
        .collect::<Vec<_>>();

    let stats = CategorizeStats {
        total,
        preserved: total - selected,
        categorized: selected,
        removed,
        breakdown,
    };
    info!(
        total = stats.total,
        preserved = stats.preserved,
        categorized = stats.categorized,
        removed = stats.removed,
        kept = articles.len(),
        "Categorization complete"
    );
    for (category, count) in &stats.breakdown {
        info!(%category, count, "Category breakdown");
    }
    stats
}

/// Categorize the dataset with the model behind `api`.
#[instrument(level = "info", skip_all, fields(rows = articles.len()))]
pub async fn categorize_with_model<A>(
    articles: &mut Vec<Article>,
    api: &A,
    config: &CategorizeConfig,
) -> CategorizeStats
where
    A: AskAsync<Response = String>,
{
    let selected = select(articles, config);
    let batch_size = config.batch_size.max(1);
    let batches: Vec<Vec<usize>> = selected.chunks(batch_size).map(|c| c.to_vec()).collect();
    let total_batches = batches.len();
    info!(
        to_categorize = selected.len(),
        preserved = articles.len() - selected.len(),
        batches = total_batches,
        concurrency = config.concurrency.max(1),
        "Starting categorization"
    );

    let shared: &[Article] = articles;
    let results: Vec<Vec<Category>> = stream::iter(batches.iter().enumerate())
        .map(|(b, indices)| {
            let batch: Vec<&Article> = indices.iter().map(|&i| &shared[i]).collect();
            async move {
                info!(batch = b + 1, total = total_batches, "Categorizing batch");
                categorize_batch(api, &batch, config.max_attempts).await
            }
        })
        .buffered(config.concurrency.max(1))
        .collect()
        .await;

    for (indices, categories) in batches.iter().zip(results) {
        for (&i, category) in indices.iter().zip(categories) {
            articles[i].category = Some(category);
        }
    }

    finish(articles, selected.len(), config)
}

/// Categorize the dataset with keyword rules only; no network access.
#[instrument(level = "info", skip_all, fields(rows = articles.len()))]
pub fn categorize_offline(articles: &mut Vec<Article>, config: &CategorizeConfig) -> CategorizeStats {
    let selected = select(articles, config);
    info!(to_categorize = selected.len(), "Starting offline categorization");
    for &i in &selected {
        let article = &mut articles[i];
        article.category = Some(guess_category(&article.title, &article.summary));
    }
    finish(articles, selected.len(), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::article;
    use std::error::Error;
    use std::sync::Mutex;

    /// Replays canned replies in order and records every prompt.
    #[derive(Debug, Default)]
    struct Scripted {
        replies: Mutex<Vec<Result<String, String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<&str, &str>>) -> Self {
            let mut replies: Vec<Result<String, String>> = replies
                .into_iter()
                .map(|r| r.map(str::to_string).map_err(str::to_string))
                .collect();
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl AskAsync for Scripted {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String, Box<dyn Error>> {
            self.prompts.lock().unwrap().push(text.to_string());
            match self.replies.lock().unwrap().pop() {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(e)) => Err(e.into()),
                None => Err("no scripted reply left".into()),
            }
        }
    }

    fn config() -> CategorizeConfig {
        CategorizeConfig {
            batch_size: 2,
            ..CategorizeConfig::default()
        }
    }

    #[test]
    fn test_parse_plain_array() {
        let cats = parse_categories(r#"["port", "rail", "energy"]"#, 3).unwrap();
        assert_eq!(cats, vec![Category::Port, Category::Rail, Category::Energy]);
    }

    #[test]
    fn test_parse_code_fenced_reply() {
        let reply = "```json\n[\"highway\", \"SEZ\"]\n```";
        let cats = parse_categories(reply, 2).unwrap();
        assert_eq!(cats, vec![Category::Highway, Category::Sez]);
    }

    #[test]
    fn test_parse_reply_continuing_prefilled_bracket() {
        let cats = parse_categories(r#""smart city", "economic"]"#, 2).unwrap();
        assert_eq!(cats, vec![Category::SmartCity, Category::Economic]);
    }

    #[test]
    fn test_parse_reply_with_surrounding_prose() {
        let reply = "Here you go:\n[\"technology\", \"Infrastructure\"]\nThanks";
        let cats = parse_categories(reply, 2).unwrap();
        assert_eq!(cats, vec![Category::Technology, Category::Infrastructure]);
    }

    #[test]
    fn test_parse_ignores_brackets_after_the_array() {
        let reply = r#"["port", "rail"] Note: [x] marks uncertain rows"#;
        let cats = parse_categories(reply, 2).unwrap();
        assert_eq!(cats, vec![Category::Port, Category::Rail]);

        let prefilled = r#""port", "rail"] (see note [1])"#;
        let cats = parse_categories(prefilled, 2).unwrap();
        assert_eq!(cats, vec![Category::Port, Category::Rail]);

        let nested = r#"[{"category": "energy", "tags": ["solar]"]}, "SEZ"] [2]"#;
        let cats = parse_categories(nested, 2).unwrap();
        assert_eq!(cats, vec![Category::Energy, Category::Sez]);
    }

    #[test]
    fn test_parse_pads_and_truncates() {
        let short = parse_categories(r#"["port"]"#, 3).unwrap();
        assert_eq!(short, vec![Category::Port, Category::Infrastructure, Category::Infrastructure]);

        let long = parse_categories(r#"["port", "rail", "energy"]"#, 2).unwrap();
        assert_eq!(long, vec![Category::Port, Category::Rail]);
    }

    #[test]
    fn test_parse_objects_and_unknown_values() {
        let reply = r#"[{"category": "rail"}, "airports", 7, {"label": "port"}]"#;
        let cats = parse_categories(reply, 4).unwrap();
        assert_eq!(
            cats,
            vec![Category::Rail, Category::NonInfra, Category::NonInfra, Category::NonInfra]
        );
    }

    #[test]
    fn test_parse_incomplete_and_invalid() {
        assert_eq!(parse_categories("I cannot help with that", 2), Err(ReplyError::Incomplete));
        assert_eq!(parse_categories(r#"["port", "rail"#, 2), Err(ReplyError::Incomplete));
        assert!(matches!(
            parse_categories(r#"["port" "rail"]"#, 2),
            Err(ReplyError::Invalid(_))
        ));
        assert!(matches!(
            parse_categories(r#"[{"a": ]"#, 2),
            Err(ReplyError::Invalid(_))
        ));
    }

    #[test]
    fn test_prompt_lists_articles_in_order() {
        let a = article("S", "Lamu port berth", "https://a");
        let mut b = article("S", "Kisumu bypass", "https://b");
        b.summary = "y".repeat(800);
        let prompt = build_prompt(&[&a, &b]);

        assert!(prompt.contains("[0] Title: Lamu port berth"));
        assert!(prompt.contains("[1] Title: Kisumu bypass"));
        assert!(prompt.contains("JSON array with 2 categories"));
        assert!(prompt.ends_with('['));
        assert!(!prompt.contains(&"y".repeat(501)));
    }

    #[tokio::test]
    async fn test_batch_reasks_on_incomplete_reply() {
        let api = Scripted::new(vec![Ok("Sure, one moment"), Ok(r#"["port", "rail"]"#)]);
        let a = article("S", "A", "https://a");
        let b = article("S", "B", "https://b");

        let cats = categorize_batch(&api, &[&a, &b], 3).await;
        assert_eq!(cats, vec![Category::Port, Category::Rail]);
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn test_batch_gives_up_after_max_attempts() {
        let api = Scripted::new(vec![Ok("no"), Ok("still no"), Ok("nope")]);
        let a = article("S", "A", "https://a");

        let cats = categorize_batch(&api, &[&a], 3).await;
        assert_eq!(cats, vec![Category::NonInfra]);
        assert_eq!(api.calls(), 3);
    }

    #[tokio::test]
    async fn test_batch_api_error_keeps_rows() {
        let api = Scripted::new(vec![Err("rate limited")]);
        let a = article("S", "A", "https://a");
        let b = article("S", "B", "https://b");

        let cats = categorize_batch(&api, &[&a, &b], 3).await;
        assert_eq!(cats, vec![Category::Infrastructure, Category::Infrastructure]);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_categorize_with_model_selects_and_filters() {
        let mut preset = article("KeNHA", "Preset highway", "https://p");
        preset.category = Some(Category::Highway);
        let mut forced = article("L'Economiste du Faso", "Forced", "https://f");
        forced.category = Some(Category::Port);

        let mut articles = vec![
            article("GNA", "First", "https://1"),
            preset,
            article("GNA", "Second", "https://2"),
            forced,
            article("GNA", "Third", "https://3"),
        ];

        // Batches of two over rows 0, 2, 3, 4
        let api = Scripted::new(vec![
            Ok(r#"["energy", "NonInfra"]"#),
            Ok(r#"["economic", "rail"]"#),
        ]);
        let stats = categorize_with_model(&mut articles, &api, &config()).await;

        assert_eq!(api.calls(), 2);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.preserved, 1);
        assert_eq!(stats.categorized, 4);
        assert_eq!(stats.removed, 1);

        let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Preset highway", "Forced", "Third"]);
        assert_eq!(articles[0].category, Some(Category::Energy));
        assert_eq!(articles[1].category, Some(Category::Highway));
        assert_eq!(articles[2].category, Some(Category::Economic));
        assert_eq!(articles[3].category, Some(Category::Rail));

        assert_eq!(
            stats.breakdown,
            vec![
                (Category::Rail, 1),
                (Category::Highway, 1),
                (Category::Economic, 1),
                (Category::Energy, 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_keep_non_infra_when_configured() {
        let mut articles = vec![article("GNA", "Award ceremony", "https://1")];
        let api = Scripted::new(vec![Ok(r#"["NonInfra"]"#)]);
        let config = CategorizeConfig {
            drop_non_infra: false,
            ..config()
        };

        let stats = categorize_with_model(&mut articles, &api, &config).await;
        assert_eq!(stats.removed, 0);
        assert_eq!(articles[0].category, Some(Category::NonInfra));
    }

    #[test]
    fn test_categorize_offline() {
        let mut articles = vec![
            article("GNA", "Tema port terminal expansion", "https://1"),
            article("GNA", "Minister attends award ceremony", "https://2"),
        ];
        articles[1].summary = "A ceremony was held.".to_string();

        let stats = categorize_offline(&mut articles, &config());
        assert_eq!(stats.categorized, 2);
        assert_eq!(stats.removed, 1);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].category, Some(Category::Port));
    }
}
