//! LLM API interaction with exponential backoff retry logic.
//!
//! This module provides the interface for communicating with the Anthropic
//! Messages API. It includes automatic retry logic with exponential backoff
//! and jitter to handle rate limits and transient failures.
//!
//! # Architecture
//!
//! The module uses a trait-based design for flexibility:
//! - [`AskAsync`]: Core trait defining async LLM interaction
//! - [`AnthropicClient`]: Sends a single user prompt to `POST /messages`
//! - [`RetryAsk`]: Decorator that adds retry logic to any `AskAsync` implementation
//!
//! # Retry Strategy
//!
//! - Retries network errors, HTTP 429, and 5xx responses; other 4xx fail fast
//! - Exponential backoff from the configured base delay
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::config::LlmConfig;
use rand::{rng, Rng};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Trait for async LLM interaction.
///
/// Implementors of this trait can send text to an LLM and receive a response.
/// This abstraction allows for different LLM backends or decorators (like retry logic).
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Failure reported by the API or the transport underneath it.
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status, or `None` when no response was received.
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    /// Rate limits, overload, server errors and transport failures are
    /// worth another attempt; bad requests and auth failures are not.
    pub fn is_retryable(&self) -> bool {
        match self.status {
            None => true,
            Some(429) => true,
            Some(s) => s >= 500,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "Anthropic API error ({status}): {}", self.message),
            None => write!(f, "Anthropic API request failed: {}", self.message),
        }
    }
}

impl Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

fn is_retryable(e: &(dyn Error + 'static)) -> bool {
    e.downcast_ref::<ApiError>().is_none_or(ApiError::is_retryable)
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// # Backoff Strategy
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying LLM client to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = AnthropicClient::new(&config.llm, api_key)?;
    /// let retry_client = RetryAsk::new(client, 3, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if !is_retryable(e.as_ref()) {
                        error!(attempt, error = %e, "ask() failed with a non-retryable error");
                        return Err(e);
                    }

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let shift = (attempt - 1).min(16) as u32;
                    let mut delay = self.base_delay.saturating_mul(1 << shift);
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Client for the Anthropic Messages API implementing [`AskAsync`].
///
/// Each `ask` sends one user message and returns the concatenated text
/// blocks of the reply.
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The API key lives in the client's default headers and stays out of logs
        f.debug_struct("AnthropicClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl AnthropicClient {
    pub fn new(config: &LlmConfig, api_key: &str) -> Result<Self, Box<dyn Error>> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key)?;
        key.set_sensitive(true);
        headers.insert("x-api-key", key);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(StdDuration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    async fn send(&self, text: &str) -> Result<String, ApiError> {
        let url = format!("{}/messages", self.base_url);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![WireMessage { role: "user", content: text }],
        };
        debug!(model = %self.model, prompt_bytes = text.len(), "Anthropic messages request");

        let response = self.http.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError {
                status: Some(status.as_u16()),
                message,
            });
        }

        let body: MessagesResponse = response.json().await?;
        if body.stop_reason.as_deref() == Some("max_tokens") {
            warn!("Response stopped at max_tokens; it may be truncated");
        }
        Ok(collect_text(body))
    }
}

fn collect_text(body: MessagesResponse) -> String {
    body.content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

impl AskAsync for AnthropicClient {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = self.send(text).await;
        let dt = t0.elapsed();

        match res {
            Ok(reply) => {
                debug!(elapsed_ms = dt.as_millis(), reply_bytes = reply.len(), "API call succeeded");
                Ok(reply)
            }
            Err(e) => {
                warn!(elapsed_ms = dt.as_millis(), error = %e, "API call failed");
                Err(Box::new(e))
            }
        }
    }
}

/// Build the production client: Anthropic behind exponential backoff.
///
/// # Retry Behavior
///
/// - Up to `config.max_retries` retries of retryable failures
/// - Exponential backoff from `config.base_delay_ms` (capped at 30s)
/// - Random jitter added to prevent thundering herd
#[instrument(level = "info", skip_all, fields(model = %config.model))]
pub fn client_with_backoff(
    config: &LlmConfig,
    api_key: &str,
) -> Result<RetryAsk<AnthropicClient>, Box<dyn Error>> {
    let client = AnthropicClient::new(config, api_key)?;
    info!(base_url = %client.base_url, max_retries = config.max_retries, "Created Anthropic client");
    Ok(RetryAsk::new(
        client,
        config.max_retries,
        StdDuration::from_millis(config.base_delay_ms),
    ))
}
