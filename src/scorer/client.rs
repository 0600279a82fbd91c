/// Hugging Face inference client implementation.
///
/// This module provides `HfQaClient` for scoring a (question, context) pair with an
/// extractive QA model served over HTTP, along with error types and a builder.
use std::time::Duration;

use thiserror::Error;

use crate::retry::{DEFAULT_DELAYS, Transient, is_server_error, retry_with_backoff};

/// Model used when neither the builder nor the environment names one.
pub const DEFAULT_MODEL: &str = "deepset/roberta-base-squad2";

/// Errors that can occur when calling the QA scorer.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The scorer did not answer within the configured timeout
    #[error("Scoring request timed out")]
    Timeout(#[source] reqwest::Error),

    /// HTTP errors with status code
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// JSON deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Errors reported by the scorer in its response body
    #[error("QA API error: {message}")]
    Api { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ScoringError {
    /// Returns `true` when the failure will repeat for every paragraph
    /// (bad credentials, unknown model, bad endpoint), so scanning further is
    /// pointless.
    pub fn is_systemic(&self) -> bool {
        match self {
            ScoringError::Http { status } => matches!(status, 401 | 403 | 404),
            ScoringError::InvalidUrl(_) => true,
            _ => false,
        }
    }
}

impl Transient for ScoringError {
    fn is_transient(&self) -> bool {
        match self {
            ScoringError::Network(_) | ScoringError::Timeout(_) => true,
            ScoringError::Http { status } => is_server_error(*status),
            ScoringError::Serialization(_) | ScoringError::Api { .. } | ScoringError::InvalidUrl(_) => {
                false
            }
        }
    }
}

fn transport_error(e: reqwest::Error) -> ScoringError {
    if e.is_timeout() {
        ScoringError::Timeout(e)
    } else {
        ScoringError::Network(e)
    }
}

/// The best answer span the model found in one context, with its confidence.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ScoredSpan {
    /// Extracted answer text
    pub answer: String,
    /// Model confidence; comparable across calls to the same model
    pub score: f64,
}

impl ScoredSpan {
    /// Creates a new scored span.
    pub fn new(answer: impl Into<String>, score: f64) -> Self {
        Self {
            answer: answer.into(),
            score,
        }
    }
}

/// Trait for QA scorer operations.
///
/// This trait enables mocking in unit tests and keeps the scanner independent
/// of how the model is hosted.
pub trait ScorerClientTrait: Send + Sync {
    /// Finds the most likely answer to `question` inside `context`.
    fn score(&self, question: &str, context: &str) -> Result<ScoredSpan, ScoringError>;
}

/// Builder for constructing `HfQaClient` instances.
///
/// # Examples
///
/// ```
/// use wikiqa::scorer::HfQaClientBuilder;
///
/// let client = HfQaClientBuilder::new()
///     .base_url("http://localhost:8080")
///     .model("deepset/roberta-base-squad2")
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(client.endpoint(), "http://localhost:8080/models/deepset/roberta-base-squad2");
/// ```
#[derive(Debug, Default)]
pub struct HfQaClientBuilder {
    base_url: Option<String>,
    model: Option<String>,
    api_token: Option<String>,
    timeout: Option<Duration>,
    retry_delays: Option<Vec<Duration>>,
}

impl HfQaClientBuilder {
    /// Creates a new `HfQaClientBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL of the inference service.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model name (e.g. "deepset/roberta-base-squad2").
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the bearer token sent with each request.
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the delays used between retries of transient failures.
    pub fn retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = Some(delays);
        self
    }

    /// Builds the `HfQaClient` with the configured settings.
    ///
    /// # Environment Variables
    ///
    /// Unset builder values fall back to `WIKIQA_QA_URL` (default
    /// `https://api-inference.huggingface.co`), `WIKIQA_QA_MODEL` (default
    /// [`DEFAULT_MODEL`]) and `HF_API_TOKEN` (no token when unset).
    pub fn build(self) -> Result<HfQaClient, ScoringError> {
        let base_url = self
            .base_url
            .or_else(|| std::env::var("WIKIQA_QA_URL").ok())
            .unwrap_or_else(|| "https://api-inference.huggingface.co".to_string())
            .trim_end_matches('/')
            .to_string();

        let model = self
            .model
            .or_else(|| std::env::var("WIKIQA_QA_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let api_token = self
            .api_token
            .or_else(|| std::env::var("HF_API_TOKEN").ok())
            .filter(|t| !t.trim().is_empty());

        let endpoint = format!("{}/models/{}", base_url, model);
        reqwest::Url::parse(&endpoint)
            .map_err(|e| ScoringError::InvalidUrl(format!("{}: {}", endpoint, e)))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(30)))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(ScoringError::Network)?;

        Ok(HfQaClient {
            client,
            endpoint,
            model,
            api_token,
            retry_delays: self.retry_delays.unwrap_or_else(|| DEFAULT_DELAYS.to_vec()),
        })
    }
}

/// Synchronous client for a hosted extractive QA model.
///
/// Construct once with `HfQaClientBuilder` and reuse it for every question.
pub struct HfQaClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_token: Option<String>,
    retry_delays: Vec<Duration>,
}

impl HfQaClient {
    /// Returns the full inference endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the delays slept between retries of a transient failure.
    pub fn retry_delays(&self) -> &[Duration] {
        &self.retry_delays
    }

    fn score_internal(&self, question: &str, context: &str) -> Result<ScoredSpan, ScoringError> {
        let request_body = serde_json::json!({
            "inputs": {
                "question": question,
                "context": context
            }
        });

        retry_with_backoff(&self.retry_delays, || {
            let mut request = self.client.post(&self.endpoint).json(&request_body);
            if let Some(token) = &self.api_token {
                request = request.bearer_auth(token);
            }

            let response = request.send().map_err(transport_error)?;

            let status = response.status();
            if !status.is_success() {
                // 5xx (including "model loading" 503) is retried, 4xx is not
                return Err(ScoringError::Http {
                    status: status.as_u16(),
                });
            }

            let body = response.text().map_err(transport_error)?;
            parse_score_response(&body)
        })
    }
}

impl ScorerClientTrait for HfQaClient {
    fn score(&self, question: &str, context: &str) -> Result<ScoredSpan, ScoringError> {
        self.score_internal(question, context)
    }
}

/// Parses a QA response: a span object, a list of spans (best first), or an
/// `{"error": ...}` object.
fn parse_score_response(body: &str) -> Result<ScoredSpan, ScoringError> {
    let json: serde_json::Value = serde_json::from_str(body).map_err(ScoringError::Serialization)?;

    if let Some(error) = json.get("error") {
        return Err(ScoringError::Api {
            message: error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        });
    }

    let span = match json {
        serde_json::Value::Array(mut spans) if !spans.is_empty() => spans.swap_remove(0),
        serde_json::Value::Array(_) => {
            return Err(ScoringError::Api {
                message: "QA response contained no answer spans".to_string(),
            });
        }
        other => other,
    };

    serde_json::from_value(span).map_err(ScoringError::Serialization)
}
