/// Wikipedia content client implementation.
///
/// Fetches plain-text article extracts from the MediaWiki action API and
/// reshapes them into blank-line-delimited blocks for paragraph segmentation.
use std::time::Duration;

use thiserror::Error;

use crate::retry::{DEFAULT_DELAYS, Transient, is_server_error, retry_with_backoff};

/// Identifies this client to Wikimedia, which rejects anonymous agents.
const USER_AGENT: &str = concat!(
    "wikiqa/",
    env!("CARGO_PKG_VERSION"),
    " (question answering over Wikipedia)"
);

/// Errors that can occur when fetching document text.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The content source did not answer within the configured timeout
    #[error("Fetch request timed out")]
    Timeout(#[source] reqwest::Error),

    /// HTTP errors with status code
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// The response body was not the expected JSON shape
    #[error("Malformed content response: {message}")]
    Malformed { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout(_) => true,
            FetchError::Http { status } => is_server_error(*status),
            FetchError::Malformed { .. } | FetchError::InvalidUrl(_) => false,
        }
    }
}

fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(e)
    } else {
        FetchError::Network(e)
    }
}

/// Trait for document text retrieval.
pub trait ContentSourceTrait: Send + Sync {
    /// Returns the full plain text of the document titled exactly `title`, or
    /// `None` if no such document exists.
    fn fetch_text(&self, title: &str) -> Result<Option<String>, FetchError>;
}

/// Builder for constructing `WikipediaClient` instances.
///
/// # Examples
///
/// ```
/// use wikiqa::content::WikipediaClientBuilder;
///
/// let client = WikipediaClientBuilder::new()
///     .language("de")
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(client.api_url(), "https://de.wikipedia.org/w/api.php");
/// ```
#[derive(Debug, Default)]
pub struct WikipediaClientBuilder {
    language: Option<String>,
    api_url: Option<String>,
    timeout: Option<Duration>,
    retry_delays: Option<Vec<Duration>>,
}

impl WikipediaClientBuilder {
    /// Creates a new `WikipediaClientBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Wikipedia language edition (e.g. "en").
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Overrides the MediaWiki API endpoint entirely.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
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

    /// Builds the `WikipediaClient`.
    ///
    /// Without an explicit `api_url()`, the endpoint is derived from the
    /// language edition (default "en").
    pub fn build(self) -> Result<WikipediaClient, FetchError> {
        let api_url = match self.api_url {
            Some(url) => url,
            None => format!(
                "https://{}.wikipedia.org/w/api.php",
                self.language.as_deref().unwrap_or("en")
            ),
        };

        reqwest::Url::parse(&api_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", api_url, e)))?;

        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout.unwrap_or(Duration::from_secs(30)))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(FetchError::Network)?;

        Ok(WikipediaClient {
            client,
            api_url,
            retry_delays: self.retry_delays.unwrap_or_else(|| DEFAULT_DELAYS.to_vec()),
        })
    }
}

/// Synchronous client for Wikipedia article text.
pub struct WikipediaClient {
    client: reqwest::blocking::Client,
    api_url: String,
    retry_delays: Vec<Duration>,
}

impl WikipediaClient {
    /// Returns the MediaWiki API endpoint used by this client.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn fetch_internal(&self, title: &str) -> Result<Option<String>, FetchError> {
        tracing::debug!(title, "fetching article text");

        let json: serde_json::Value = retry_with_backoff(&self.retry_delays, || {
            let response = self
                .client
                .get(&self.api_url)
                .query(&[
                    ("action", "query"),
                    ("format", "json"),
                    ("formatversion", "2"),
                    ("prop", "extracts"),
                    ("explaintext", "1"),
                    ("exsectionformat", "plain"),
                    ("redirects", "1"),
                    ("titles", title),
                ])
                .send()
                .map_err(transport_error)?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Http {
                    status: status.as_u16(),
                });
            }

            response.json().map_err(|e| FetchError::Malformed {
                message: e.to_string(),
            })
        })?;

        parse_extract_response(&json)
    }
}

impl ContentSourceTrait for WikipediaClient {
    fn fetch_text(&self, title: &str) -> Result<Option<String>, FetchError> {
        self.fetch_internal(title)
    }
}

/// Pulls the page extract out of a `formatversion=2` query response.
fn parse_extract_response(json: &serde_json::Value) -> Result<Option<String>, FetchError> {
    if let Some(error) = json.get("error") {
        let info = error
            .get("info")
            .and_then(|i| i.as_str())
            .unwrap_or("unknown error");
        return Err(FetchError::Malformed {
            message: format!("API error: {}", info),
        });
    }

    let page = json
        .get("query")
        .and_then(|q| q.get("pages"))
        .and_then(|p| p.as_array())
        .and_then(|pages| pages.first())
        .ok_or_else(|| FetchError::Malformed {
            message: "response has no query.pages entry".to_string(),
        })?;

    let missing = ["missing", "invalid"]
        .iter()
        .any(|flag| page.get(*flag).and_then(|v| v.as_bool()).unwrap_or(false));
    if missing {
        return Ok(None);
    }

    Ok(page
        .get("extract")
        .and_then(|e| e.as_str())
        .map(normalize_extract)
        .filter(|text| !text.is_empty()))
}

/// Puts every non-empty source line in its own blank-line-delimited block.
///
/// Plain-text extracts separate paragraphs with single newlines and put
/// section headings on their own lines; after this pass headings are short
/// standalone blocks that segmentation can drop.
fn normalize_extract(extract: &str) -> String {
    extract
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_returns_normalized_extract() {
        let json = serde_json::json!({
            "batchcomplete": true,
            "query": {
                "pages": [{
                    "pageid": 17257,
                    "title": "Kurt Gödel",
                    "extract": "Kurt Gödel was a logician.\nHe was born in Brno.\n\n\nDeath\nGödel died in 1978."
                }]
            }
        });

        let text = parse_extract_response(&json).unwrap().unwrap();

        assert_eq!(
            text,
            "Kurt Gödel was a logician.\n\nHe was born in Brno.\n\nDeath\n\nGödel died in 1978."
        );
    }

    #[test]
    fn parse_missing_page_is_none() {
        let json = serde_json::json!({
            "query": {"pages": [{"title": "No Such Article Xyz", "missing": true}]}
        });

        assert_eq!(parse_extract_response(&json).unwrap(), None);
    }

    #[test]
    fn parse_invalid_title_is_none() {
        let json = serde_json::json!({
            "query": {"pages": [{"title": "<>", "invalid": true, "invalidreason": "bad"}]}
        });

        assert_eq!(parse_extract_response(&json).unwrap(), None);
    }

    #[test]
    fn parse_empty_extract_is_none() {
        let json = serde_json::json!({
            "query": {"pages": [{"title": "Stub", "extract": "  \n "}]}
        });

        assert_eq!(parse_extract_response(&json).unwrap(), None);
    }

    #[test]
    fn parse_api_error_is_malformed() {
        let json = serde_json::json!({"error": {"code": "badvalue", "info": "Unrecognized value"}});

        let err = parse_extract_response(&json).unwrap_err();
        assert!(err.to_string().contains("Unrecognized value"));
        assert!(!err.is_transient());
    }

    #[test]
    fn parse_without_pages_is_malformed() {
        let json = serde_json::json!({"batchcomplete": true});
        assert!(matches!(
            parse_extract_response(&json),
            Err(FetchError::Malformed { .. })
        ));
    }

    #[test]
    fn build_derives_endpoint_from_language() {
        let client = WikipediaClientBuilder::new().build().unwrap();
        assert_eq!(client.api_url(), "https://en.wikipedia.org/w/api.php");
    }

    #[test]
    fn build_rejects_invalid_url() {
        let result = WikipediaClientBuilder::new().api_url("nope").build();
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }
}
