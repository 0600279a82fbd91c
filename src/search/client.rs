/// SerpApi search client implementation.
///
/// This module provides `SerpApiClient` for running Google searches restricted to
/// the document site through SerpApi, along with its error type and builder.
use std::time::Duration;

use thiserror::Error;

use crate::retry::{DEFAULT_DELAYS, Transient, is_server_error, retry_with_backoff};

use super::result::SearchResult;

/// SerpApi reports an empty result page as an error with this text.
const NO_RESULTS_MESSAGE: &str = "hasn't returned any results";

/// Errors that can occur when calling the search provider.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The provider did not answer within the configured timeout
    #[error("Search request timed out")]
    Timeout(#[source] reqwest::Error),

    /// HTTP errors with status code
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// JSON deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Errors reported by the provider in its response body
    #[error("Search API error: {message}")]
    Api { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// No API key was provided, so only cached resolutions are available
    #[error("no search API key configured; set SERP_API_KEY or pass --serp-api-key")]
    NotConfigured,
}

impl Transient for SearchError {
    fn is_transient(&self) -> bool {
        match self {
            SearchError::Network(_) | SearchError::Timeout(_) => true,
            SearchError::Http { status } => is_server_error(*status),
            SearchError::Serialization(_)
            | SearchError::Api { .. }
            | SearchError::InvalidUrl(_)
            | SearchError::NotConfigured => false,
        }
    }
}

fn transport_error(e: reqwest::Error) -> SearchError {
    if e.is_timeout() {
        SearchError::Timeout(e)
    } else {
        SearchError::Network(e)
    }
}

/// Trait for search provider operations.
///
/// This trait lets the resolver run against mocks in tests.
pub trait SearchClientTrait: Send + Sync {
    /// Searches for `query` and returns results in provider rank order.
    ///
    /// An empty vector means the provider found nothing; that is not an error.
    fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError>;
}

/// Builder for constructing `SerpApiClient` instances.
///
/// # Examples
///
/// ```
/// use wikiqa::search::SerpApiClientBuilder;
///
/// let client = SerpApiClientBuilder::new()
///     .api_key("secret")
///     .site("Wikipedia")
///     .build()
///     .expect("Failed to create client");
/// ```
#[derive(Debug, Default)]
pub struct SerpApiClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    site: Option<String>,
    timeout: Option<Duration>,
    retry_delays: Option<Vec<Duration>>,
}

impl SerpApiClientBuilder {
    /// Creates a new `SerpApiClientBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the SerpApi key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL for the SerpApi service.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the document site searched and recognised in result titles.
    ///
    /// # Arguments
    ///
    /// * `site` - Site name as it appears at the end of result titles (e.g. "Wikipedia")
    pub fn site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
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

    /// Builds the `SerpApiClient`.
    ///
    /// # Environment Variables
    ///
    /// If `api_key()` was not called, the `SERP_API_KEY` environment variable
    /// is used.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::NotConfigured` when no API key is available and
    /// `SearchError::InvalidUrl` for a malformed base URL.
    pub fn build(self) -> Result<SerpApiClient, SearchError> {
        let api_key = match self.api_key {
            Some(key) => key,
            None => std::env::var("SERP_API_KEY").map_err(|_| SearchError::NotConfigured)?,
        };
        if api_key.trim().is_empty() {
            return Err(SearchError::NotConfigured);
        }

        let base_url = self
            .base_url
            .unwrap_or_else(|| "https://serpapi.com".to_string())
            .trim_end_matches('/')
            .to_string();

        reqwest::Url::parse(&base_url)
            .map_err(|e| SearchError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(30)))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(SearchError::Network)?;

        Ok(SerpApiClient {
            client,
            api_key,
            base_url,
            site: self.site.unwrap_or_else(|| "Wikipedia".to_string()),
            retry_delays: self.retry_delays.unwrap_or_else(|| DEFAULT_DELAYS.to_vec()),
        })
    }
}

/// Synchronous SerpApi client restricted to a single document site.
pub struct SerpApiClient {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    site: String,
    retry_delays: Vec<Duration>,
}

impl SerpApiClient {
    /// Returns the base URL configured for this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the document site this client searches.
    pub fn site(&self) -> &str {
        &self.site
    }

    fn search_internal(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        let url = format!("{}/search.json", self.base_url);
        let q = format!("{} as_sitesearch:{}", query, self.site);

        tracing::debug!(query, site = %self.site, "searching document site");

        retry_with_backoff(&self.retry_delays, || {
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("engine", "google"),
                    ("q", q.as_str()),
                    ("api_key", self.api_key.as_str()),
                ])
                .send()
                .map_err(transport_error)?;

            let status = response.status();
            let body = response.text().map_err(transport_error)?;

            match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(json) if json.get("error").is_some() || status.is_success() => {
                    parse_search_response(&json, &self.site)
                }
                Ok(_) => Err(SearchError::Http {
                    status: status.as_u16(),
                }),
                Err(_) if !status.is_success() => Err(SearchError::Http {
                    status: status.as_u16(),
                }),
                Err(e) => Err(SearchError::Serialization(e)),
            }
        })
    }
}

impl SearchClientTrait for SerpApiClient {
    fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        self.search_internal(query)
    }
}

/// Parses a SerpApi response body into classified search results.
fn parse_search_response(
    json: &serde_json::Value,
    site: &str,
) -> Result<Vec<SearchResult>, SearchError> {
    if let Some(error) = json.get("error") {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());

        if message.contains(NO_RESULTS_MESSAGE) {
            return Ok(Vec::new());
        }
        return Err(SearchError::Api { message });
    }

    let results = json
        .get("organic_results")
        .and_then(|r| r.as_array())
        .map(|results| {
            results
                .iter()
                .filter_map(|r| r.get("title").and_then(|t| t.as_str()))
                .map(|title| SearchResult::classify(title, site))
                .collect()
        })
        .unwrap_or_default();

    Ok(results)
}
