//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `WIKIQA_*` environment
//! variables (a `.env` file is honoured by the binary) or CLI flags.
//! Provider credentials and endpoints (`SERP_API_KEY`, `HF_API_TOKEN`,
//! `WIKIQA_QA_URL`, `WIKIQA_QA_MODEL`) are read by the client builders.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::resolver::DEFAULT_SIMILARITY_THRESHOLD;
use crate::service::{DEFAULT_QUERY_MAX_CHARS, DEFAULT_SCORE_THRESHOLD};

/// File name of the query-title cache.
pub const CACHE_FILE_NAME: &str = "query_title_cache.json";

/// Errors that can occur while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric setting could not be parsed.
    #[error("invalid value '{value}' for {name}: expected a number")]
    InvalidNumber { name: &'static str, value: String },

    /// A numeric setting parsed but is outside its allowed range.
    #[error("value {value} for {name} is out of range: {expected}")]
    OutOfRange {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Query-title cache location. Default: `{data_dir}/wikiqa/query_title_cache.json`.
    pub cache_path: PathBuf,

    /// Wikipedia language edition. Default: `en`.
    pub language: String,

    /// Confidence above which scanning stops early. Default: `0.80`.
    pub score_threshold: f64,

    /// Minimum similarity for reusing a cached title. Default: `0.90`.
    pub similarity_threshold: f64,

    /// Longest accepted question, in characters. Default: `386`.
    pub query_max_chars: usize,

    /// Timeout for each provider request. Default: 30 seconds.
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            language: "en".to_string(),
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            query_max_chars: DEFAULT_QUERY_MAX_CHARS,
            timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    const ENV_CACHE_PATH: &'static str = "WIKIQA_CACHE_PATH";
    const ENV_LANGUAGE: &'static str = "WIKIQA_LANGUAGE";
    const ENV_SCORE_THRESHOLD: &'static str = "WIKIQA_SCORE_THRESHOLD";
    const ENV_SIMILARITY_THRESHOLD: &'static str = "WIKIQA_SIMILARITY_THRESHOLD";
    const ENV_QUERY_MAX_CHARS: &'static str = "WIKIQA_QUERY_MAX_CHARS";
    const ENV_TIMEOUT_SECS: &'static str = "WIKIQA_TIMEOUT_SECS";

    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let cache_path = Self::parse_string_from_env(Self::ENV_CACHE_PATH)
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_path);
        let language =
            Self::parse_string_from_env(Self::ENV_LANGUAGE).unwrap_or(defaults.language);
        let score_threshold =
            Self::parse_unit_interval(Self::ENV_SCORE_THRESHOLD, defaults.score_threshold)?;
        let similarity_threshold = Self::parse_unit_interval(
            Self::ENV_SIMILARITY_THRESHOLD,
            defaults.similarity_threshold,
        )?;
        let query_max_chars =
            Self::parse_positive(Self::ENV_QUERY_MAX_CHARS, defaults.query_max_chars as u64)?
                as usize;
        let timeout = Self::parse_positive(Self::ENV_TIMEOUT_SECS, defaults.timeout.as_secs())
            .map(Duration::from_secs)?;

        Ok(Self {
            cache_path,
            language,
            score_threshold,
            similarity_threshold,
            query_max_chars,
            timeout,
        })
    }

    /// Checks that a threshold given on the command line is within `[0, 1]`.
    pub fn validate_threshold(name: &'static str, value: f64) -> Result<f64, ConfigError> {
        if (0.0..=1.0).contains(&value) {
            Ok(value)
        } else {
            Err(ConfigError::OutOfRange {
                name,
                value: value.to_string(),
                expected: "between 0.0 and 1.0",
            })
        }
    }

    fn parse_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_unit_interval(var_name: &'static str, default: f64) -> Result<f64, ConfigError> {
        match Self::parse_string_from_env(var_name) {
            Some(value) => {
                let parsed: f64 = value.parse().map_err(|_| ConfigError::InvalidNumber {
                    name: var_name,
                    value: value.clone(),
                })?;
                Self::validate_threshold(var_name, parsed)
            }
            None => Ok(default),
        }
    }

    fn parse_positive(var_name: &'static str, default: u64) -> Result<u64, ConfigError> {
        match Self::parse_string_from_env(var_name) {
            Some(value) => {
                let parsed: u64 = value.parse().map_err(|_| ConfigError::InvalidNumber {
                    name: var_name,
                    value: value.clone(),
                })?;
                if parsed == 0 {
                    return Err(ConfigError::OutOfRange {
                        name: var_name,
                        value,
                        expected: "greater than zero",
                    });
                }
                Ok(parsed)
            }
            None => Ok(default),
        }
    }
}

/// Returns `{data_dir}/wikiqa/query_title_cache.json`, or the file name in the
/// working directory when no data directory is known.
fn default_cache_path() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join("wikiqa").join(CACHE_FILE_NAME),
        None => PathBuf::from(CACHE_FILE_NAME),
    }
}
