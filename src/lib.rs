pub mod cache;
pub mod config;
pub mod content;
pub mod resolver;
pub mod retry;
pub mod scanner;
pub mod scorer;
pub mod search;
pub mod service;
pub mod similarity;
pub mod utils;

pub use cache::{CacheError, QueryTitleCache};
pub use config::{Config, ConfigError};
pub use content::{ContentSourceTrait, FetchError, WikipediaClient, WikipediaClientBuilder};
pub use resolver::{DocumentResolver, Resolution};
pub use scanner::{AnswerCandidate, AnswerScanner, ScanOutcome, UNSUCCESSFUL_MARKER};
pub use scorer::{HfQaClient, HfQaClientBuilder, ScoredSpan, ScorerClientTrait, ScoringError};
pub use search::{SearchClientTrait, SearchError, SearchResult, SerpApiClient, SerpApiClientBuilder};
pub use service::{
    Answer, AnswerError, AnswerOutcome, AnswerService, NotFoundReason, TitleSource, validate_query,
};
pub use similarity::similarity;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cache_accessible_from_crate_root() {
        let dir = tempdir().unwrap();
        let cache = QueryTitleCache::load(dir.path().join("cache.json"));
        assert!(cache.is_ok());
    }

    #[test]
    fn types_accessible_from_crate_root() {
        let result = SearchResult::classify("Paris - Wikipedia", "Wikipedia");
        assert_eq!(result.document_title().as_deref(), Some("Paris"));

        let candidate = AnswerCandidate::no_answer();
        assert_eq!(candidate.source_paragraph, UNSUCCESSFUL_MARKER);

        assert_eq!(similarity("a", "a"), 1.0);
    }
}
