use std::sync::Arc;

use thiserror::Error;

use crate::content::{ContentSourceTrait, FetchError};
use crate::resolver::{DocumentResolver, Resolution};
use crate::scanner::{AnswerScanner, ScanOutcome};
use crate::scorer::ScoringError;
use crate::search::SearchError;

/// Default confidence above which scanning stops early.
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.80;

/// Default maximum query length in characters.
pub const DEFAULT_QUERY_MAX_CHARS: usize = 386;

/// Errors that prevent a question from being answered.
///
/// None of these mean "no answer exists"; that outcome is
/// [`AnswerOutcome::NotFound`].
#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("question cannot be empty")]
    EmptyQuery,

    #[error("question is {len} characters long; the maximum is {max}")]
    QueryTooLong { len: usize, max: usize },

    #[error("document search failed: {0}")]
    Search(#[from] SearchError),

    #[error("failed to fetch document text: {0}")]
    Fetch(#[from] FetchError),

    #[error("answer scoring failed: {0}")]
    Scoring(#[from] ScoringError),
}

impl AnswerError {
    /// Returns true for problems with the caller's input rather than with a
    /// provider.
    pub fn is_user_error(&self) -> bool {
        matches!(self, AnswerError::EmptyQuery | AnswerError::QueryTooLong { .. })
    }

    /// Returns true if a provider call timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            AnswerError::Search(SearchError::Timeout(_))
                | AnswerError::Fetch(FetchError::Timeout(_))
                | AnswerError::Scoring(ScoringError::Timeout(_))
        )
    }
}

/// An answer and where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub answer_text: String,
    pub score: f64,
    pub source_paragraph: String,
    pub document_title: String,
    /// How `document_title` was chosen
    pub title_source: TitleSource,
}

/// How the answering document's title was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSource {
    /// Reused from a cached similar query.
    Cached,
    /// Found by search. `cached` is false when the title could not be
    /// written to the cache.
    Searched { cached: bool },
    /// Named by the caller; the cache was not consulted.
    Manual,
}

impl TitleSource {
    fn from_resolution(resolution: &Resolution) -> Option<Self> {
        match resolution {
            Resolution::Cached { .. } => Some(TitleSource::Cached),
            Resolution::Searched { cached, .. } => Some(TitleSource::Searched { cached: *cached }),
            Resolution::Unresolved => None,
        }
    }
}

/// Why no answer was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFoundReason {
    /// No document could be identified for the query.
    UnresolvedQuery,
    /// A title was resolved but the content source has no such document.
    MissingDocument { title: String },
    /// The document had no paragraphs worth scoring.
    NoParagraphs { title: String },
}

impl std::fmt::Display for NotFoundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvedQuery => {
                write!(f, "the query did not lead to an article likely to answer it")
            }
            Self::MissingDocument { title } => write!(f, "no article titled '{title}' exists"),
            Self::NoParagraphs { title } => {
                write!(f, "the article '{title}' has no paragraphs to search")
            }
        }
    }
}

/// Terminal outcome of answering a question.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    Answered(Answer),
    NotFound(NotFoundReason),
}

/// Answers questions by resolving a document, fetching it and scanning it.
///
/// The service owns the resolver (and through it the query-title cache) and
/// shares long-lived provider clients. It has no UI dependencies.
pub struct AnswerService {
    resolver: DocumentResolver,
    content: Arc<dyn ContentSourceTrait>,
    scanner: AnswerScanner,
    score_threshold: f64,
    query_max_chars: usize,
}

impl AnswerService {
    /// Creates a service with the default score threshold and query limit.
    pub fn new(
        resolver: DocumentResolver,
        content: Arc<dyn ContentSourceTrait>,
        scanner: AnswerScanner,
    ) -> Self {
        Self {
            resolver,
            content,
            scanner,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            query_max_chars: DEFAULT_QUERY_MAX_CHARS,
        }
    }

    /// Sets the confidence above which scanning stops early.
    #[must_use]
    pub fn with_score_threshold(mut self, threshold: f64) -> Self {
        self.score_threshold = threshold;
        self
    }

    /// Sets the maximum accepted query length in characters.
    #[must_use]
    pub fn with_query_max_chars(mut self, max: usize) -> Self {
        self.query_max_chars = max;
        self
    }

    /// Returns the resolver.
    pub fn resolver(&self) -> &DocumentResolver {
        &self.resolver
    }

    /// Resolves `query` to a document title without fetching or scanning.
    pub fn resolve(&self, query: &str) -> Result<Resolution, AnswerError> {
        let query = self.validate(query)?;
        Ok(self.resolver.resolve(query)?)
    }

    /// Answers `query`: resolve a document, fetch its text, scan it.
    ///
    /// # Errors
    ///
    /// Invalid input and provider failures are errors. Not finding a
    /// document or an answer is [`AnswerOutcome::NotFound`].
    pub fn answer_question(&self, query: &str) -> Result<AnswerOutcome, AnswerError> {
        let query = self.validate(query)?;

        let resolution = self.resolver.resolve(query)?;
        let (Some(title_source), Some(title)) = (
            TitleSource::from_resolution(&resolution),
            resolution.into_title(),
        ) else {
            return Ok(AnswerOutcome::NotFound(NotFoundReason::UnresolvedQuery));
        };

        self.answer_in(query, title, title_source)
    }

    /// Answers `query` from the document titled `title`, bypassing
    /// resolution and the cache.
    pub fn answer_from_title(&self, query: &str, title: &str) -> Result<AnswerOutcome, AnswerError> {
        let query = self.validate(query)?;
        self.answer_in(query, title.trim().to_string(), TitleSource::Manual)
    }

    fn answer_in(
        &self,
        query: &str,
        title: String,
        title_source: TitleSource,
    ) -> Result<AnswerOutcome, AnswerError> {
        let Some(text) = self.content.fetch_text(&title)? else {
            tracing::info!(title = %title, "resolved title has no document");
            return Ok(AnswerOutcome::NotFound(NotFoundReason::MissingDocument { title }));
        };

        match self
            .scanner
            .scan(query, Some(&text), self.score_threshold)?
        {
            ScanOutcome::Answer {
                candidate,
                paragraphs_scored,
                stopped_early,
            } => {
                tracing::info!(
                    title = %title,
                    score = candidate.score,
                    paragraphs_scored,
                    stopped_early,
                    "answer found"
                );
                Ok(AnswerOutcome::Answered(Answer {
                    answer_text: candidate.text,
                    score: candidate.score,
                    source_paragraph: candidate.source_paragraph,
                    document_title: title,
                    title_source,
                }))
            }
            ScanOutcome::Unsuccessful => {
                Ok(AnswerOutcome::NotFound(NotFoundReason::NoParagraphs { title }))
            }
        }
    }

    fn validate<'q>(&self, query: &'q str) -> Result<&'q str, AnswerError> {
        validate_query(query, self.query_max_chars)
    }
}

/// Trims `query` and checks it is non-empty and at most `max_chars`
/// characters long.
///
/// # Errors
///
/// Returns [`AnswerError::EmptyQuery`] or [`AnswerError::QueryTooLong`].
pub fn validate_query(query: &str, max_chars: usize) -> Result<&str, AnswerError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AnswerError::EmptyQuery);
    }

    let len = query.chars().count();
    if len > max_chars {
        return Err(AnswerError::QueryTooLong {
            len,
            max: max_chars,
        });
    }

    Ok(query)
}

#[cfg(test)]
mod tests;
