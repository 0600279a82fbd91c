//! Paragraph-by-paragraph answer extraction with early stopping.
//!
//! The scanner asks the QA scorer for the best span in each paragraph, in
//! document order, keeps only the best candidate seen so far, and stops as
//! soon as that candidate's score is above the caller's threshold. A later
//! paragraph could score higher; it is never examined.

mod segmenter;

use std::sync::Arc;

use crate::scorer::{ScorerClientTrait, ScoringError};

pub use segmenter::{HeadingStrippingSegmenter, Segmenter};

/// Paragraph marker reported when there was no document to scan.
pub const UNSUCCESSFUL_MARKER: &str = "UNSUCCESSFUL";

/// Consecutive scoring failures tolerated before the scan is aborted.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: usize = 3;

/// The best answer span found so far and the paragraph it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerCandidate {
    /// Extracted answer text
    pub text: String,
    /// Scorer confidence
    pub score: f64,
    /// Paragraph the answer was extracted from
    pub source_paragraph: String,
}

impl AnswerCandidate {
    /// Sentinel reported when no document was available: empty text, score 0,
    /// and [`UNSUCCESSFUL_MARKER`] as the paragraph.
    pub fn no_answer() -> Self {
        Self {
            text: String::new(),
            score: 0.0,
            source_paragraph: UNSUCCESSFUL_MARKER.to_string(),
        }
    }
}

/// Result of scanning one document.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// At least one paragraph was scored.
    Answer {
        candidate: AnswerCandidate,
        /// Paragraphs successfully scored before returning
        paragraphs_scored: usize,
        /// True if the threshold was crossed before the end of the document
        stopped_early: bool,
    },
    /// There was no text to scan, or it held no scorable paragraphs.
    Unsuccessful,
}

impl ScanOutcome {
    /// Returns the candidate, or [`AnswerCandidate::no_answer`] when the scan
    /// was unsuccessful.
    pub fn into_candidate(self) -> AnswerCandidate {
        match self {
            ScanOutcome::Answer { candidate, .. } => candidate,
            ScanOutcome::Unsuccessful => AnswerCandidate::no_answer(),
        }
    }

    /// Returns the paragraph holding the answer, or [`UNSUCCESSFUL_MARKER`].
    pub fn matched_paragraph(&self) -> &str {
        match self {
            ScanOutcome::Answer { candidate, .. } => &candidate.source_paragraph,
            ScanOutcome::Unsuccessful => UNSUCCESSFUL_MARKER,
        }
    }

    pub fn is_unsuccessful(&self) -> bool {
        matches!(self, ScanOutcome::Unsuccessful)
    }
}

/// Scans documents for the best answer to a question.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use wikiqa::scanner::AnswerScanner;
/// use wikiqa::scorer::{ScoredSpan, ScorerClientTrait, ScoringError};
///
/// struct Fixed;
///
/// impl ScorerClientTrait for Fixed {
///     fn score(&self, _q: &str, _c: &str) -> Result<ScoredSpan, ScoringError> {
///         Ok(ScoredSpan::new("1978", 0.97))
///     }
/// }
///
/// let scanner = AnswerScanner::new(Arc::new(Fixed));
/// let outcome = scanner.scan("When did Kurt Gödel die?", None, 0.8).unwrap();
/// assert!(outcome.is_unsuccessful());
/// ```
pub struct AnswerScanner {
    scorer: Arc<dyn ScorerClientTrait>,
    segmenter: Box<dyn Segmenter>,
    max_consecutive_failures: usize,
}

impl AnswerScanner {
    /// Creates a scanner using [`HeadingStrippingSegmenter`] segmentation.
    pub fn new(scorer: Arc<dyn ScorerClientTrait>) -> Self {
        Self {
            scorer,
            segmenter: Box::new(HeadingStrippingSegmenter::default()),
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }

    /// Replaces the segmentation strategy.
    #[must_use]
    pub fn with_segmenter(mut self, segmenter: impl Segmenter + 'static) -> Self {
        self.segmenter = Box::new(segmenter);
        self
    }

    /// Sets how many consecutive scoring failures abort a scan (minimum 1).
    #[must_use]
    pub fn with_max_consecutive_failures(mut self, max: usize) -> Self {
        self.max_consecutive_failures = max.max(1);
        self
    }

    /// Finds the best answer to `question` in `text`.
    ///
    /// Paragraphs are scored strictly in document order. A paragraph replaces
    /// the current best only if it scores strictly higher; scanning stops as
    /// soon as the best score is strictly above `score_threshold`.
    ///
    /// `None` text yields [`ScanOutcome::Unsuccessful`] without calling the
    /// scorer.
    ///
    /// # Errors
    ///
    /// A failed scoring call counts as a non-match and the scan continues.
    /// The error is returned instead when the failure is systemic (see
    /// [`ScoringError::is_systemic`]), when the consecutive-failure limit is
    /// reached, or when no paragraph could be scored at all.
    ///
    /// Each scoring call carries the scorer's own timeout and retries, so the
    /// time before a failure surfaces is roughly the failure limit times one
    /// call's full retry budget. Scorers used here should keep that budget
    /// short; see [`HfQaClientBuilder::retry_delays`](crate::HfQaClientBuilder::retry_delays).
    pub fn scan(
        &self,
        question: &str,
        text: Option<&str>,
        score_threshold: f64,
    ) -> Result<ScanOutcome, ScoringError> {
        let Some(text) = text else {
            return Ok(ScanOutcome::Unsuccessful);
        };

        let paragraphs = self.segmenter.segment(text);
        tracing::debug!(paragraphs = paragraphs.len(), "scanning document");

        // below any valid score, so the first scored paragraph always wins
        let mut best_score = -1.0;
        let mut best: Option<AnswerCandidate> = None;
        let mut paragraphs_scored = 0;
        let mut consecutive_failures = 0;
        let mut last_error = None;

        for (index, paragraph) in paragraphs.into_iter().enumerate() {
            let span = match self.scorer.score(question, &paragraph) {
                Ok(span) => span,
                Err(e) if e.is_systemic() => return Err(e),
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(paragraph = index, error = %e, "skipping paragraph after scoring failure");
                    if consecutive_failures >= self.max_consecutive_failures {
                        return Err(e);
                    }
                    last_error = Some(e);
                    continue;
                }
            };
            consecutive_failures = 0;
            paragraphs_scored += 1;

            if span.score > best_score {
                best_score = span.score;
                let candidate = AnswerCandidate {
                    text: span.answer,
                    score: span.score,
                    source_paragraph: paragraph,
                };

                if best_score > score_threshold {
                    tracing::debug!(paragraph = index, score = best_score, "threshold crossed, stopping early");
                    return Ok(ScanOutcome::Answer {
                        candidate,
                        paragraphs_scored,
                        stopped_early: true,
                    });
                }
                best = Some(candidate);
            }
        }

        match (best, last_error) {
            (Some(candidate), _) => Ok(ScanOutcome::Answer {
                candidate,
                paragraphs_scored,
                stopped_early: false,
            }),
            (None, Some(e)) => Err(e),
            (None, None) => Ok(ScanOutcome::Unsuccessful),
        }
    }
}
