use super::*;

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::{TempDir, tempdir};

use crate::cache::QueryTitleCache;
use crate::scorer::{ScoredSpan, ScorerClientTrait};
use crate::search::{SearchClientTrait, SearchResult};

const GODEL_TEXT: &str = "Kurt Friedrich Gödel was a logician, mathematician, and philosopher.\nHe is considered along with Aristotle and Frege to be one of the most significant logicians in history.\n\nDeath\n\nIn his later life, Gödel suffered periods of mental instability and illness.\nGödel died on 14 January 1978 in Princeton Hospital.";

struct MockSearch {
    titles: Vec<&'static str>,
    calls: AtomicUsize,
}

impl MockSearch {
    fn new(titles: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            titles,
            calls: AtomicUsize::new(0),
        })
    }
}

impl SearchClientTrait for MockSearch {
    fn search(&self, _query: &str) -> Result<Vec<SearchResult>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .titles
            .iter()
            .map(|t| SearchResult::classify(*t, "Wikipedia"))
            .collect())
    }
}

struct MockContent {
    documents: HashMap<&'static str, &'static str>,
    fetched: Mutex<Vec<String>>,
}

impl MockContent {
    fn new(documents: &[(&'static str, &'static str)]) -> Arc<Self> {
        Arc::new(Self {
            documents: documents.iter().copied().collect(),
            fetched: Mutex::new(Vec::new()),
        })
    }
}

impl ContentSourceTrait for MockContent {
    fn fetch_text(&self, title: &str) -> Result<Option<String>, FetchError> {
        self.fetched.lock().unwrap().push(title.to_string());
        Ok(self.documents.get(title).map(|t| t.to_string()))
    }
}

/// Scores paragraphs mentioning "died" highly, everything else low.
struct KeywordScorer {
    calls: AtomicUsize,
}

impl ScorerClientTrait for KeywordScorer {
    fn score(&self, _question: &str, context: &str) -> Result<ScoredSpan, ScoringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if context.contains("died") {
            Ok(ScoredSpan::new("14 January 1978", 0.93))
        } else {
            Ok(ScoredSpan::new("logician", 0.12))
        }
    }
}

struct BrokenScorer;

impl ScorerClientTrait for BrokenScorer {
    fn score(&self, _question: &str, _context: &str) -> Result<ScoredSpan, ScoringError> {
        Err(ScoringError::Http { status: 401 })
    }
}

struct Fixture {
    _dir: TempDir,
    search: Arc<MockSearch>,
    content: Arc<MockContent>,
    scorer: Arc<KeywordScorer>,
    service: AnswerService,
}

fn fixture(search_titles: Vec<&'static str>, cached: &[(&str, &str)]) -> Fixture {
    let dir = tempdir().expect("failed to create temp dir");
    let cache = QueryTitleCache::load(dir.path().join("cache.json")).expect("failed to load cache");
    for (query, title) in cached {
        cache.put(query, title).expect("failed to seed cache");
    }

    let search = MockSearch::new(search_titles);
    let content = MockContent::new(&[("Kurt Gödel", GODEL_TEXT), ("Stub", "Tiny")]);
    let scorer = Arc::new(KeywordScorer {
        calls: AtomicUsize::new(0),
    });

    let service = AnswerService::new(
        DocumentResolver::new(cache, search.clone()),
        content.clone(),
        AnswerScanner::new(scorer.clone()),
    );

    Fixture {
        _dir: dir,
        search,
        content,
        scorer,
        service,
    }
}

#[test]
fn answers_question_end_to_end() {
    let f = fixture(vec!["Kurt Gödel - Wikipedia"], &[]);

    let outcome = f
        .service
        .answer_question("When did Kurt Godel die?")
        .expect("answer_question failed");

    let answer = match outcome {
        AnswerOutcome::Answered(answer) => answer,
        AnswerOutcome::NotFound(reason) => panic!("expected an answer, got {reason}"),
    };
    assert_eq!(answer.answer_text, "14 January 1978");
    assert_eq!(answer.score, 0.93);
    assert_eq!(answer.document_title, "Kurt Gödel");
    assert!(answer.source_paragraph.contains("Princeton Hospital"));
    assert_eq!(answer.title_source, TitleSource::Searched { cached: true });
    assert_eq!(f.scorer.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn repeated_question_uses_cached_title() {
    let f = fixture(vec!["Kurt Gödel - Wikipedia"], &[]);

    f.service.answer_question("When did Kurt Godel die?").unwrap();
    let outcome = f.service.answer_question("When did Kurt Gödel die?").unwrap();

    assert_eq!(f.search.calls.load(Ordering::SeqCst), 1);
    assert!(matches!(
        outcome,
        AnswerOutcome::Answered(Answer {
            title_source: TitleSource::Cached,
            ..
        })
    ));
}

#[test]
fn unresolved_query_is_not_found_without_fetching() {
    let f = fixture(vec!["Some blog - Medium"], &[]);

    let outcome = f.service.answer_question("What is the airspeed of a swallow?").unwrap();

    assert_eq!(outcome, AnswerOutcome::NotFound(NotFoundReason::UnresolvedQuery));
    assert!(f.content.fetched.lock().unwrap().is_empty());
    assert_eq!(f.scorer.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_document_is_not_found() {
    let f = fixture(vec!["Nonexistent Article - Wikipedia"], &[]);

    let outcome = f.service.answer_question("Tell me about it").unwrap();

    assert_eq!(
        outcome,
        AnswerOutcome::NotFound(NotFoundReason::MissingDocument {
            title: "Nonexistent Article".to_string()
        })
    );
    assert_eq!(f.scorer.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn document_without_paragraphs_is_not_found() {
    let f = fixture(vec![], &[]);

    let outcome = f.service.answer_from_title("Anything?", "Stub").unwrap();

    assert_eq!(
        outcome,
        AnswerOutcome::NotFound(NotFoundReason::NoParagraphs {
            title: "Stub".to_string()
        })
    );
}

#[test]
fn answer_from_title_bypasses_resolution() {
    let f = fixture(vec!["Paris - Wikipedia"], &[]);

    let outcome = f
        .service
        .answer_from_title("When did he die?", "  Kurt Gödel ")
        .unwrap();

    assert!(matches!(
        outcome,
        AnswerOutcome::Answered(Answer {
            title_source: TitleSource::Manual,
            ..
        })
    ));
    assert_eq!(f.search.calls.load(Ordering::SeqCst), 0);
    assert!(f.service.resolver().cache().is_empty());
    assert_eq!(*f.content.fetched.lock().unwrap(), vec!["Kurt Gödel"]);
}

#[test]
fn empty_query_is_rejected() {
    let f = fixture(vec![], &[]);

    let err = f.service.answer_question("   ").unwrap_err();

    assert!(matches!(err, AnswerError::EmptyQuery));
    assert!(err.is_user_error());
}

#[test]
fn overlong_query_is_rejected() {
    let f = fixture(vec![], &[]);
    let service = f.service.with_query_max_chars(10);

    let err = service.answer_question("This question is far too long").unwrap_err();

    assert!(matches!(err, AnswerError::QueryTooLong { len: 29, max: 10 }));
    assert!(err.is_user_error());
}

#[test]
fn query_limit_counts_characters() {
    let f = fixture(vec![], &[("ööööö", "Kurt Gödel")]);
    let service = f.service.with_query_max_chars(5);

    assert!(service.resolve("ööööö").is_ok());
}

#[test]
fn scoring_failures_propagate() {
    let dir = tempdir().unwrap();
    let cache = QueryTitleCache::load(dir.path().join("cache.json")).unwrap();
    let service = AnswerService::new(
        DocumentResolver::new(cache, MockSearch::new(vec!["Kurt Gödel - Wikipedia"])),
        MockContent::new(&[("Kurt Gödel", GODEL_TEXT)]),
        AnswerScanner::new(Arc::new(BrokenScorer)),
    );

    let err = service.answer_question("When did Kurt Godel die?").unwrap_err();

    assert!(matches!(err, AnswerError::Scoring(ScoringError::Http { status: 401 })));
    assert!(!err.is_user_error());
    assert!(!err.is_timeout());
}

#[test]
fn cache_only_service_fails_on_miss() {
    let dir = tempdir().unwrap();
    let cache = QueryTitleCache::load(dir.path().join("cache.json")).unwrap();
    let service = AnswerService::new(
        DocumentResolver::cache_only(cache),
        MockContent::new(&[]),
        AnswerScanner::new(Arc::new(BrokenScorer)),
    );

    let err = service.answer_question("Who wrote Hamlet?").unwrap_err();

    assert!(matches!(err, AnswerError::Search(SearchError::NotConfigured)));
}

#[test]
fn higher_threshold_scans_whole_document() {
    let f = fixture(vec!["Kurt Gödel - Wikipedia"], &[]);
    let service = f.service.with_score_threshold(0.99);

    let outcome = service.answer_question("When did Kurt Godel die?").unwrap();

    assert!(matches!(outcome, AnswerOutcome::Answered(Answer { score, .. }) if score == 0.93));
    assert_eq!(f.scorer.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn not_found_reasons_display() {
    assert!(
        NotFoundReason::UnresolvedQuery
            .to_string()
            .contains("did not lead to an article")
    );
    assert_eq!(
        NotFoundReason::MissingDocument {
            title: "X".to_string()
        }
        .to_string(),
        "no article titled 'X' exists"
    );
}

#[test]
fn failed_cache_write_is_reported_on_the_answer() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("store");
    std::fs::create_dir(&store).unwrap();
    let cache = QueryTitleCache::load(store.join("cache.json")).unwrap();
    std::fs::remove_dir_all(&store).unwrap();

    let service = AnswerService::new(
        DocumentResolver::new(cache, MockSearch::new(vec!["Kurt Gödel - Wikipedia"])),
        MockContent::new(&[("Kurt Gödel", GODEL_TEXT)]),
        AnswerScanner::new(Arc::new(KeywordScorer {
            calls: AtomicUsize::new(0),
        })),
    );

    let outcome = service.answer_question("When did Kurt Godel die?").unwrap();

    let answer = match outcome {
        AnswerOutcome::Answered(answer) => answer,
        AnswerOutcome::NotFound(reason) => panic!("expected an answer, got {reason}"),
    };
    assert_eq!(answer.answer_text, "14 January 1978");
    assert_eq!(answer.title_source, TitleSource::Searched { cached: false });
    assert!(service.resolver().cache().is_empty());
}

#[test]
fn validate_query_trims_and_bounds_length() {
    assert_eq!(validate_query("  Who wrote Hamlet? ", 386).unwrap(), "Who wrote Hamlet?");
    assert!(matches!(validate_query(" \t\n", 386), Err(AnswerError::EmptyQuery)));
    assert!(matches!(
        validate_query("abcdef", 5),
        Err(AnswerError::QueryTooLong { len: 6, max: 5 })
    ));
    assert_eq!(validate_query("ööööö", 5).unwrap(), "ööööö");
}
