//! Query → document title resolution.
//!
//! The resolver first looks for a cached query close enough to the new one
//! and reuses its title; only when none is close enough does it call the
//! search provider, caching whatever title the search produces.

use std::sync::Arc;

use crate::cache::QueryTitleCache;
use crate::search::{SearchClientTrait, SearchError, first_document_title};
use crate::similarity::similarity;

/// Minimum similarity for reusing a cached query's title.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.90;

/// How a query was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Reused the title of a sufficiently similar cached query.
    Cached {
        title: String,
        matched_query: String,
        similarity: f64,
    },
    /// Found by the search provider. `cached` is false when the title could
    /// not be written to the cache.
    Searched { title: String, cached: bool },
    /// Search returned no document result. Never cached.
    Unresolved,
}

impl Resolution {
    /// Returns the resolved title, if any.
    pub fn title(&self) -> Option<&str> {
        match self {
            Resolution::Cached { title, .. } | Resolution::Searched { title, .. } => Some(title),
            Resolution::Unresolved => None,
        }
    }

    /// Consumes the resolution, returning the title, if any.
    pub fn into_title(self) -> Option<String> {
        match self {
            Resolution::Cached { title, .. } | Resolution::Searched { title, .. } => Some(title),
            Resolution::Unresolved => None,
        }
    }
}

/// Resolves queries to document titles, backed by a query-title cache.
pub struct DocumentResolver {
    cache: QueryTitleCache,
    search: Option<Arc<dyn SearchClientTrait>>,
    similarity_threshold: f64,
}

impl DocumentResolver {
    /// Creates a resolver that owns `cache` and falls back to `search`.
    pub fn new(cache: QueryTitleCache, search: Arc<dyn SearchClientTrait>) -> Self {
        Self {
            cache,
            search: Some(search),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    /// Creates a resolver without a search provider.
    ///
    /// Cache hits still resolve; anything else fails with
    /// [`SearchError::NotConfigured`].
    pub fn cache_only(cache: QueryTitleCache) -> Self {
        Self {
            cache,
            search: None,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    /// Sets the minimum similarity for reusing a cached title.
    #[must_use]
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Returns the underlying cache.
    pub fn cache(&self) -> &QueryTitleCache {
        &self.cache
    }

    /// Returns true if a search provider is configured.
    pub fn has_search(&self) -> bool {
        self.search.is_some()
    }

    /// Resolves `query` to a document title.
    ///
    /// # Errors
    ///
    /// Returns the search provider's error unchanged; there is no retry at
    /// this level. A failed cache write is not an error: the title is still
    /// returned, as [`Resolution::Searched`] with `cached: false`.
    pub fn resolve(&self, query: &str) -> Result<Resolution, SearchError> {
        if let Some((matched_query, title, score)) = self.closest_cached(query)
            && score >= self.similarity_threshold
        {
            tracing::info!(query, matched_query = %matched_query, similarity = score, title = %title, "reusing cached title");
            return Ok(Resolution::Cached {
                title,
                matched_query,
                similarity: score,
            });
        }

        let search = self.search.as_ref().ok_or(SearchError::NotConfigured)?;

        tracing::info!(query, "cache miss, searching");
        let results = search.search(query)?;

        let Some(title) = first_document_title(&results) else {
            tracing::info!(query, results = results.len(), "no document result");
            return Ok(Resolution::Unresolved);
        };

        let cached = match self.cache.put(query, &title) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(query, title = %title, error = %e, "resolved title was not cached");
                false
            }
        };

        Ok(Resolution::Searched { title, cached })
    }

    /// Finds the cached query most similar to `query`.
    ///
    /// Keys are visited in lexical order and only a strictly higher score
    /// replaces the current best, so ties go to the lexically smallest key.
    fn closest_cached(&self, query: &str) -> Option<(String, String, f64)> {
        let snapshot = self.cache.snapshot();
        if snapshot.is_empty() {
            return None;
        }

        let mut best: Option<(String, String, f64)> = None;
        for (cached_query, title) in snapshot {
            let score = similarity(query, &cached_query);
            if best.as_ref().is_none_or(|(_, _, best_score)| score > *best_score) {
                best = Some((cached_query, title, score));
            }
        }

        best
    }
}
