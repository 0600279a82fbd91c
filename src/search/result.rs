//! Search result records and document-title extraction.

/// Separator between the document title and the site name in a result title,
/// e.g. `"Kurt Gödel - Wikipedia"`.
pub const TITLE_SEPARATOR: char = '-';

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Title as shown by the search provider
    title: String,
    /// True if the hit points at the document site
    is_document_result: bool,
}

impl SearchResult {
    /// Creates a result with an explicit document flag.
    pub fn new(title: impl Into<String>, is_document_result: bool) -> Self {
        Self {
            title: title.into(),
            is_document_result,
        }
    }

    /// Creates a result flagged as a document result when its title ends with
    /// `marker` (the document site's name, e.g. `"Wikipedia"`).
    pub fn classify(title: impl Into<String>, marker: &str) -> Self {
        let title = title.into();
        let is_document_result = !marker.is_empty() && title.trim_end().ends_with(marker);
        Self {
            title,
            is_document_result,
        }
    }

    /// Returns the raw result title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns true if the result points at the document site.
    pub fn is_document_result(&self) -> bool {
        self.is_document_result
    }

    /// Extracts the document title: the text before the last
    /// [`TITLE_SEPARATOR`], trimmed.
    ///
    /// Returns `None` for non-document results or when nothing is left after
    /// trimming. Splitting on the last separator keeps hyphenated titles such
    /// as `"Jean-Paul Sartre - Wikipedia"` intact.
    pub fn document_title(&self) -> Option<String> {
        if !self.is_document_result {
            return None;
        }

        let head = match self.title.rsplit_once(TITLE_SEPARATOR) {
            Some((head, _)) => head,
            None => &self.title,
        };
        let head = head.trim();

        (!head.is_empty()).then(|| head.to_string())
    }
}

/// Returns the document title of the first qualifying result, in result order.
pub fn first_document_title(results: &[SearchResult]) -> Option<String> {
    results.iter().find_map(SearchResult::document_title)
}
