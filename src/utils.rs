//! Shared helpers for the CLI: filesystem setup and answer presentation.

use std::path::Path;

use anyhow::{Context, Result};

/// Ensures the parent directory of `path` exists.
///
/// Creates the directory structure if it doesn't exist using `create_dir_all`.
///
/// # Errors
///
/// Returns an error if directory creation fails.
pub fn ensure_parent_directory(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Strips leading and trailing ASCII punctuation and whitespace from an
/// extracted answer.
pub fn clean_answer(answer: &str) -> &str {
    answer.trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
}

/// Wraps the first occurrence of `answer` in `paragraph` with `open` and
/// `close`.
///
/// Returns the paragraph unchanged when the answer is empty or does not occur
/// in it verbatim.
pub fn emphasize_answer(paragraph: &str, answer: &str, open: &str, close: &str) -> String {
    if answer.is_empty() {
        return paragraph.to_string();
    }

    match paragraph.find(answer) {
        Some(start) => {
            let end = start + answer.len();
            format!(
                "{}{}{}{}{}",
                &paragraph[..start],
                open,
                answer,
                close,
                &paragraph[end..]
            )
        }
        None => paragraph.to_string(),
    }
}
