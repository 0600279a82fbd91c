//! Paragraph segmentation strategies.

/// Splits document text into the paragraphs the scanner scores, in document
/// order.
pub trait Segmenter: Send + Sync {
    fn segment(&self, text: &str) -> Vec<String>;
}

/// Default segmentation: blank-line-delimited blocks, minus headings.
///
/// A block that is a single line of at most `max_heading_chars` characters
/// is taken to be a section title (or a fragment too short to hold an answer)
/// and dropped. Multi-line blocks are kept whole, lines joined with `\n`.
#[derive(Debug, Clone)]
pub struct HeadingStrippingSegmenter {
    max_heading_chars: usize,
}

impl HeadingStrippingSegmenter {
    pub const DEFAULT_MAX_HEADING_CHARS: usize = 100;

    pub fn new(max_heading_chars: usize) -> Self {
        Self { max_heading_chars }
    }

    fn is_heading(&self, block: &[&str]) -> bool {
        matches!(block, [line] if line.chars().count() <= self.max_heading_chars)
    }

    fn flush(&self, block: &mut Vec<&str>, paragraphs: &mut Vec<String>) {
        if !block.is_empty() && !self.is_heading(block) {
            paragraphs.push(block.join("\n"));
        }
        block.clear();
    }
}

impl Default for HeadingStrippingSegmenter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_HEADING_CHARS)
    }
}

impl Segmenter for HeadingStrippingSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        let mut paragraphs = Vec::new();
        let mut block: Vec<&str> = Vec::new();

        for line in text.lines().map(str::trim_end) {
            if line.trim().is_empty() {
                self.flush(&mut block, &mut paragraphs);
            } else {
                block.push(line);
            }
        }
        self.flush(&mut block, &mut paragraphs);

        paragraphs
    }
}
