//! Prepared text: normalized content with sentence and paragraph segments
//! located by character offsets.

pub mod preprocess;
pub mod readability;

pub use preprocess::{extract_text, preprocess, ExtractError};

use crate::{DocumentStats, Span};
use regex::Regex;
use std::sync::OnceLock;

/// A sentence or paragraph of the prepared text
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    /// Character span in the prepared text
    pub span: Span,
}

/// Immutable, preprocessed text shared by every facet of one request.
#[derive(Debug, Clone)]
pub struct PreparedText {
    text: String,
    /// Byte offset of every char, used to translate regex matches to char offsets
    char_starts: Vec<usize>,
    sentences: Vec<Segment>,
    paragraphs: Vec<Segment>,
    words: Vec<String>,
}

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\b\w+(?:'\w+)?\b").unwrap())
}

fn paragraph_break() -> &'static Regex {
    static BREAK: OnceLock<Regex> = OnceLock::new();
    BREAK.get_or_init(|| Regex::new(r"\n[ \t\r]*\n").unwrap())
}

fn sentence_end() -> &'static Regex {
    static END: OnceLock<Regex> = OnceLock::new();
    END.get_or_init(|| Regex::new(r#"[.!?]+["')\]]*\s+"#).unwrap())
}

impl PreparedText {
    /// Preprocess `raw` and segment it
    pub fn new(raw: &str) -> Self {
        Self::from_normalized(preprocess(raw))
    }

    /// Segment text that is already normalized
    pub fn from_normalized(text: String) -> Self {
        let char_starts: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        let words = word_regex()
            .find_iter(&text)
            .map(|m| m.as_str().to_string())
            .collect();

        let mut prepared = Self {
            text,
            char_starts,
            sentences: Vec::new(),
            paragraphs: Vec::new(),
            words,
        };
        prepared.segment();
        prepared
    }

    fn segment(&mut self) {
        let mut paragraphs = Vec::new();
        let mut sentences = Vec::new();

        let mut para_start = 0;
        let mut bounds: Vec<(usize, usize)> = paragraph_break()
            .find_iter(&self.text)
            .map(|m| {
                let range = (para_start, m.start());
                para_start = m.end();
                range
            })
            .collect();
        bounds.push((para_start, self.text.len()));

        for (start, end) in bounds {
            let Some((start, end)) = trim_range(&self.text, start, end) else {
                continue;
            };
            paragraphs.push(self.segment_at(start, end));

            let body = &self.text[start..end];
            let mut sent_start = start;
            for m in sentence_end().find_iter(body) {
                let next = body[m.end()..].chars().next();
                if !next.is_some_and(|c| c.is_uppercase() || c.is_ascii_digit() || c == '"') {
                    continue;
                }
                if let Some((s, e)) = trim_range(&self.text, sent_start, start + m.end()) {
                    sentences.push(self.segment_at(s, e));
                }
                sent_start = start + m.end();
            }
            if let Some((s, e)) = trim_range(&self.text, sent_start, end) {
                sentences.push(self.segment_at(s, e));
            }
        }

        self.paragraphs = paragraphs;
        self.sentences = sentences;
    }

    fn segment_at(&self, start_byte: usize, end_byte: usize) -> Segment {
        Segment {
            text: self.text[start_byte..end_byte].to_string(),
            span: Span::new(self.char_offset(start_byte), self.char_offset(end_byte)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.char_starts.len()
    }

    /// Translate a byte offset into a character offset
    pub fn char_offset(&self, byte: usize) -> usize {
        self.char_starts.partition_point(|&b| b < byte)
    }

    /// Character span of a byte range (such as a regex match)
    pub fn span_of(&self, start_byte: usize, end_byte: usize) -> Span {
        Span::new(self.char_offset(start_byte), self.char_offset(end_byte))
    }

    /// Text covered by a character span
    pub fn slice(&self, span: Span) -> &str {
        let span = span.clamp_to(self.char_len());
        let start = self.char_starts.get(span.start).copied().unwrap_or(self.text.len());
        let end = self.char_starts.get(span.end).copied().unwrap_or(self.text.len());
        &self.text[start..end]
    }

    pub fn sentences(&self) -> &[Segment] {
        &self.sentences
    }

    pub fn paragraphs(&self) -> &[Segment] {
        &self.paragraphs
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn stats(&self) -> DocumentStats {
        let words = self.words.len();
        let sentences = self.sentences.len();
        let paragraphs = self.paragraphs.len();
        DocumentStats {
            word_count: words,
            sentence_count: sentences,
            paragraph_count: paragraphs,
            avg_sentence_length: if sentences > 0 {
                crate::round2(words as f64 / sentences as f64)
            } else {
                0.0
            },
            // Sentences per paragraph
            avg_paragraph_length: if paragraphs > 0 {
                crate::round2(sentences as f64 / paragraphs as f64)
            } else {
                0.0
            },
        }
    }
}

/// Shrink a byte range to exclude surrounding whitespace; None if nothing is left
fn trim_range(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let slice = &text[start..end];
    let leading = slice.len() - slice.trim_start().len();
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some((start + leading, start + leading + trimmed.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_segmentation() {
        let text = PreparedText::new("This is a simple test sentence. It has two sentences.");
        let sentences = text.sentences();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].text, "This is a simple test sentence.");
        assert_eq!(sentences[1].text, "It has two sentences.");
        assert_eq!(sentences[1].span, Span::new(32, 53));
    }

    #[test]
    fn test_lowercase_continuation_does_not_split() {
        let text = PreparedText::new("We met at 5 p.m. on friday. Then we left.");
        assert_eq!(text.sentences().len(), 2);
    }

    #[test]
    fn test_paragraphs_and_sentence_boundaries() {
        let text = PreparedText::new("First one. Second one.\n\nThird one here");
        assert_eq!(text.paragraphs().len(), 2);
        assert_eq!(text.sentences().len(), 3);
        assert_eq!(text.sentences()[2].text, "Third one here");
        assert_eq!(text.slice(text.paragraphs()[1].span), "Third one here");
    }

    #[test]
    fn test_char_offsets_with_multibyte() {
        let text = PreparedText::new("Caf\u{e9} is open. Visit soon.");
        let second = &text.sentences()[1];
        assert_eq!(second.span.start, 14);
        assert_eq!(text.slice(second.span), "Visit soon.");
    }

    #[test]
    fn test_stats() {
        let text = PreparedText::new("One two three. Four five six.\n\nSeven eight.");
        let stats = text.stats();
        assert_eq!(stats.word_count, 8);
        assert_eq!(stats.sentence_count, 3);
        assert_eq!(stats.paragraph_count, 2);
        assert_eq!(stats.avg_sentence_length, 2.67);
        assert_eq!(stats.avg_paragraph_length, 1.5);
    }

    #[test]
    fn test_contractions_are_single_words() {
        let text = PreparedText::new("It's fine and we don't mind.");
        assert_eq!(text.word_count(), 6);
    }

    #[test]
    fn test_empty_text() {
        let text = PreparedText::new("   ");
        assert_eq!(text.char_len(), 0);
        assert!(text.sentences().is_empty());
        assert_eq!(text.stats(), DocumentStats::default());
    }
}
