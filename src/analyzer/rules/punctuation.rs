//! Punctuation rules

use super::GrammarRule;
use crate::text::PreparedText;
use crate::{Finding, FindingKind, Severity, Span};
use regex::Regex;

/// Doubled punctuation like ",," or "!!", and two-dot "ellipses"
pub struct DoubledPunctuationRule {
    pattern: Regex,
}

impl DoubledPunctuationRule {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"[,;:]{2,}|[!?]{2,}|\.{2,}").unwrap(),
        }
    }
}

impl Default for DoubledPunctuationRule {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarRule for DoubledPunctuationRule {
    fn id(&self) -> &'static str {
        "punctuation-doubled"
    }

    fn check(&self, text: &PreparedText) -> Vec<Finding> {
        self.pattern
            .find_iter(text.as_str())
            .filter(|m| m.as_str() != "...")
            .map(|m| {
                let first = m.as_str().chars().next().unwrap_or('.');
                let suggestion = if first == '.' && m.as_str().len() > 3 {
                    "...".to_string()
                } else {
                    first.to_string()
                };
                Finding::local(
                    FindingKind::Punctuation,
                    Severity::Low,
                    text.span_of(m.start(), m.end()),
                    format!("Repeated punctuation '{}'", m.as_str()),
                )
                .with_suggestion(suggestion)
            })
            .collect()
    }
}

/// Prose paragraphs should end with terminal punctuation
pub struct MissingTerminalPunctuationRule {
    min_words: usize,
}

impl MissingTerminalPunctuationRule {
    pub fn new() -> Self {
        Self { min_words: 8 }
    }
}

impl Default for MissingTerminalPunctuationRule {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarRule for MissingTerminalPunctuationRule {
    fn id(&self) -> &'static str {
        "missing-terminal-punctuation"
    }

    fn check(&self, text: &PreparedText) -> Vec<Finding> {
        text.paragraphs()
            .iter()
            .filter(|p| {
                // Headings and list items are not prose
                !p.text.starts_with('#') && !p.text.starts_with("- ") && !p.text.starts_with("* ")
            })
            .filter(|p| p.text.split_whitespace().count() >= self.min_words)
            .filter(|p| {
                !p.text
                    .trim_end_matches(['"', '\'', ')', ']'])
                    .ends_with(['.', '!', '?', ':'])
            })
            .map(|p| {
                let end = p.span.end;
                Finding::local(
                    FindingKind::Punctuation,
                    Severity::Low,
                    Span::new(end.saturating_sub(1), end),
                    "Paragraph does not end with punctuation",
                )
                .with_suggestion(".")
            })
            .collect()
    }
}
