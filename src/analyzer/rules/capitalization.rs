//! Capitalization rules

use super::GrammarRule;
use crate::text::PreparedText;
use crate::{Finding, FindingKind, Severity, Span};
use regex::Regex;

/// Sentences should start with a capital letter
pub struct SentenceCapitalizationRule;

impl SentenceCapitalizationRule {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SentenceCapitalizationRule {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarRule for SentenceCapitalizationRule {
    fn id(&self) -> &'static str {
        "sentence-capitalization"
    }

    fn check(&self, text: &PreparedText) -> Vec<Finding> {
        let mut findings = Vec::new();
        for sentence in text.sentences() {
            // Skip list markers, quotes and headings before the first letter
            let Some((offset, first)) = sentence
                .text
                .chars()
                .enumerate()
                .find(|(_, c)| c.is_alphanumeric())
            else {
                continue;
            };
            if !first.is_lowercase() {
                continue;
            }
            let start = sentence.span.start + offset;
            let word: String = sentence.text.chars().skip(offset).take_while(|c| c.is_alphanumeric()).collect();
            let fixed: String = first.to_uppercase().chain(word.chars().skip(1)).collect();
            findings.push(
                Finding::local(
                    FindingKind::Grammar,
                    Severity::Medium,
                    Span::new(start, start + word.chars().count()),
                    "Sentence does not start with a capital letter",
                )
                .with_suggestion(fixed),
            );
        }
        findings
    }
}

/// The pronoun "i" written in lowercase
pub struct LowercaseIRule {
    pattern: Regex,
}

impl LowercaseIRule {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"\bi(?:'m|'ve|'ll|'d)?\b").unwrap(),
        }
    }
}

impl Default for LowercaseIRule {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarRule for LowercaseIRule {
    fn id(&self) -> &'static str {
        "lowercase-i"
    }

    fn check(&self, text: &PreparedText) -> Vec<Finding> {
        let source = text.as_str();
        self.pattern
            .find_iter(source)
            .filter(|m| {
                // "i.e." and "e.g., i" style abbreviations
                !source[m.end()..].starts_with('.')
            })
            .map(|m| {
                let fixed = format!("I{}", &m.as_str()[1..]);
                Finding::local(
                    FindingKind::Grammar,
                    Severity::Medium,
                    text.span_of(m.start(), m.end()),
                    "The pronoun 'I' should be capitalized",
                )
                .with_suggestion(fixed)
            })
            .collect()
    }
}
