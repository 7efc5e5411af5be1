//! Accidentally repeated words ("the the")

use super::GrammarRule;
use crate::text::PreparedText;
use crate::{Finding, FindingKind, Severity};
use regex::Regex;

/// Words that legitimately double up ("had had", "that that")
const ALLOWED_REPEATS: &[&str] = &["had", "that", "is", "do"];

pub struct RepeatedWordRule {
    word: Regex,
}

impl RepeatedWordRule {
    pub fn new() -> Self {
        Self {
            word: Regex::new(r"\b\w+\b").unwrap(),
        }
    }
}

impl Default for RepeatedWordRule {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarRule for RepeatedWordRule {
    fn id(&self) -> &'static str {
        "repeated-word"
    }

    fn check(&self, text: &PreparedText) -> Vec<Finding> {
        let source = text.as_str();
        let words: Vec<regex::Match> = self.word.find_iter(source).collect();
        words
            .windows(2)
            .filter(|pair| {
                let (a, b) = (pair[0], pair[1]);
                let gap = &source[a.end()..b.start()];
                !gap.is_empty()
                    && gap.chars().all(|c| c == ' ' || c == '\t')
                    && a.as_str().eq_ignore_ascii_case(b.as_str())
                    && !a.as_str().chars().all(|c| c.is_ascii_digit())
                    && !ALLOWED_REPEATS.contains(&a.as_str().to_lowercase().as_str())
            })
            .map(|pair| {
                Finding::local(
                    FindingKind::Grammar,
                    Severity::Medium,
                    text.span_of(pair[0].start(), pair[1].end()),
                    format!("Repeated word: '{}'", pair[1].as_str()),
                )
                .with_suggestion(pair[0].as_str())
            })
            .collect()
    }
}
