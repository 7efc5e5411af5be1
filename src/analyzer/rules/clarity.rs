//! Clarity rules

use super::GrammarRule;
use crate::text::PreparedText;
use crate::{Finding, FindingKind, Severity};

/// Sentences too long to follow comfortably
pub struct LongSentenceRule {
    max_words: usize,
}

impl LongSentenceRule {
    pub fn new() -> Self {
        Self { max_words: 40 }
    }

    pub fn with_max_words(max_words: usize) -> Self {
        Self { max_words }
    }
}

impl Default for LongSentenceRule {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarRule for LongSentenceRule {
    fn id(&self) -> &'static str {
        "long-sentence"
    }

    fn check(&self, text: &PreparedText) -> Vec<Finding> {
        text.sentences()
            .iter()
            .filter_map(|sentence| {
                let words = sentence.text.split_whitespace().count();
                if words <= self.max_words {
                    return None;
                }
                let severity = if words > self.max_words * 2 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                Some(
                    Finding::local(
                        FindingKind::Clarity,
                        severity,
                        sentence.span,
                        format!("Sentence has {} words", words),
                    )
                    .with_suggestion("Split this sentence into shorter ones")
                    .with_confidence(0.6),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_sentences() {
        let long = format!("Word {}end.", "word ".repeat(44));
        let very_long = format!("Word {}end.", "word ".repeat(89));
        let text = PreparedText::new(&format!("Short one. {} {}", long, very_long));
        let findings = LongSentenceRule::new().check(&text);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].message, "Sentence has 46 words");
        assert_eq!(findings[1].severity, Severity::High);
    }

    #[test]
    fn test_severity_scales_with_length() {
        let rule = LongSentenceRule::with_max_words(5);
        let text = PreparedText::new("One two three four five six seven. One two three four five six seven eight nine ten eleven.");
        let findings = rule.check(&text);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(findings[1].severity, Severity::High);
        assert_eq!(text.slice(findings[0].span), "One two three four five six seven.");
    }
}
