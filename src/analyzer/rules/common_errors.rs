//! Frequent grammar slips that a pattern can catch reliably

use super::{match_case, GrammarRule};
use crate::text::PreparedText;
use crate::{Finding, FindingKind, Severity};
use regex::Regex;

struct Pattern {
    regex: Regex,
    replacement: &'static str,
    message: &'static str,
}

pub struct CommonErrorsRule {
    patterns: Vec<Pattern>,
}

impl CommonErrorsRule {
    pub fn new() -> Self {
        let pattern = |re: &str, replacement, message| Pattern {
            regex: Regex::new(re).unwrap(),
            replacement,
            message,
        };
        Self {
            patterns: vec![
                pattern(r"(?i)\bcould of\b", "could have", "'could of' should be 'could have'"),
                pattern(r"(?i)\bshould of\b", "should have", "'should of' should be 'should have'"),
                pattern(r"(?i)\bwould of\b", "would have", "'would of' should be 'would have'"),
                pattern(r"(?i)\bmust of\b", "must have", "'must of' should be 'must have'"),
                pattern(r"(?i)\bmight of\b", "might have", "'might of' should be 'might have'"),
                pattern(r"(?i)\btheir (is|are|was|were)\b", "there", "'their' is possessive; use 'there'"),
                pattern(r"(?i)\byour welcome\b", "you're welcome", "'your' is possessive; use 'you're'"),
                pattern(r"(?i)\bbetween you and I\b", "between you and me", "Use the object pronoun after a preposition"),
                pattern(r"(?i)\birregardless\b", "regardless", "'irregardless' is nonstandard"),
                pattern(r"(?i)\bless (people|things|items|errors)\b", "fewer", "Use 'fewer' with countable nouns"),
            ],
        }
    }
}

impl Default for CommonErrorsRule {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarRule for CommonErrorsRule {
    fn id(&self) -> &'static str {
        "common-errors"
    }

    fn check(&self, text: &PreparedText) -> Vec<Finding> {
        let mut findings = Vec::new();
        for pattern in &self.patterns {
            for caps in pattern.regex.captures_iter(text.as_str()) {
                let Some(whole) = caps.get(0) else { continue };
                // Keep the trailing word when only the leading word is wrong
                let suggestion = match caps.get(1) {
                    Some(rest) => format!("{} {}", pattern.replacement, rest.as_str()),
                    None => pattern.replacement.to_string(),
                };
                findings.push(
                    Finding::local(
                        FindingKind::Grammar,
                        Severity::High,
                        text.span_of(whole.start(), whole.end()),
                        pattern.message,
                    )
                    .with_suggestion(match_case(whole.as_str(), &suggestion)),
                );
            }
        }
        findings
    }
}
