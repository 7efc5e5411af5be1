//! Local grammar, spelling and style rules

pub mod article;
pub mod capitalization;
pub mod clarity;
pub mod common_errors;
pub mod punctuation;
pub mod repeated_word;
pub mod spelling;
pub mod style;

pub use article::ArticleAgreementRule;
pub use capitalization::{LowercaseIRule, SentenceCapitalizationRule};
pub use clarity::LongSentenceRule;
pub use common_errors::CommonErrorsRule;
pub use punctuation::{DoubledPunctuationRule, MissingTerminalPunctuationRule};
pub use repeated_word::RepeatedWordRule;
pub use spelling::SpellingRule;
pub use style::{PassiveVoiceRule, WordyPhraseRule};

use crate::config::RuleSeverity;
use crate::text::PreparedText;
use crate::Finding;
use std::collections::HashMap;

/// Trait for local grammar rules
pub trait GrammarRule: Send + Sync {
    /// Stable rule id in kebab-case, used by config overrides
    fn id(&self) -> &'static str;

    /// Check the text and return findings located by character span
    fn check(&self, text: &PreparedText) -> Vec<Finding>;
}

/// Runs a set of rules with per-rule severity overrides
pub struct RuleChecker {
    rules: Vec<Box<dyn GrammarRule>>,
    overrides: HashMap<String, RuleSeverity>,
}

impl RuleChecker {
    /// Checker with the built-in rule set
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
            overrides: HashMap::new(),
        }
    }

    /// Checker with no rules registered
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            overrides: HashMap::new(),
        }
    }

    pub fn with_rule(mut self, rule: Box<dyn GrammarRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_overrides(mut self, overrides: &HashMap<String, RuleSeverity>) -> Self {
        self.overrides = overrides.clone();
        self
    }

    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    /// Run every enabled rule. Findings come back in rule order.
    pub fn check(&self, text: &PreparedText) -> Vec<Finding> {
        let mut findings = Vec::new();
        for rule in &self.rules {
            let override_severity = match self.overrides.get(rule.id()) {
                Some(RuleSeverity::Off) => continue,
                Some(setting) => setting.to_severity(),
                None => None,
            };
            let mut found = rule.check(text);
            if let Some(severity) = override_severity {
                for finding in &mut found {
                    finding.severity = severity;
                }
            }
            tracing::trace!("rule {} produced {} findings", rule.id(), found.len());
            findings.extend(found);
        }
        findings
    }
}

impl Default for RuleChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn default_rules() -> Vec<Box<dyn GrammarRule>> {
    vec![
        Box::new(SpellingRule::new()),
        Box::new(RepeatedWordRule::new()),
        Box::new(SentenceCapitalizationRule::new()),
        Box::new(LowercaseIRule::new()),
        Box::new(ArticleAgreementRule::new()),
        Box::new(DoubledPunctuationRule::new()),
        Box::new(MissingTerminalPunctuationRule::new()),
        Box::new(CommonErrorsRule::new()),
        Box::new(WordyPhraseRule::new()),
        Box::new(PassiveVoiceRule::new()),
        Box::new(LongSentenceRule::new()),
    ]
}

/// Give `replacement` the capitalization of `original`'s first letter
pub(crate) fn match_case(original: &str, replacement: &str) -> String {
    let starts_upper = original.chars().next().is_some_and(|c| c.is_uppercase());
    if !starts_upper {
        return replacement.to_string();
    }
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Severity;

    #[test]
    fn test_clean_text_has_no_findings() {
        let text = PreparedText::new("This is a simple test sentence. It has two sentences.");
        assert!(RuleChecker::new().check(&text).is_empty());
    }

    #[test]
    fn test_rule_ids_are_unique() {
        let checker = RuleChecker::new();
        let mut ids = checker.rule_ids();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn test_overrides_disable_and_reweight() {
        let text = PreparedText::new("I recieve the the letters every day.");
        let baseline = RuleChecker::new().check(&text);
        assert_eq!(baseline.len(), 2);

        let mut overrides = HashMap::new();
        overrides.insert("repeated-word".to_string(), RuleSeverity::Off);
        overrides.insert("spelling".to_string(), RuleSeverity::Low);
        let findings = RuleChecker::new().with_overrides(&overrides).check(&text);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Low);
    }

    #[test]
    fn test_match_case() {
        assert_eq!(match_case("Teh", "the"), "The");
        assert_eq!(match_case("teh", "the"), "the");
    }
}
