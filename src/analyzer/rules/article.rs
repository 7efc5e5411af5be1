//! "a" versus "an" agreement

use super::{match_case, GrammarRule};
use crate::text::PreparedText;
use crate::{Finding, FindingKind, Severity};
use regex::Regex;

/// Vowel-letter words that start with a consonant sound
const CONSONANT_SOUND_PREFIXES: &[&str] = &["uni", "use", "usu", "uti", "ure", "eu", "one", "once", "ewe"];

/// Consonant-letter words that start with a vowel sound
const VOWEL_SOUND_PREFIXES: &[&str] = &["hour", "honest", "honor", "honour", "heir"];

pub struct ArticleAgreementRule {
    pattern: Regex,
}

impl ArticleAgreementRule {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"\b([Aa]n?)\s+([A-Za-z]+)").unwrap(),
        }
    }

    fn wants_an(word: &str) -> bool {
        let lower = word.to_lowercase();
        if VOWEL_SOUND_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            return true;
        }
        if CONSONANT_SOUND_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            return false;
        }
        // Acronyms read letter by letter: "an FBI agent", "a UFO"
        if word.len() > 1 && word.chars().all(|c| c.is_ascii_uppercase()) {
            return matches!(
                word.chars().next(),
                Some('A' | 'E' | 'F' | 'H' | 'I' | 'L' | 'M' | 'N' | 'O' | 'R' | 'S' | 'X')
            );
        }
        matches!(lower.chars().next(), Some('a' | 'e' | 'i' | 'o' | 'u'))
    }
}

impl Default for ArticleAgreementRule {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarRule for ArticleAgreementRule {
    fn id(&self) -> &'static str {
        "article-agreement"
    }

    fn check(&self, text: &PreparedText) -> Vec<Finding> {
        let mut findings = Vec::new();
        for caps in self.pattern.captures_iter(text.as_str()) {
            let (Some(article), Some(word)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let is_an = article.as_str().len() == 2;
            let wants_an = Self::wants_an(word.as_str());
            if is_an == wants_an {
                continue;
            }
            let correct = if wants_an { "an" } else { "a" };
            findings.push(
                Finding::local(
                    FindingKind::Grammar,
                    Severity::Medium,
                    text.span_of(article.start(), word.end()),
                    format!(
                        "Use '{}' instead of '{}' before '{}'",
                        correct,
                        article.as_str(),
                        word.as_str()
                    ),
                )
                .with_suggestion(format!("{} {}", match_case(article.as_str(), correct), word.as_str())),
            );
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_articles() {
        let text = PreparedText::new("It was a apple and an banana.");
        let findings = ArticleAgreementRule::new().check(&text);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].suggestion.as_deref(), Some("an apple"));
        assert_eq!(findings[1].suggestion.as_deref(), Some("a banana"));
    }

    #[test]
    fn test_sound_exceptions() {
        let text = PreparedText::new("A university gave an honest answer within an hour to a user and an FBI agent.");
        assert!(ArticleAgreementRule::new().check(&text).is_empty());
    }

    #[test]
    fn test_sentence_start_keeps_case() {
        let text = PreparedText::new("An dog barked.");
        let findings = ArticleAgreementRule::new().check(&text);
        assert_eq!(findings[0].suggestion.as_deref(), Some("A dog"));
    }
}
