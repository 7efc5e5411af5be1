//! Style rules: wordiness and passive constructions

use super::{match_case, GrammarRule};
use crate::text::PreparedText;
use crate::{Finding, FindingKind, Severity};
use regex::Regex;

const WORDY_PHRASES: &[(&str, &str)] = &[
    ("due to the fact that", "because"),
    ("in spite of the fact that", "although"),
    ("at this point in time", "now"),
    ("in the event that", "if"),
    ("for the purpose of", "for"),
    ("a large number of", "many"),
    ("has the ability to", "can"),
    ("in order to", "to"),
    ("it is important to note that", "note that"),
    ("with regard to", "about"),
];

pub struct WordyPhraseRule {
    phrases: Vec<(Regex, &'static str)>,
}

impl WordyPhraseRule {
    pub fn new() -> Self {
        let phrases = WORDY_PHRASES
            .iter()
            .map(|(phrase, concise)| {
                let pattern = format!(r"(?i)\b{}\b", phrase.replace(' ', r"\s+"));
                (Regex::new(&pattern).unwrap(), *concise)
            })
            .collect();
        Self { phrases }
    }
}

impl Default for WordyPhraseRule {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarRule for WordyPhraseRule {
    fn id(&self) -> &'static str {
        "wordy-phrase"
    }

    fn check(&self, text: &PreparedText) -> Vec<Finding> {
        let mut findings = Vec::new();
        for (regex, concise) in &self.phrases {
            for m in regex.find_iter(text.as_str()) {
                findings.push(
                    Finding::local(
                        FindingKind::Style,
                        Severity::Low,
                        text.span_of(m.start(), m.end()),
                        format!("Wordy phrase: '{}'", m.as_str()),
                    )
                    .with_suggestion(match_case(m.as_str(), concise))
                    .with_explanation("A shorter phrase says the same thing"),
                );
            }
        }
        findings
    }
}

/// Past participles that do not end in -ed
const IRREGULAR_PARTICIPLES: &[&str] = &[
    "written", "given", "taken", "made", "done", "seen", "known", "shown", "built", "sent", "found",
    "held", "told", "chosen", "driven", "broken", "spoken", "eaten", "forgotten", "hidden",
];

pub struct PassiveVoiceRule {
    pattern: Regex,
}

impl PassiveVoiceRule {
    pub fn new() -> Self {
        let pattern = format!(
            r"(?i)\b(?:am|is|are|was|were|be|been|being)\s+(?:\w+ly\s+)?(\w{{2,}}ed|{})\b",
            IRREGULAR_PARTICIPLES.join("|")
        );
        Self {
            pattern: Regex::new(&pattern).unwrap(),
        }
    }
}

impl Default for PassiveVoiceRule {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarRule for PassiveVoiceRule {
    fn id(&self) -> &'static str {
        "passive-voice"
    }

    fn check(&self, text: &PreparedText) -> Vec<Finding> {
        self.pattern
            .find_iter(text.as_str())
            .map(|m| {
                Finding::local(
                    FindingKind::Style,
                    Severity::Low,
                    text.span_of(m.start(), m.end()),
                    format!("Passive voice: '{}'", m.as_str()),
                )
                .with_explanation("Active voice is usually clearer and more direct")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wordy_phrases() {
        let text = PreparedText::new("In order to win, we trained due to the fact that we cared.");
        let findings = WordyPhraseRule::new().check(&text);
        let suggestions: Vec<&str> = findings.iter().filter_map(|f| f.suggestion.as_deref()).collect();
        assert_eq!(findings.len(), 2);
        assert!(suggestions.contains(&"To"));
        assert!(suggestions.contains(&"because"));
    }

    #[test]
    fn test_passive_voice() {
        let text = PreparedText::new("The report was written by the team. Mistakes were quickly corrected. We ship.");
        let findings = PassiveVoiceRule::new().check(&text);
        assert_eq!(findings.len(), 2);
        assert_eq!(text.slice(findings[0].span), "was written");
        assert_eq!(text.slice(findings[1].span), "were quickly corrected");
    }

    #[test]
    fn test_active_voice_passes() {
        let text = PreparedText::new("The team wrote the report. It is red and blue.");
        assert!(PassiveVoiceRule::new().check(&text).is_empty());
    }
}
