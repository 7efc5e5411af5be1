//! Grammar facet: local rule checker merged with remote findings

use super::merge::{merge, RemoteFindings};
use super::rules::RuleChecker;
use super::{Facet, FacetContext, FacetError, FacetInput, ScoreCalculator};
use crate::remote::{prompts, RemoteOutcome};
use crate::suggestions::SuggestionRanker;
use crate::text::{readability, PreparedText};
use crate::{round2, FacetKind, FacetScore, Finding, FindingKind, Severity, Span};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Finding kinds the grammar facet reports, in suggestion order
const GRAMMAR_KINDS: [FindingKind; 5] = [
    FindingKind::Grammar,
    FindingKind::Spelling,
    FindingKind::Punctuation,
    FindingKind::Style,
    FindingKind::Clarity,
];

pub struct GrammarFacet {
    checker: RuleChecker,
}

impl GrammarFacet {
    pub fn new(checker: RuleChecker) -> Self {
        Self { checker }
    }

    fn remote_findings(&self, text: &PreparedText, ctx: &FacetContext<'_>) -> RemoteFindings {
        match ctx.enrich(|| prompts::grammar_prompt(text.as_str()), text.char_len()) {
            RemoteOutcome::Enriched(value) => RemoteFindings::Available(parse_remote_findings(&value, text.char_len())),
            RemoteOutcome::Unavailable(reason) => RemoteFindings::Unavailable { reason },
        }
    }
}

impl Default for GrammarFacet {
    fn default() -> Self {
        Self::new(RuleChecker::new())
    }
}

impl Facet for GrammarFacet {
    fn kind(&self) -> FacetKind {
        FacetKind::Grammar
    }

    fn analyze(&self, input: &FacetInput, ctx: &FacetContext<'_>) -> Result<FacetScore, FacetError> {
        let text = input.text.as_ref();
        let (local, remote) = ctx.pool.join(
            || ctx.pool.submit(ctx.cancel, || self.checker.check(text)),
            || self.remote_findings(text, ctx),
        );
        let local = local?;
        ctx.cancel.check()?;

        if let RemoteFindings::Unavailable { reason } = &remote {
            debug!("grammar: local findings only ({})", reason);
        }
        let findings = merge(&local, &remote, ctx.settings.overlap_tolerance);
        let score = ScoreCalculator::grammar(&findings, text.word_count());

        let stats = text.stats();
        let local_suggestions = heuristic_suggestions(&findings, stats.avg_sentence_length);
        let suggestions = SuggestionRanker::new(ctx.settings.suggestion_cap).rank(Vec::new(), local_suggestions);

        Ok(FacetScore {
            score,
            suggestions,
            detail: detail_metrics(text, &findings),
            findings,
        })
    }
}

/// Read the remote reply: an array of located errors, or an object holding
/// one under "errors". Entries without a valid position are skipped.
fn parse_remote_findings(value: &Value, char_len: usize) -> Vec<Finding> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("errors") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    items
        .iter()
        .filter_map(|item| {
            let position = item.get("position")?.as_array()?;
            let [start, end] = position.as_slice() else {
                return None;
            };
            let (start, end) = (start.as_u64()? as usize, end.as_u64()? as usize);
            if start > end || end > char_len {
                debug!("grammar: skipping remote finding at invalid position [{}, {}]", start, end);
                return None;
            }

            let text_field = |name: &str| item.get(name).and_then(Value::as_str).map(str::to_string);
            let kind = text_field("type")
                .and_then(|t| FindingKind::from_label(&t))
                .filter(|k| GRAMMAR_KINDS.contains(k))
                .unwrap_or(FindingKind::Grammar);
            let severity = text_field("severity")
                .and_then(|s| Severity::from_label(&s))
                .unwrap_or(Severity::Medium);

            let mut finding = Finding::remote(
                kind,
                severity,
                Span::new(start, end),
                text_field("message").unwrap_or_default(),
            );
            finding.suggestion = text_field("suggestion");
            finding.explanation = text_field("explanation");
            Some(finding)
        })
        .collect()
}

fn heuristic_suggestions(findings: &[Finding], avg_sentence_length: f64) -> Vec<String> {
    let present: HashSet<FindingKind> = findings.iter().map(|f| f.kind).collect();
    let mut suggestions: Vec<String> = GRAMMAR_KINDS
        .iter()
        .filter(|k| present.contains(k))
        .map(|kind| {
            match kind {
                FindingKind::Grammar => "Review sentence structure and ensure subject-verb agreement",
                FindingKind::Spelling => "Use spell-check and proofread carefully for typos",
                FindingKind::Punctuation => "Check punctuation, especially comma usage and sentence endings",
                FindingKind::Style => "Consider varying sentence structure for better flow",
                _ => "Simplify complex sentences for better readability",
            }
            .to_string()
        })
        .collect();

    if findings.len() > 10 {
        suggestions.push("Consider breaking down complex ideas into simpler sentences".to_string());
    }
    if avg_sentence_length > 25.0 {
        suggestions.push("Try using shorter sentences to improve readability".to_string());
    }
    suggestions
}

fn detail_metrics(text: &PreparedText, findings: &[Finding]) -> BTreeMap<String, Value> {
    let mut error_counts: BTreeMap<String, usize> = GRAMMAR_KINDS.iter().map(|k| (k.to_string(), 0)).collect();
    for finding in findings {
        *error_counts.entry(finding.kind.to_string()).or_insert(0) += 1;
    }
    let word_count = text.word_count();

    let mut detail = BTreeMap::new();
    detail.insert("error_counts".to_string(), json!(error_counts));
    detail.insert(
        "error_density".to_string(),
        json!(round2(findings.len() as f64 / word_count.max(1) as f64 * 100.0)),
    );
    detail.insert("readability".to_string(), json!(readability::measure(text)));
    detail.insert("sentence_variety".to_string(), sentence_variety(text));
    detail.insert("vocabulary_level".to_string(), vocabulary_level(text));
    detail
}

fn sentence_variety(text: &PreparedText) -> Value {
    let sentences = text.sentences();
    if sentences.is_empty() {
        return json!({ "variety_score": 0.0 });
    }

    let lengths: Vec<usize> = sentences.iter().map(|s| s.text.split_whitespace().count()).collect();
    let starters: HashSet<String> = sentences
        .iter()
        .filter_map(|s| s.text.split_whitespace().next())
        .map(str::to_lowercase)
        .collect();

    let n = lengths.len() as f64;
    let mean = lengths.iter().sum::<usize>() as f64 / n;
    let variance = lengths.iter().map(|&l| (l as f64 - mean).powi(2)).sum::<f64>() / n;

    json!({
        "variety_score": round2(starters.len() as f64 / n * 100.0),
        "avg_length": round2(mean),
        "length_variance": round2(variance),
        "sentence_patterns": {
            "short": lengths.iter().filter(|&&l| l < 10).count(),
            "medium": lengths.iter().filter(|&&l| (10..20).contains(&l)).count(),
            "long": lengths.iter().filter(|&&l| l >= 20).count(),
        }
    })
}

fn vocabulary_level(text: &PreparedText) -> Value {
    let words = text.words();
    if words.is_empty() {
        return json!({ "total_words": 0, "unique_words": 0, "lexical_diversity": 0.0, "avg_word_length": 0.0 });
    }
    let unique: HashSet<String> = words.iter().map(|w| w.to_lowercase()).collect();
    let total_len: usize = words.iter().map(|w| w.chars().count()).sum();
    json!({
        "total_words": words.len(),
        "unique_words": unique.len(),
        "lexical_diversity": round2(unique.len() as f64 / words.len() as f64),
        "avg_word_length": round2(total_len as f64 / words.len() as f64),
    })
}

/// Lexical diversity recorded in a grammar facet's detail, if any
pub fn lexical_diversity(score: &FacetScore) -> Option<f64> {
    score
        .detail
        .get("vocabulary_level")?
        .get("lexical_diversity")?
        .as_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_findings_skips_bad_positions() {
        let value = json!([
            {"type": "spelling", "severity": "high", "position": [0, 4], "message": "typo", "suggestion": "This"},
            {"type": "grammar", "severity": "low", "position": [10, 5], "message": "reversed"},
            {"type": "style", "position": [0, 999], "message": "out of range"},
            {"type": "style", "position": "nowhere", "message": "no position"},
            {"type": "weird", "severity": "bogus", "position": [5, 9], "message": "defaults"}
        ]);
        let findings = parse_remote_findings(&value, 50);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].kind, FindingKind::Spelling);
        assert_eq!(findings[0].suggestion.as_deref(), Some("This"));
        assert_eq!(findings[0].confidence, 0.9);
        assert_eq!(findings[1].kind, FindingKind::Grammar);
        assert_eq!(findings[1].severity, Severity::Medium);
    }

    #[test]
    fn test_parse_remote_findings_accepts_wrapped_object() {
        let value = json!({"errors": [{"type": "punctuation", "severity": "low", "position": [1, 2], "message": "comma"}]});
        assert_eq!(parse_remote_findings(&value, 10).len(), 1);
        assert!(parse_remote_findings(&json!("nope"), 10).is_empty());
    }

    #[test]
    fn test_heuristic_suggestions_follow_kinds_present() {
        let findings = vec![
            Finding::local(FindingKind::Style, Severity::Low, Span::new(0, 1), "s"),
            Finding::local(FindingKind::Spelling, Severity::High, Span::new(2, 3), "t"),
        ];
        let suggestions = heuristic_suggestions(&findings, 30.0);
        assert_eq!(
            suggestions,
            vec![
                "Use spell-check and proofread carefully for typos",
                "Consider varying sentence structure for better flow",
                "Try using shorter sentences to improve readability",
            ]
        );
        assert!(heuristic_suggestions(&[], 12.0).is_empty());
    }

    #[test]
    fn test_detail_metrics() {
        let text = PreparedText::new("The cat sat down. The dog ran off quickly. A bird sang.");
        let detail = detail_metrics(&text, &[]);
        assert_eq!(detail["error_density"], json!(0.0));
        assert_eq!(detail["error_counts"]["spelling"], json!(0));
        assert_eq!(detail["sentence_variety"]["sentence_patterns"]["short"], json!(3));
        // starters: "the", "a"
        assert_eq!(detail["sentence_variety"]["variety_score"], json!(66.67));
        assert_eq!(detail["vocabulary_level"]["total_words"], json!(12));
        assert_eq!(detail["vocabulary_level"]["unique_words"], json!(11));
    }

    #[test]
    fn test_lexical_diversity_lookup() {
        let score = FacetScore::neutral("x").with_detail("vocabulary_level", json!({"lexical_diversity": 0.75}));
        assert_eq!(lexical_diversity(&score), Some(0.75));
        assert_eq!(lexical_diversity(&FacetScore::neutral("x")), None);
    }
}
