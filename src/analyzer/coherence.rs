//! Coherence facet: sentence flow, paragraph transitions and weak links

use super::merge::{merge, RemoteFindings};
use super::{preview, Facet, FacetContext, FacetError, FacetInput, ScoreCalculator};
use crate::embedding::cosine_similarity;
use crate::remote::{prompts, RemoteOutcome};
use crate::suggestions::SuggestionRanker;
use crate::text::{readability, PreparedText, Segment};
use crate::{round2, FacetKind, FacetScore, Finding, FindingKind, Severity, Span};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;
use tracing::debug;

/// Transition markers by the relation they signal
pub const TRANSITIONS: &[(&str, &[&str])] = &[
    (
        "addition",
        &["furthermore", "moreover", "additionally", "also", "besides", "in addition", "likewise", "similarly", "equally important"],
    ),
    (
        "contrast",
        &["however", "nevertheless", "nonetheless", "on the other hand", "conversely", "in contrast", "yet", "although", "despite"],
    ),
    (
        "cause_effect",
        &["therefore", "consequently", "as a result", "thus", "hence", "accordingly", "because", "since", "due to"],
    ),
    (
        "sequence",
        &["first", "second", "third", "finally", "next", "then", "subsequently", "meanwhile", "afterward", "lastly"],
    ),
    (
        "example",
        &["for example", "for instance", "specifically", "namely", "such as", "including", "particularly", "especially"],
    ),
    (
        "conclusion",
        &["in conclusion", "to conclude", "in summary", "overall", "to sum up", "finally", "in brief", "ultimately"],
    ),
];

/// Paragraph boundaries connected this strongly earn a bonus when marked
const STRONG_CONNECTION: f64 = 0.5;
/// Average flow below which the text needs more connective phrases
const LOW_FLOW: f64 = 0.4;
/// Similarity below which a weak link is an abrupt topic jump
const ABRUPT_JUMP: f64 = 0.2;
/// Characters at the start of a paragraph searched for a marker
const MARKER_WINDOW: usize = 50;
const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParagraphTransition {
    /// Index of the paragraph before the boundary
    pub paragraph_index: usize,
    pub transition_type: Option<&'static str>,
    #[serde(serialize_with = "crate::serialize_round2")]
    pub connection_strength: f64,
    pub has_explicit_transition: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeakConnection {
    /// Index of the first sentence of the pair
    pub sentence_index: usize,
    #[serde(serialize_with = "crate::serialize_round2")]
    pub similarity_score: f64,
    pub sentence_before: String,
    pub sentence_after: String,
    pub suggestion: String,
}

pub struct CoherenceFacet;

impl Facet for CoherenceFacet {
    fn kind(&self) -> FacetKind {
        FacetKind::Coherence
    }

    fn analyze(&self, input: &FacetInput, ctx: &FacetContext<'_>) -> Result<FacetScore, FacetError> {
        let text = input.text.as_ref();
        let sentences = text.sentences();

        let (vectors, remote) = ctx.pool.join(
            || {
                if sentences.len() < 2 {
                    return Ok(Vec::new());
                }
                let batch: Vec<String> = sentences.iter().map(|s| s.text.clone()).collect();
                ctx.embed(&batch)
            },
            || ctx.enrich(|| prompts::coherence_prompt(text.as_str()), text.char_len()),
        );
        let vectors = vectors?;
        ctx.cancel.check()?;

        let flow: Vec<f64> = vectors.windows(2).map(|w| cosine_similarity(&w[0], &w[1])).collect();
        let transitions = paragraph_transitions(text, &vectors);
        let weak = weak_connections(sentences, &flow, ctx.settings.weak_link_threshold);
        let readability = readability::measure(text);

        let strong_transitions = strong_transitions(&transitions);
        let score = ScoreCalculator::coherence(&flow, weak.len(), strong_transitions, readability.flesch_reading_ease);

        let (remote_findings, remote_suggestions, rating) = match &remote {
            RemoteOutcome::Enriched(value) => (
                RemoteFindings::Available(problematic_sections(value, text)),
                string_list(value, "specific_improvements", 2),
                value.get("overall_coherence").and_then(Value::as_str).map(str::to_string),
            ),
            RemoteOutcome::Unavailable(reason) => {
                debug!("coherence: local findings only ({})", reason);
                (RemoteFindings::unavailable(reason.clone()), Vec::new(), None)
            }
        };

        let local_findings = weak_link_findings(sentences, &weak);
        let findings = merge(&local_findings, &remote_findings, ctx.settings.overlap_tolerance);

        let suggestions = SuggestionRanker::new(ctx.settings.suggestion_cap)
            .rank(remote_suggestions, heuristic_suggestions(&flow, &transitions, &weak));

        let mut detail = BTreeMap::new();
        detail.insert("sentence_flow".to_string(), json!(flow.iter().map(|&f| round2(f)).collect::<Vec<_>>()));
        detail.insert("paragraph_transitions".to_string(), json!(transitions));
        detail.insert("strong_transitions".to_string(), json!(strong_transitions));
        detail.insert("weak_connections".to_string(), json!(weak));
        detail.insert("readability".to_string(), json!(readability));
        if let Some(rating) = rating {
            detail.insert("remote_rating".to_string(), json!(rating));
        }

        Ok(FacetScore {
            score,
            findings,
            suggestions,
            detail,
        })
    }
}

/// The first transition kind whose marker opens the paragraph
pub fn transition_type(paragraph: &str) -> Option<&'static str> {
    let lowered = paragraph.to_lowercase();
    let window: String = lowered.chars().take(MARKER_WINDOW).collect();
    TRANSITIONS
        .iter()
        .find(|(_, markers)| {
            markers
                .iter()
                .any(|m| lowered.starts_with(m) || window.contains(&format!(" {}", m)))
        })
        .map(|(kind, _)| *kind)
}

/// One entry per paragraph boundary. `vectors` are the sentence embeddings,
/// empty when the text has fewer than two sentences.
fn paragraph_transitions(text: &PreparedText, vectors: &[Vec<f32>]) -> Vec<ParagraphTransition> {
    let paragraphs = text.paragraphs();
    let sentences = text.sentences();
    let sentence_range = |para: &Segment| {
        let inside: Vec<usize> = sentences
            .iter()
            .enumerate()
            .filter(|(_, s)| s.span.start >= para.span.start && s.span.end <= para.span.end)
            .map(|(i, _)| i)
            .collect();
        Some((*inside.first()?, *inside.last()?))
    };

    paragraphs
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            let kind = transition_type(&pair[1].text);
            let connection_strength = match (sentence_range(&pair[0]), sentence_range(&pair[1])) {
                (Some((_, last)), Some((first, _))) => match (vectors.get(last), vectors.get(first)) {
                    (Some(a), Some(b)) => cosine_similarity(a, b),
                    _ => 0.0,
                },
                _ => 0.0,
            };
            ParagraphTransition {
                paragraph_index: i,
                transition_type: kind,
                connection_strength,
                has_explicit_transition: kind.is_some(),
            }
        })
        .collect()
}

/// Boundaries that open with a marker and are strongly connected
fn strong_transitions(transitions: &[ParagraphTransition]) -> usize {
    transitions
        .iter()
        .filter(|t| t.has_explicit_transition && t.connection_strength > STRONG_CONNECTION)
        .count()
}

fn weak_connections(sentences: &[Segment], flow: &[f64], threshold: f64) -> Vec<WeakConnection> {
    flow.iter()
        .enumerate()
        .filter(|&(_, &similarity)| similarity < threshold)
        .map(|(i, &similarity)| WeakConnection {
            sentence_index: i,
            similarity_score: similarity,
            sentence_before: preview(&sentences[i].text, PREVIEW_CHARS),
            sentence_after: preview(&sentences[i + 1].text, PREVIEW_CHARS),
            suggestion: repair_suggestion(&sentences[i].text, &sentences[i + 1].text).to_string(),
        })
        .collect()
}

/// How to repair the link between two weakly connected sentences
pub fn repair_suggestion(before: &str, after: &str) -> &'static str {
    if after.split_whitespace().count() < 10 {
        return "Consider expanding the second sentence or combining it with the previous one";
    }
    const FILLER: [&str; 7] = ["the", "a", "an", "is", "are", "was", "were"];
    let words = |s: &str| -> HashSet<String> {
        s.to_lowercase()
            .split_whitespace()
            .filter(|w| !FILLER.contains(w))
            .map(str::to_string)
            .collect()
    };
    if words(before).intersection(&words(after)).count() < 2 {
        "Add a transitional sentence to bridge these topics"
    } else {
        "Use transitional phrases to clarify the relationship between these ideas"
    }
}

fn weak_link_severity(similarity: f64) -> Severity {
    if similarity < ABRUPT_JUMP {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn weak_link_findings(sentences: &[Segment], weak: &[WeakConnection]) -> Vec<Finding> {
    weak.iter()
        .map(|w| {
            let i = w.sentence_index;
            Finding::local(
                FindingKind::WeakLink,
                weak_link_severity(w.similarity_score),
                Span::new(sentences[i].span.start, sentences[i + 1].span.end),
                format!("Weak connection between sentences {} and {}", i + 1, i + 2),
            )
            .with_suggestion(w.suggestion.clone())
        })
        .collect()
}

fn heuristic_suggestions(flow: &[f64], transitions: &[ParagraphTransition], weak: &[WeakConnection]) -> Vec<String> {
    let mut suggestions = Vec::new();
    if !flow.is_empty() && flow.iter().sum::<f64>() / (flow.len() as f64) < LOW_FLOW {
        suggestions.push("Consider using more transitional phrases to connect sentences".to_string());
    }
    if weak.len() > 3 {
        suggestions.push("Several sentences appear disconnected. Try to establish clearer logical connections".to_string());
    }
    let unmarked = transitions.iter().filter(|t| !t.has_explicit_transition).count();
    if unmarked as f64 > transitions.len() as f64 / 2.0 {
        suggestions.push("Add transition words or phrases at the beginning of paragraphs".to_string());
    }
    if weak.iter().any(|w| w.similarity_score < ABRUPT_JUMP) {
        suggestions.push("Some sentences seem to jump to new topics abruptly. Consider adding bridging sentences".to_string());
    }
    suggestions
}

fn location_regex() -> &'static Regex {
    static LOCATION: OnceLock<Regex> = OnceLock::new();
    LOCATION.get_or_init(|| Regex::new(r"(?i)(paragraph|sentences?)\s+(\d+)(?:\s*(?:-|to|and)\s*(\d+))?").unwrap())
}

/// Remote problem reports located by "paragraph N" or "sentences X-Y"
/// (1-based). Unlocatable reports are dropped.
fn problematic_sections(value: &Value, text: &PreparedText) -> Vec<Finding> {
    let Some(sections) = value.get("problematic_sections").and_then(Value::as_array) else {
        return Vec::new();
    };

    sections
        .iter()
        .filter_map(|section| {
            let location = section.get("location")?.as_str()?;
            let caps = location_regex().captures(location)?;
            let first: usize = caps.get(2)?.as_str().parse().ok()?;
            let last: usize = caps
                .get(3)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(first);
            let segments = if caps.get(1)?.as_str().to_lowercase().starts_with("paragraph") {
                text.paragraphs()
            } else {
                text.sentences()
            };
            let start = segments.get(first.checked_sub(1)?)?.span.start;
            let end = segments.get(last.max(first) - 1)?.span.end;

            let issue = section
                .get("issue")
                .and_then(Value::as_str)
                .unwrap_or("Weak connection");
            let mut finding = Finding::remote(FindingKind::WeakLink, Severity::Medium, Span::new(start, end), issue);
            if let Some(suggestion) = section.get("suggestion").and_then(Value::as_str) {
                finding = finding.with_suggestion(suggestion);
            }
            Some(finding)
        })
        .collect()
}

/// Up to `limit` strings from the array under `key`
pub(crate) fn string_list(value: &Value, key: &str, limit: usize) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .take(limit)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::testing::{axis, input, run, spread, PrefixEmbedder};
    use crate::config::AnalysisConfig;

    const MARKED: &str = "Alpha starts the story here. Alpha keeps the thread going.\n\n\
                          However, beta opens the second part. Beta closes the piece neatly.";
    const UNMARKED: &str = "Alpha starts the story here. Alpha keeps the thread going.\n\n\
                            Beta opens the second part. Beta closes the piece neatly.";
    const DRIFTING: &str = "Alpha one begins here. Alpha two follows on. Gamma three wanders off. Delta four is elsewhere.";

    /// Cosine with `axis(0)` is about 0.501, which rounds to 0.50
    fn just_above_half() -> Vec<f32> {
        let mut v = spread(4);
        v[1] = 0.99;
        v
    }

    fn boundary_embedder(second: Vec<f32>) -> PrefixEmbedder {
        PrefixEmbedder(vec![
            ("Alpha", axis(0)),
            ("However", second.clone()),
            ("Beta", second),
        ])
    }

    fn weak_link_embedder() -> PrefixEmbedder {
        let mut orthogonal = vec![0.0; crate::analyzer::testing::DIMENSIONS];
        orthogonal[0] = 1.0;
        orthogonal[1] = -1.0;
        // flow: 1.0, then 0.25, then 0.0
        PrefixEmbedder(vec![("Alpha", axis(0)), ("Gamma", spread(16)), ("Delta", orthogonal)])
    }

    fn analyze(text: &str, embedder: &PrefixEmbedder, settings: &AnalysisConfig) -> FacetScore {
        run(&CoherenceFacet, &input(text, &[]), embedder, settings)
    }

    #[test]
    fn test_marked_boundary_just_over_strong_earns_bonus() {
        let score = analyze(MARKED, &boundary_embedder(just_above_half()), &AnalysisConfig::default());
        assert_eq!(score.detail["strong_transitions"], 1);
        // Reported rounded, compared raw
        assert_eq!(score.detail["paragraph_transitions"][0]["connection_strength"], 0.5);
        assert_eq!(score.detail["paragraph_transitions"][0]["transition_type"], "contrast");
    }

    #[test]
    fn test_marked_boundary_at_exactly_strong_earns_no_bonus() {
        let score = analyze(MARKED, &boundary_embedder(spread(4)), &AnalysisConfig::default());
        assert_eq!(score.detail["strong_transitions"], 0);
    }

    #[test]
    fn test_unmarked_boundary_earns_no_bonus() {
        let score = analyze(UNMARKED, &boundary_embedder(just_above_half()), &AnalysisConfig::default());
        assert_eq!(score.detail["strong_transitions"], 0);
        assert_eq!(score.detail["paragraph_transitions"][0]["has_explicit_transition"], false);
    }

    #[test]
    fn test_bonus_raises_score() {
        let settings = AnalysisConfig::default();
        let with_bonus = analyze(MARKED, &boundary_embedder(just_above_half()), &settings);
        let without = analyze(UNMARKED, &boundary_embedder(just_above_half()), &settings);
        assert!(with_bonus.score > without.score);
    }

    #[test]
    fn test_paragraph_transitions_per_boundary() {
        let text = PreparedText::new(
            "Alpha opens. Alpha ends.\n\nFurthermore, beta adds more. Beta ends.\n\nGamma stands alone here.",
        );
        let vectors = vec![axis(0), axis(0), spread(4), spread(4), spread(16)];
        let transitions = paragraph_transitions(&text, &vectors);
        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[0].paragraph_index, 0);
        assert_eq!(transitions[0].transition_type, Some("addition"));
        assert_eq!(transitions[0].connection_strength, 0.5);
        assert_eq!(transitions[1].paragraph_index, 1);
        assert_eq!(transitions[1].transition_type, None);
        assert!(!transitions[1].has_explicit_transition);
        // Without sentence vectors every boundary is unconnected
        assert!(paragraph_transitions(&text, &[]).iter().all(|t| t.connection_strength == 0.0));
    }

    #[test]
    fn test_weak_links_counted_with_severity_split() {
        let score = analyze(DRIFTING, &weak_link_embedder(), &AnalysisConfig::default());
        assert_eq!(score.detail["sentence_flow"], json!([1.0, 0.25, 0.0]));
        assert_eq!(score.detail["weak_connections"].as_array().map(Vec::len), Some(2));
        let severities: Vec<Severity> = score.findings.iter().map(|f| f.severity).collect();
        assert_eq!(severities, vec![Severity::Low, Severity::Medium]);
        assert!(score.findings.iter().all(|f| f.kind == FindingKind::WeakLink));
    }

    #[test]
    fn test_similarity_at_threshold_is_not_weak() {
        let settings = AnalysisConfig {
            weak_link_threshold: 0.25,
            ..AnalysisConfig::default()
        };
        let score = analyze(DRIFTING, &weak_link_embedder(), &settings);
        assert_eq!(score.detail["weak_connections"].as_array().map(Vec::len), Some(1));
        assert_eq!(score.detail["weak_connections"][0]["sentence_index"], 2);
    }

    #[test]
    fn test_weak_links_lower_score() {
        let lenient = AnalysisConfig {
            weak_link_threshold: 0.0,
            ..AnalysisConfig::default()
        };
        let strict = analyze(DRIFTING, &weak_link_embedder(), &AnalysisConfig::default());
        let relaxed = analyze(DRIFTING, &weak_link_embedder(), &lenient);
        assert!(relaxed.score > strict.score);
    }

    #[test]
    fn test_severity_uses_raw_similarity() {
        assert_eq!(weak_link_severity(0.2), Severity::Low);
        assert_eq!(weak_link_severity(0.196), Severity::Medium);

        let text = PreparedText::new("Alpha one begins here. Gamma three wanders off.");
        let weak = weak_connections(text.sentences(), &[0.196], 0.3);
        assert_eq!(json!(weak[0])["similarity_score"], 0.2);
        assert_eq!(weak_link_findings(text.sentences(), &weak)[0].severity, Severity::Medium);
    }

    #[test]
    fn test_transition_type() {
        assert_eq!(transition_type("However, the results differ."), Some("contrast"));
        assert_eq!(transition_type("In the end, and as a result, we won."), Some("cause_effect"));
        assert_eq!(transition_type("The results differ."), None);
        let late = format!("{} therefore", "word ".repeat(12));
        assert_eq!(transition_type(&late), None);
    }

    #[test]
    fn test_repair_suggestion() {
        assert_eq!(
            repair_suggestion("Cats sleep a lot.", "Dogs bark."),
            "Consider expanding the second sentence or combining it with the previous one"
        );
        assert_eq!(
            repair_suggestion(
                "The committee approved the budget today.",
                "Meanwhile the river flooded several farms near the old mill yesterday."
            ),
            "Add a transitional sentence to bridge these topics"
        );
        assert_eq!(
            repair_suggestion(
                "The budget covers new school buses.",
                "The new school buses replace the budget items from last year entirely."
            ),
            "Use transitional phrases to clarify the relationship between these ideas"
        );
    }

    #[test]
    fn test_problematic_sections_are_located() {
        let text = PreparedText::new("First idea here. Second idea here.\n\nA new paragraph starts. It ends.");
        let value = json!({
            "problematic_sections": [
                {"location": "paragraph 2", "issue": "Abrupt shift", "suggestion": "Bridge it"},
                {"location": "sentences 1-2", "issue": "Loose pairing"},
                {"location": "paragraph 9", "issue": "Out of range"},
                {"location": "somewhere", "issue": "Unlocatable"}
            ]
        });
        let findings = problematic_sections(&value, &text);
        assert_eq!(findings.len(), 2);
        assert_eq!(text.slice(findings[0].span), "A new paragraph starts. It ends.");
        assert_eq!(findings[0].suggestion.as_deref(), Some("Bridge it"));
        assert_eq!(text.slice(findings[1].span), "First idea here. Second idea here.");
        assert_eq!(findings[1].source, crate::Source::Remote);
    }

    #[test]
    fn test_heuristic_suggestions() {
        let weak: Vec<WeakConnection> = (0..4)
            .map(|i| WeakConnection {
                sentence_index: i,
                similarity_score: 0.1,
                sentence_before: String::new(),
                sentence_after: String::new(),
                suggestion: String::new(),
            })
            .collect();
        let transitions = vec![ParagraphTransition {
            paragraph_index: 0,
            transition_type: None,
            connection_strength: 0.2,
            has_explicit_transition: false,
        }];
        let suggestions = heuristic_suggestions(&[0.1, 0.1, 0.1, 0.1], &transitions, &weak);
        assert_eq!(suggestions.len(), 4);
        assert!(heuristic_suggestions(&[], &[], &[]).is_empty());
    }

    #[test]
    fn test_string_list_limits() {
        let value = json!({"specific_improvements": ["a", "b", "c"]});
        assert_eq!(string_list(&value, "specific_improvements", 2), vec!["a", "b"]);
        assert!(string_list(&value, "missing", 2).is_empty());
    }
}
