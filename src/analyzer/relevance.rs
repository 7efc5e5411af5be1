//! Relevance facet: topic coverage, key terms, missing aspects and drift

use super::coherence::string_list;
use super::merge::{merge, RemoteFindings};
use super::{preview, Facet, FacetContext, FacetError, FacetInput, ScoreCalculator};
use crate::embedding::cosine_similarity;
use crate::remote::{prompts, RemoteOutcome};
use crate::suggestions::SuggestionRanker;
use crate::text::{PreparedText, Segment};
use crate::{round2, FacetKind, FacetScore, Finding, FindingKind, Severity};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

pub const NO_TOPIC_SUGGESTION: &str = "Please provide a topic to analyze relevance against";
const DRIFT_MESSAGE: &str = "This section seems to drift from the main topic";

/// Aspects a topic in each category is expected to touch on
const ASPECTS: &[(&str, &[&str])] = &[
    ("technical", &["implementation", "architecture", "performance", "scalability"]),
    ("business", &["roi", "cost", "benefit", "strategy", "market"]),
    ("research", &["methodology", "results", "conclusion", "hypothesis", "data"]),
    ("educational", &["examples", "explanation", "definition", "practice", "theory"]),
    ("analysis", &["comparison", "evaluation", "metrics", "findings", "insights"]),
];

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "before", "being", "below", "between", "both", "but", "by", "can", "did", "do",
    "does", "doing", "down", "during", "each", "few", "for", "from", "further", "had", "has", "have",
    "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in",
    "into", "is", "it", "its", "itself", "just", "me", "more", "most", "my", "myself", "no", "nor", "not",
    "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over",
    "own", "same", "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too", "under",
    "until", "up", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
    "why", "will", "with", "would", "you", "your", "yours", "yourself", "yourselves", "also", "could",
    "may", "might", "must", "shall", "yet",
];

/// Filtered tokens below this count are too few for n-gram ranking
const SHORT_TEXT_TOKENS: usize = 20;
const SHORT_TEXT_TERMS: usize = 10;
const MAX_KEY_TERMS: usize = 1000;
/// Key terms reported in the detail
const REPORTED_KEY_TERMS: usize = 20;
const MAX_MISSING_ASPECTS: usize = 5;
/// Paragraphs shorter than this (chars) are not checked for drift
const MIN_DRIFT_PARAGRAPH: usize = 50;
const LOW_COVERAGE: f64 = 50.0;
const HIGH_COVERAGE: f64 = 80.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicDrift {
    pub paragraph_index: usize,
    /// Best similarity to any topic
    #[serde(serialize_with = "crate::serialize_round2")]
    pub relevance_score: f64,
    pub preview: String,
    pub suggestion: String,
}

pub struct RelevanceFacet;

impl Facet for RelevanceFacet {
    fn kind(&self) -> FacetKind {
        FacetKind::Relevance
    }

    fn analyze(&self, input: &FacetInput, ctx: &FacetContext<'_>) -> Result<FacetScore, FacetError> {
        let topics = input.topics.as_slice();
        if topics.is_empty() {
            return Ok(FacetScore::neutral(NO_TOPIC_SUGGESTION));
        }
        let text = input.text.as_ref();

        let checked = drift_candidates(text);

        let (local, remote) = ctx.pool.join(
            || -> Result<_, FacetError> {
                let mut batch = Vec::with_capacity(1 + topics.len() + checked.len());
                batch.push(text.as_str().to_string());
                batch.extend(topics.iter().cloned());
                batch.extend(checked.iter().map(|(_, p)| p.text.clone()));
                let vectors = ctx.embed(&batch)?;
                let key_terms = ctx.pool.submit(ctx.cancel, || extract_key_terms(text))?;
                Ok((vectors, key_terms))
            },
            || ctx.enrich(|| prompts::relevance_prompt(text.as_str(), topics), text.char_len()),
        );
        let (vectors, key_terms) = local?;
        ctx.cancel.check()?;

        let (text_vector, rest) = vectors.split_first().ok_or_else(|| FacetError::Failed {
            facet: FacetKind::Relevance,
            message: "embedding provider returned no vectors".to_string(),
        })?;
        let (topic_vectors, paragraph_vectors) = rest.split_at(topics.len());

        let coverage: Vec<(String, f64)> = topics
            .iter()
            .zip(topic_vectors)
            .map(|(topic, v)| (topic.clone(), cosine_similarity(text_vector, v) * 100.0))
            .collect();

        let drift = topic_drift(&checked, paragraph_vectors, topic_vectors, ctx.settings.drift_threshold);

        let missing = missing_aspects(text.as_str(), topics, &key_terms);

        let (remote_suggestions, rating) = match &remote {
            RemoteOutcome::Enriched(value) => (
                string_list(value, "improvement_suggestions", 2),
                value.get("overall_relevance").and_then(Value::as_str).map(str::to_string),
            ),
            RemoteOutcome::Unavailable(reason) => {
                debug!("relevance: local analysis only ({})", reason);
                (Vec::new(), None)
            }
        };

        let coverage_values: Vec<f64> = coverage.iter().map(|(_, c)| *c).collect();
        let score = ScoreCalculator::relevance(&coverage_values, drift.len(), key_terms.len(), rating.as_deref());

        let mut local_suggestions = heuristic_suggestions(&coverage, &missing, drift.len());
        if local_suggestions.is_empty() && remote_suggestions.is_empty() {
            local_suggestions.push(if coverage_values.iter().all(|&c| c > HIGH_COVERAGE) {
                "Good topic coverage! Consider adding more depth or examples".to_string()
            } else {
                "Ensure all sections clearly relate to the main topic".to_string()
            });
        }
        let suggestions = SuggestionRanker::new(ctx.settings.suggestion_cap).rank(remote_suggestions, local_suggestions);

        let local_findings: Vec<Finding> = drift
            .iter()
            .map(|d| {
                Finding::local(
                    FindingKind::Drift,
                    Severity::Medium,
                    text.paragraphs()[d.paragraph_index].span,
                    DRIFT_MESSAGE,
                )
                .with_confidence(0.7)
            })
            .collect();
        // The remote relevance reply carries no located findings
        let findings = merge(
            &local_findings,
            &RemoteFindings::unavailable("relevance has no remote findings"),
            ctx.settings.overlap_tolerance,
        );

        let mut detail = BTreeMap::new();
        detail.insert(
            "topic_coverage".to_string(),
            json!(coverage
                .into_iter()
                .map(|(topic, c)| (topic, round2(c)))
                .collect::<BTreeMap<_, _>>()),
        );
        detail.insert(
            "key_terms_found".to_string(),
            json!(key_terms.iter().take(REPORTED_KEY_TERMS).collect::<Vec<_>>()),
        );
        detail.insert("missing_aspects".to_string(), json!(missing));
        detail.insert("topic_drift".to_string(), json!(drift));
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

/// Paragraphs checked for drift: none unless the text has at least two,
/// and only those long enough to judge
fn drift_candidates(text: &PreparedText) -> Vec<(usize, &Segment)> {
    if text.paragraphs().len() < 2 {
        return Vec::new();
    }
    text.paragraphs()
        .iter()
        .enumerate()
        .filter(|(_, p)| p.text.chars().count() >= MIN_DRIFT_PARAGRAPH)
        .collect()
}

/// Candidates whose best similarity to any topic is below `threshold`
fn topic_drift(
    candidates: &[(usize, &Segment)],
    paragraph_vectors: &[Vec<f32>],
    topic_vectors: &[Vec<f32>],
    threshold: f64,
) -> Vec<TopicDrift> {
    candidates
        .iter()
        .zip(paragraph_vectors)
        .filter_map(|((index, paragraph), v)| {
            let best = topic_vectors
                .iter()
                .map(|t| cosine_similarity(v, t))
                .fold(0.0f64, f64::max);
            (best < threshold).then(|| TopicDrift {
                paragraph_index: *index,
                relevance_score: best,
                preview: preview(&paragraph.text, 100),
                suggestion: DRIFT_MESSAGE.to_string(),
            })
        })
        .collect()
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 2 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Stop-word filtered key terms, most frequent first.
///
/// Short texts yield their ten most common words. Longer ones rank unigrams
/// and adjacent-token bigrams together, ties broken alphabetically.
pub fn extract_key_terms(text: &PreparedText) -> Vec<String> {
    let tokens = tokens(text.as_str());

    if tokens.len() < SHORT_TEXT_TOKENS {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for token in &tokens {
            match counts.iter_mut().find(|(t, _)| t == token) {
                Some((_, n)) => *n += 1,
                None => counts.push((token.clone(), 1)),
            }
        }
        // Stable: ties keep first-seen order
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        return counts.into_iter().take(SHORT_TEXT_TERMS).map(|(t, _)| t).collect();
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in &tokens {
        *counts.entry(token.clone()).or_insert(0) += 1;
    }
    for pair in tokens.windows(2) {
        *counts.entry(format!("{} {}", pair[0], pair[1])).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(MAX_KEY_TERMS).map(|(t, _)| t).collect()
}

/// "{aspect} related to {topic}" for each expected aspect the text never mentions
pub fn missing_aspects(text: &str, topics: &[String], key_terms: &[String]) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut missing = Vec::new();
    for topic in topics {
        let topic_lower = topic.to_lowercase();
        for (category, aspects) in ASPECTS {
            if !topic_lower.contains(category) {
                continue;
            }
            for aspect in aspects.iter() {
                if !lowered.contains(aspect) && !key_terms.iter().any(|t| t == aspect) {
                    missing.push(format!("{} related to {}", aspect, topic));
                }
            }
        }
    }
    missing.truncate(MAX_MISSING_ASPECTS);
    missing
}

fn heuristic_suggestions(coverage: &[(String, f64)], missing: &[String], drift_count: usize) -> Vec<String> {
    let mut suggestions = Vec::new();
    let low: Vec<&str> = coverage
        .iter()
        .filter(|(_, c)| *c < LOW_COVERAGE)
        .map(|(t, _)| t.as_str())
        .take(3)
        .collect();
    if !low.is_empty() {
        suggestions.push(format!("Expand coverage of: {}", low.join(", ")));
    }
    if !missing.is_empty() {
        let first: Vec<&str> = missing.iter().take(3).map(String::as_str).collect();
        suggestions.push(format!("Consider addressing: {}", first.join(", ")));
    }
    if drift_count > 2 {
        suggestions.push("Several sections drift from the main topic. Consider refocusing or removing them".to_string());
    }
    suggestions
}
