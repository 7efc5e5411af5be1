//! Score calculation for facets and the composite result

use super::ValidationError;
use crate::config::CustomWeightPolicy;
use crate::suggestions::SuggestionRanker;
use crate::{round2, Band, FacetKind, FacetScore, Finding, WeightVector};
use std::collections::BTreeMap;

/// Penalty points one unit of error ratio costs
const PENALTY_PER_ERROR_RATIO: f64 = 20.0;
/// Words of text per tolerable severity-weighted error
const WORDS_PER_TOLERABLE_ERROR: f64 = 50.0;
const WEAK_LINK_PENALTY: f64 = 5.0;
const TRANSITION_BONUS: f64 = 10.0;
const DRIFT_PENALTY: f64 = 5.0;
const MAX_KEY_TERM_BONUS: f64 = 10.0;

/// Calculator for facet and composite scores
pub struct ScoreCalculator;

impl ScoreCalculator {
    /// 100 minus a penalty that scales with severity-weighted findings per
    /// fifty words. A text with no findings scores 100.
    pub fn grammar(findings: &[Finding], word_count: usize) -> f64 {
        let penalty: f64 = findings.iter().map(|f| f.severity.weight()).sum();
        if penalty == 0.0 {
            return 100.0;
        }
        let expected = (word_count as f64 / WORDS_PER_TOLERABLE_ERROR).max(1.0);
        let ratio = penalty / expected;
        round2((100.0 - ratio * PENALTY_PER_ERROR_RATIO).clamp(0.0, 100.0))
    }

    /// Sentence flow adjusted for weak links and paragraph transitions, then
    /// scaled by reading ease.
    ///
    /// * `flow` - similarity of each adjacent sentence pair
    /// * `transitions` - paragraph boundaries with an explicit marker and a strong link
    pub fn coherence(flow: &[f64], weak_links: usize, transitions: usize, reading_ease: f64) -> f64 {
        let flow_score = if flow.is_empty() {
            100.0
        } else {
            flow.iter().sum::<f64>() / flow.len() as f64 * 100.0
        };
        let readability_factor = reading_ease.clamp(0.0, 100.0) / 100.0;
        let raw = flow_score - WEAK_LINK_PENALTY * weak_links as f64 + TRANSITION_BONUS * transitions as f64;
        round2((raw * readability_factor).clamp(0.0, 100.0))
    }

    /// Average topic coverage with drift penalty, key-term bonus and the
    /// remote rating's adjustment.
    ///
    /// * `coverage` - similarity x 100 of the whole text to each topic
    pub fn relevance(coverage: &[f64], drifting: usize, key_terms: usize, rating: Option<&str>) -> f64 {
        let avg_coverage = if coverage.is_empty() {
            0.0
        } else {
            coverage.iter().sum::<f64>() / coverage.len() as f64
        };
        let key_term_bonus = (key_terms as f64 / 2.0).min(MAX_KEY_TERM_BONUS);
        let raw = avg_coverage - DRIFT_PENALTY * drifting as f64
            + key_term_bonus
            + rating.map(Self::rating_adjustment).unwrap_or(0.0);
        round2(raw.clamp(0.0, 100.0))
    }

    /// Points added for a remote "excellent|good|fair|poor" rating
    pub fn rating_adjustment(rating: &str) -> f64 {
        match rating.trim().to_lowercase().as_str() {
            "excellent" => 10.0,
            "good" => 5.0,
            "poor" => -10.0,
            _ => 0.0,
        }
    }

    /// Combine configured defaults with per-request weights and normalize so
    /// the vector sums to 1.
    pub fn normalize_weights(
        defaults: &WeightVector,
        custom: Option<&BTreeMap<String, f64>>,
        policy: CustomWeightPolicy,
    ) -> Result<WeightVector, ValidationError> {
        let mut weights = match (custom, policy) {
            (Some(_), CustomWeightPolicy::Replace) => WeightVector::new(0.0, 0.0, 0.0),
            _ => *defaults,
        };

        if let Some(custom) = custom {
            for (name, &value) in custom {
                let facet: FacetKind = name
                    .parse()
                    .map_err(|_| ValidationError::UnknownFacet(name.clone()))?;
                if !value.is_finite() || value < 0.0 {
                    return Err(ValidationError::InvalidWeight {
                        facet: name.clone(),
                        value,
                    });
                }
                weights.set(facet, value);
            }
        }

        let total = weights.total();
        if !total.is_finite() || total <= 0.0 {
            return Err(ValidationError::ZeroWeights);
        }
        Ok(WeightVector::new(
            weights.grammar / total,
            weights.coherence / total,
            weights.relevance / total,
        ))
    }

    /// Weighted sum of facet scores, in [0, 100]
    pub fn composite(scores: [f64; 3], weights: &WeightVector) -> f64 {
        let total: f64 = FacetKind::ALL
            .iter()
            .zip(scores)
            .map(|(&facet, score)| score * weights.get(facet))
            .sum();
        round2(total.clamp(0.0, 100.0))
    }

    /// One-paragraph verdict: the band, then either the strongest and weakest
    /// facet or a note that the text is balanced.
    pub fn feedback_summary(overall: f64, scores: [f64; 3], imbalance_threshold: f64) -> String {
        let mut summary = format!("Your text scores {:.1}/100, which is {}. ", overall, Band::from_score(overall));

        let (strongest, max) = extreme(scores, |a, b| a > b);
        let (weakest, min) = extreme(scores, |a, b| a < b);
        if max - min > imbalance_threshold {
            summary.push_str(&format!(
                "Your {} is particularly strong, but focus on improving {}.",
                strongest, weakest
            ));
        } else {
            summary.push_str("The text is well-balanced across all criteria.");
        }
        summary
    }

    /// Named strength tags for high-scoring facets
    pub fn strengths(scores: [f64; 3], lexical_diversity: Option<f64>, threshold: f64, cap: usize) -> Vec<String> {
        let mut strengths = Vec::new();
        for (facet, score) in FacetKind::ALL.into_iter().zip(scores) {
            if score >= threshold {
                strengths.push(
                    match facet {
                        FacetKind::Grammar => "Strong grammar and spelling",
                        FacetKind::Coherence => "Excellent flow and organization",
                        FacetKind::Relevance => "Highly relevant to the topic",
                    }
                    .to_string(),
                );
            }
        }
        if lexical_diversity.is_some_and(|d| d > 0.7) {
            strengths.push("Rich vocabulary".to_string());
        }
        strengths.truncate(cap);
        strengths
    }

    /// Facet suggestions pooled in facet order, deduplicated and capped
    pub fn improvements(facets: [&FacetScore; 3], cap: usize) -> Vec<String> {
        SuggestionRanker::pool(facets.iter().map(|f| f.suggestions.as_slice()), cap)
    }
}

/// First facet whose score beats every other under `better`
fn extreme(scores: [f64; 3], better: impl Fn(f64, f64) -> bool) -> (FacetKind, f64) {
    let mut best = (FacetKind::Grammar, scores[0]);
    for (facet, score) in FacetKind::ALL.into_iter().zip(scores).skip(1) {
        if better(score, best.1) {
            best = (facet, score);
        }
    }
    best
}
