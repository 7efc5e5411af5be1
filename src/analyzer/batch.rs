//! Batch results: per-text results plus comparison and summary

use crate::{round2, CompositeResult, FacetKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Largest number of texts one batch may hold
pub const MAX_BATCH_SIZE: usize = 100;

/// Spread under which a dimension counts as consistent across texts
const CONSISTENCY_SPREAD: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparativeAnalysis {
    /// Mean score per dimension ("overall", "grammar", ...)
    pub average_scores: BTreeMap<String, f64>,
    /// Index of the first text with the highest overall score
    pub best_text_index: usize,
    /// Whether max - min stays under 20 for each dimension
    pub consistency: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStatistics {
    pub total_texts: usize,
    pub average_score: f64,
    pub total_words: usize,
    pub average_words: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub results: Vec<CompositeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparative_analysis: Option<ComparativeAnalysis>,
    pub summary_statistics: SummaryStatistics,
}

impl BatchResult {
    /// Summarize `results`. The comparison is only built when asked for and
    /// there is more than one result to compare.
    pub fn from_results(results: Vec<CompositeResult>, compare: bool) -> Self {
        let comparative_analysis = if compare && results.len() > 1 {
            Some(compare_results(&results))
        } else {
            None
        };
        let summary_statistics = summarize(&results);
        Self {
            results,
            comparative_analysis,
            summary_statistics,
        }
    }
}

fn dimensions(results: &[CompositeResult]) -> Vec<(&'static str, Vec<f64>)> {
    let mut dims = vec![("overall", results.iter().map(|r| r.overall_score).collect())];
    for facet in FacetKind::ALL {
        dims.push((facet.as_str(), results.iter().map(|r| r.facet(facet).score).collect()));
    }
    dims
}

fn compare_results(results: &[CompositeResult]) -> ComparativeAnalysis {
    let mut average_scores = BTreeMap::new();
    let mut consistency = BTreeMap::new();
    for (name, scores) in dimensions(results) {
        let max = scores.iter().copied().fold(f64::MIN, f64::max);
        let min = scores.iter().copied().fold(f64::MAX, f64::min);
        average_scores.insert(name.to_string(), round2(mean(&scores)));
        consistency.insert(name.to_string(), max - min < CONSISTENCY_SPREAD);
    }

    let mut best_text_index = 0;
    for (i, result) in results.iter().enumerate() {
        if result.overall_score > results[best_text_index].overall_score {
            best_text_index = i;
        }
    }

    ComparativeAnalysis {
        average_scores,
        best_text_index,
        consistency,
    }
}

fn summarize(results: &[CompositeResult]) -> SummaryStatistics {
    let scores: Vec<f64> = results.iter().map(|r| r.overall_score).collect();
    let total_words: usize = results.iter().map(|r| r.stats.word_count).sum();
    SummaryStatistics {
        total_texts: results.len(),
        average_score: round2(mean(&scores)),
        total_words,
        average_words: if results.is_empty() {
            0.0
        } else {
            round2(total_words as f64 / results.len() as f64)
        },
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DocumentStats, FacetScore, WeightVector};
    use chrono::Utc;

    fn result(overall: f64, grammar: f64, words: usize) -> CompositeResult {
        let facet = |score| FacetScore {
            score,
            ..FacetScore::neutral("x")
        };
        CompositeResult {
            overall_score: overall,
            grammar: facet(grammar),
            coherence: facet(50.0),
            relevance: facet(50.0),
            weights: WeightVector::default(),
            stats: DocumentStats {
                word_count: words,
                ..DocumentStats::default()
            },
            processing_time: 0.0,
            timestamp: Utc::now(),
            feedback_summary: String::new(),
            strengths: Vec::new(),
            improvements: Vec::new(),
        }
    }

    #[test]
    fn test_comparison_only_when_requested_and_plural() {
        assert!(BatchResult::from_results(vec![result(70.0, 80.0, 10)], true).comparative_analysis.is_none());
        assert!(BatchResult::from_results(vec![result(70.0, 80.0, 10), result(60.0, 80.0, 10)], false)
            .comparative_analysis
            .is_none());
    }

    #[test]
    fn test_comparative_analysis() {
        let batch = BatchResult::from_results(
            vec![result(70.0, 100.0, 100), result(85.0, 70.0, 50), result(85.0, 90.0, 30)],
            true,
        );
        let comparison = batch.comparative_analysis.unwrap();
        assert_eq!(comparison.best_text_index, 1);
        assert_eq!(comparison.average_scores["overall"], 80.0);
        assert_eq!(comparison.average_scores["grammar"], 86.67);
        assert!(comparison.consistency["overall"]);
        assert!(!comparison.consistency["grammar"]);
        assert!(comparison.consistency["relevance"]);
    }

    #[test]
    fn test_summary_statistics() {
        let batch = BatchResult::from_results(vec![result(70.0, 0.0, 100), result(81.0, 0.0, 51)], false);
        let stats = batch.summary_statistics;
        assert_eq!(stats.total_texts, 2);
        assert_eq!(stats.average_score, 75.5);
        assert_eq!(stats.total_words, 151);
        assert_eq!(stats.average_words, 75.5);
    }
}
