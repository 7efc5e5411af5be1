//! Quill: Text Quality Scorer
//!
//! This library scores a submitted text along three independent facets
//! (grammar, coherence and topic relevance), reconciles findings coming from
//! a fast local pass and an optional remote enrichment pass, caches the
//! composite result and produces ranked feedback.

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod embedding;
pub mod history;
pub mod pool;
pub mod remote;
pub mod reporter;
pub mod suggestions;
pub mod text;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub use analyzer::{AnalysisEngine, AnalyzeError, AnalyzeRequest, ValidationError};

/// Kind of issue or observation a facet reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingKind {
    Spelling,
    Grammar,
    Punctuation,
    Style,
    Clarity,
    WeakLink,
    Drift,
}

impl FindingKind {
    /// Parse the loose labels remote analyzers return ("grammar", "weak link", ...)
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "spelling" | "typo" => Some(FindingKind::Spelling),
            "grammar" => Some(FindingKind::Grammar),
            "punctuation" => Some(FindingKind::Punctuation),
            "style" => Some(FindingKind::Style),
            "clarity" => Some(FindingKind::Clarity),
            "weak-link" => Some(FindingKind::WeakLink),
            "drift" => Some(FindingKind::Drift),
            _ => None,
        }
    }

    pub fn all() -> [FindingKind; 7] {
        [
            FindingKind::Spelling,
            FindingKind::Grammar,
            FindingKind::Punctuation,
            FindingKind::Style,
            FindingKind::Clarity,
            FindingKind::WeakLink,
            FindingKind::Drift,
        ]
    }
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FindingKind::Spelling => write!(f, "spelling"),
            FindingKind::Grammar => write!(f, "grammar"),
            FindingKind::Punctuation => write!(f, "punctuation"),
            FindingKind::Style => write!(f, "style"),
            FindingKind::Clarity => write!(f, "clarity"),
            FindingKind::WeakLink => write!(f, "weak-link"),
            FindingKind::Drift => write!(f, "drift"),
        }
    }
}

/// Severity levels for findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Penalty weight used by the grammar score
    pub fn weight(self) -> f64 {
        match self {
            Severity::Low => 0.5,
            Severity::Medium => 1.0,
            Severity::High => 2.0,
            Severity::Critical => 3.0,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Which pass produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Local,
    Remote,
}

/// Character range `[start, end]` in the preprocessed text. Always `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when both endpoints are within `tolerance` characters of `other`'s.
    /// A distance of exactly `tolerance` still counts as near.
    pub fn near(&self, other: &Span, tolerance: usize) -> bool {
        self.start.abs_diff(other.start) <= tolerance && self.end.abs_diff(other.end) <= tolerance
    }

    /// Clamp both endpoints to `limit` (the text length in characters)
    pub fn clamp_to(self, limit: usize) -> Self {
        Self::new(self.start.min(limit), self.end.min(limit))
    }
}

/// A located issue or observation produced by one of a facet's passes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub severity: Severity,
    pub span: Span,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub source: Source,
}

impl Finding {
    /// A finding from the local pass with the default local confidence (0.8)
    pub fn local(kind: FindingKind, severity: Severity, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            span,
            message: message.into(),
            suggestion: None,
            explanation: None,
            confidence: 0.8,
            source: Source::Local,
        }
    }

    /// A finding from the remote pass with the default remote confidence (0.9)
    pub fn remote(kind: FindingKind, severity: Severity, span: Span, message: impl Into<String>) -> Self {
        Self {
            confidence: 0.9,
            source: Source::Remote,
            ..Self::local(kind, severity, span, message)
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

/// One of the three scoring dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacetKind {
    Grammar,
    Coherence,
    Relevance,
}

impl FacetKind {
    /// Facets in aggregation order
    pub const ALL: [FacetKind; 3] = [FacetKind::Grammar, FacetKind::Coherence, FacetKind::Relevance];

    pub fn as_str(self) -> &'static str {
        match self {
            FacetKind::Grammar => "grammar",
            FacetKind::Coherence => "coherence",
            FacetKind::Relevance => "relevance",
        }
    }

    /// Display label ("Grammar", ...)
    pub fn label(self) -> &'static str {
        match self {
            FacetKind::Grammar => "Grammar",
            FacetKind::Coherence => "Coherence",
            FacetKind::Relevance => "Relevance",
        }
    }
}

impl std::fmt::Display for FacetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown facet '{0}'")]
pub struct UnknownFacet(pub String);

impl std::str::FromStr for FacetKind {
    type Err = UnknownFacet;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "grammar" => Ok(FacetKind::Grammar),
            "coherence" => Ok(FacetKind::Coherence),
            "relevance" => Ok(FacetKind::Relevance),
            other => Err(UnknownFacet(other.to_string())),
        }
    }
}

/// Result of a single facet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetScore {
    /// Score in [0, 100]
    pub score: f64,
    /// Merged findings ordered by span start
    pub findings: Vec<Finding>,
    /// Ranked suggestions (at most the configured facet cap)
    pub suggestions: Vec<String>,
    /// Named auxiliary metrics
    #[serde(default)]
    pub detail: BTreeMap<String, serde_json::Value>,
}

/// Score a facet reports when it has nothing to measure or could not run
pub const NEUTRAL_SCORE: f64 = 50.0;

impl FacetScore {
    /// Neutral score carrying a single suggestion and no findings
    pub fn neutral(suggestion: impl Into<String>) -> Self {
        Self {
            score: NEUTRAL_SCORE,
            findings: Vec::new(),
            suggestions: vec![suggestion.into()],
            detail: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, name: &str, value: serde_json::Value) -> Self {
        self.detail.insert(name.to_string(), value);
        self
    }
}

/// Statistics about the analyzed document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStats {
    pub word_count: usize,
    pub sentence_count: usize,
    pub paragraph_count: usize,
    pub avg_sentence_length: f64,
    pub avg_paragraph_length: f64,
}

/// Relative facet weights. Normalized vectors sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeightVector {
    pub grammar: f64,
    pub coherence: f64,
    pub relevance: f64,
}

impl WeightVector {
    pub fn new(grammar: f64, coherence: f64, relevance: f64) -> Self {
        Self {
            grammar,
            coherence,
            relevance,
        }
    }

    pub fn get(&self, facet: FacetKind) -> f64 {
        match facet {
            FacetKind::Grammar => self.grammar,
            FacetKind::Coherence => self.coherence,
            FacetKind::Relevance => self.relevance,
        }
    }

    pub fn set(&mut self, facet: FacetKind, value: f64) {
        match facet {
            FacetKind::Grammar => self.grammar = value,
            FacetKind::Coherence => self.coherence = value,
            FacetKind::Relevance => self.relevance = value,
        }
    }

    pub fn total(&self) -> f64 {
        self.grammar + self.coherence + self.relevance
    }
}

impl Default for WeightVector {
    fn default() -> Self {
        Self::new(0.4, 0.3, 0.3)
    }
}

/// Qualitative band of an overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Band {
    Excellent,
    VeryGood,
    Good,
    Fair,
    NeedsImprovement,
}

impl Band {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Band::Excellent
        } else if score >= 80.0 {
            Band::VeryGood
        } else if score >= 70.0 {
            Band::Good
        } else if score >= 60.0 {
            Band::Fair
        } else {
            Band::NeedsImprovement
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Band::Excellent => write!(f, "excellent"),
            Band::VeryGood => write!(f, "very good"),
            Band::Good => write!(f, "good"),
            Band::Fair => write!(f, "fair"),
            Band::NeedsImprovement => write!(f, "needs improvement"),
        }
    }
}

/// The composite result of analyzing one text. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResult {
    /// Weighted overall score (0-100)
    pub overall_score: f64,
    pub grammar: FacetScore,
    pub coherence: FacetScore,
    pub relevance: FacetScore,
    /// Normalized weights the overall score was computed with
    pub weights: WeightVector,
    #[serde(flatten)]
    pub stats: DocumentStats,
    /// Wall-clock seconds spent producing the result
    pub processing_time: f64,
    pub timestamp: DateTime<Utc>,
    pub feedback_summary: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
}

impl CompositeResult {
    pub fn facet(&self, kind: FacetKind) -> &FacetScore {
        match kind {
            FacetKind::Grammar => &self.grammar,
            FacetKind::Coherence => &self.coherence,
            FacetKind::Relevance => &self.relevance,
        }
    }

    pub fn band(&self) -> Band {
        Band::from_score(self.overall_score)
    }
}

/// Round to two decimals, the precision every reported score uses
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Serialize a raw measurement at reporting precision. The struct keeps the
/// raw value for threshold comparisons.
pub(crate) fn serialize_round2<S: serde::Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round2(*value))
}

/// Public API: analyze a single text with the default configuration.
///
/// * `text` - raw text (already extracted from its file format)
/// * `topic` - optional topic for relevance scoring
pub fn analyze_text(text: &str, topic: Option<&str>) -> anyhow::Result<CompositeResult> {
    let engine = AnalysisEngine::new(config::Config::default())?;
    let mut request = AnalyzeRequest::new(text);
    if let Some(topic) = topic {
        request = request.topic(topic);
    }
    Ok(engine.analyze(&request)?)
}
