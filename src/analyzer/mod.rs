//! Analyzer module - facet analysis and orchestration

pub mod batch;
pub mod coherence;
pub mod engine;
pub mod grammar;
pub mod merge;
pub mod relevance;
pub mod rules;
pub mod scoring;

pub use batch::{BatchResult, ComparativeAnalysis, SummaryStatistics};
pub use coherence::CoherenceFacet;
pub use engine::{AnalysisEngine, AnalyzeRequest};
pub use grammar::GrammarFacet;
pub use merge::{merge, RemoteFindings};
pub use relevance::RelevanceFacet;
pub use scoring::ScoreCalculator;

use crate::config::AnalysisConfig;
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::pool::{CancellationToken, Cancelled, WorkerPool};
use crate::remote::{RemoteOutcome, RemotePass};
use crate::text::PreparedText;
use crate::{FacetKind, FacetScore};
use std::sync::Arc;
use thiserror::Error;

/// Input rejected before any facet runs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Text is empty")]
    Empty,
    #[error("Text is too short: {length} characters (minimum {min})")]
    TooShort { length: usize, min: usize },
    #[error("Text is too long: {length} characters (maximum {max})")]
    TooLong { length: usize, max: usize },
    #[error("Unknown facet in weights: '{0}'")]
    UnknownFacet(String),
    #[error("Invalid weight for {facet}: {value}")]
    InvalidWeight { facet: String, value: f64 },
    #[error("At least one facet weight must be positive")]
    ZeroWeights,
    #[error("Batch must contain between 1 and {max} texts, got {got}")]
    BatchSize { got: usize, max: usize },
}

/// The only failures `analyze` reports to its caller
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Analysis was cancelled")]
    Cancelled,
}

impl From<Cancelled> for AnalyzeError {
    fn from(_: Cancelled) -> Self {
        AnalyzeError::Cancelled
    }
}

/// A facet could not produce a score. The engine substitutes a neutral one.
#[derive(Debug, Error)]
pub enum FacetError {
    #[error("{facet} analysis failed: {message}")]
    Failed { facet: FacetKind, message: String },
    #[error("{0} analysis panicked: {1}")]
    Panicked(FacetKind, String),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error("cancelled")]
    Cancelled,
}

impl From<Cancelled> for FacetError {
    fn from(_: Cancelled) -> Self {
        FacetError::Cancelled
    }
}

/// What every facet of one request sees. Cloning shares the same text.
#[derive(Debug, Clone)]
pub struct FacetInput {
    pub text: Arc<PreparedText>,
    /// Declared topics, deduplicated, in request order
    pub topics: Arc<Vec<String>>,
}

/// Shared services a facet runs against
#[derive(Clone, Copy)]
pub struct FacetContext<'a> {
    pub pool: &'a WorkerPool,
    pub embedder: &'a dyn EmbeddingProvider,
    /// None when the remote pass is disabled or unconfigured
    pub remote: Option<&'a RemotePass>,
    pub cancel: &'a CancellationToken,
    pub settings: &'a AnalysisConfig,
}

impl FacetContext<'_> {
    /// Encode `texts` in a single batched call on the worker pool
    pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, FacetError> {
        let embedder = self.embedder;
        let vectors = self
            .pool
            .submit(self.cancel, || crate::embedding::encode_batch(embedder, texts))??;
        Ok(vectors)
    }

    /// Run the remote pass for `prompt`, or explain why it was skipped
    pub fn enrich(&self, prompt: impl FnOnce() -> String, char_len: usize) -> RemoteOutcome {
        match self.remote {
            None => RemoteOutcome::Unavailable("remote pass disabled".to_string()),
            Some(remote) if !remote.accepts(char_len) => {
                RemoteOutcome::Unavailable("text too long for remote pass".to_string())
            }
            Some(remote) => remote.run(&prompt(), self.cancel),
        }
    }
}

/// The capability every facet implements
pub trait Facet: Send + Sync {
    fn kind(&self) -> FacetKind;

    /// Score the text. Must not touch state shared with the other facets.
    fn analyze(&self, input: &FacetInput, ctx: &FacetContext<'_>) -> Result<FacetScore, FacetError>;
}

/// The registered facets, one slot per kind
pub struct FacetSet {
    grammar: Box<dyn Facet>,
    coherence: Box<dyn Facet>,
    relevance: Box<dyn Facet>,
}

impl FacetSet {
    pub fn new(grammar: GrammarFacet, coherence: CoherenceFacet, relevance: RelevanceFacet) -> Self {
        Self {
            grammar: Box::new(grammar),
            coherence: Box::new(coherence),
            relevance: Box::new(relevance),
        }
    }

    /// Replace the facet registered for `facet.kind()`
    pub fn register(&mut self, facet: Box<dyn Facet>) {
        match facet.kind() {
            FacetKind::Grammar => self.grammar = facet,
            FacetKind::Coherence => self.coherence = facet,
            FacetKind::Relevance => self.relevance = facet,
        }
    }

    pub fn get(&self, kind: FacetKind) -> &dyn Facet {
        match kind {
            FacetKind::Grammar => self.grammar.as_ref(),
            FacetKind::Coherence => self.coherence.as_ref(),
            FacetKind::Relevance => self.relevance.as_ref(),
        }
    }
}

/// Shorten `text` to `max` chars, appending "..." when cut
pub(crate) fn preview(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

/// Fixed embeddings and a local-only context for facet tests
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub const DIMENSIONS: usize = 16;

    /// Unit vector along `axis`
    pub fn axis(axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; DIMENSIONS];
        v[axis] = 1.0;
        v
    }

    /// The first `n` components set to 1. Its cosine with `axis(0)` is
    /// exactly 1/sqrt(n) when n is a perfect square.
    pub fn spread(n: usize) -> Vec<f32> {
        (0..DIMENSIONS).map(|i| if i < n { 1.0 } else { 0.0 }).collect()
    }

    /// Embeds each text as the vector of the first entry it starts with
    pub struct PrefixEmbedder(pub Vec<(&'static str, Vec<f32>)>);

    impl EmbeddingProvider for PrefixEmbedder {
        fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            texts
                .iter()
                .map(|text| {
                    self.0
                        .iter()
                        .find(|(prefix, _)| text.starts_with(prefix))
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| EmbeddingError::Provider(format!("no vector for '{}'", text)))
                })
                .collect()
        }

        fn dimensions(&self) -> usize {
            DIMENSIONS
        }
    }

    pub fn input(text: &str, topics: &[&str]) -> FacetInput {
        FacetInput {
            text: Arc::new(PreparedText::new(text)),
            topics: Arc::new(topics.iter().map(|t| t.to_string()).collect()),
        }
    }

    /// Run `facet` with `embedder`, no remote pass and the given settings
    pub fn run(facet: &dyn Facet, input: &FacetInput, embedder: &dyn EmbeddingProvider, settings: &AnalysisConfig) -> FacetScore {
        let pool = WorkerPool::new(2).unwrap();
        let cancel = CancellationToken::new();
        let ctx = FacetContext {
            pool: &pool,
            embedder,
            remote: None,
            cancel: &cancel,
            settings,
        };
        facet.analyze(input, &ctx).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(FacetKind);

    impl Facet for Fixed {
        fn kind(&self) -> FacetKind {
            self.0
        }

        fn analyze(&self, _: &FacetInput, _: &FacetContext<'_>) -> Result<FacetScore, FacetError> {
            Ok(FacetScore::neutral("fixed"))
        }
    }

    #[test]
    fn test_register_replaces_slot_by_kind() {
        let mut set = FacetSet::new(GrammarFacet::default(), CoherenceFacet, RelevanceFacet);
        set.register(Box::new(Fixed(FacetKind::Coherence)));
        assert_eq!(set.get(FacetKind::Coherence).kind(), FacetKind::Coherence);
        assert_eq!(set.get(FacetKind::Grammar).kind(), FacetKind::Grammar);
    }

    #[test]
    fn test_preview_truncates_on_chars() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("\u{e9}\u{e9}\u{e9}\u{e9}", 2), "\u{e9}\u{e9}...");
    }

    #[test]
    fn test_validation_messages() {
        let err = ValidationError::TooShort { length: 3, min: 50 };
        assert_eq!(err.to_string(), "Text is too short: 3 characters (minimum 50)");
        let err: AnalyzeError = Cancelled.into();
        assert_eq!(err, AnalyzeError::Cancelled);
    }
}
