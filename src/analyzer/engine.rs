//! Analysis engine - orchestrates the facets, cache and history

use super::batch::{BatchResult, MAX_BATCH_SIZE};
use super::grammar::lexical_diversity;
use super::rules::RuleChecker;
use super::{
    AnalyzeError, CoherenceFacet, Facet, FacetContext, FacetError, FacetInput, FacetSet, GrammarFacet,
    RelevanceFacet, ScoreCalculator, ValidationError,
};
use crate::cache::ResultCache;
use crate::config::Config;
use crate::embedding::{EmbeddingProvider, HashingEmbedder};
use crate::history::{history_id, HistoryStore};
use crate::pool::{CancellationToken, WorkerPool};
use crate::remote::{is_ai_available, ClaudeClient, EnrichmentClient, RemotePass};
use crate::text::{preprocess, PreparedText};
use crate::{CompositeResult, FacetKind, FacetScore, WeightVector, NEUTRAL_SCORE};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One text to analyze, with its optional topics and weights
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    /// Facet name to relative weight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<BTreeMap<String, f64>>,
}

impl AnalyzeRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics.extend(topics.into_iter().map(Into::into));
        self
    }

    pub fn weights(mut self, weights: BTreeMap<String, f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn weight(mut self, facet: &str, value: f64) -> Self {
        self.weights
            .get_or_insert_with(BTreeMap::new)
            .insert(facet.to_string(), value);
        self
    }

    /// `topic` followed by `topics`, blanks and duplicates removed
    pub fn all_topics(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for topic in self.topic.iter().chain(self.topics.iter()) {
            let topic = topic.trim();
            if !topic.is_empty() && !out.iter().any(|t| t == topic) {
                out.push(topic.to_string());
            }
        }
        out
    }

    /// The part of the cache key besides the text: the topic list as a JSON
    /// array, with the normalized weights appended only when custom weights
    /// were given. JSON string escaping keeps topics containing separators
    /// apart from split topic lists.
    fn descriptor(&self, topics: &[String], weights: &WeightVector) -> String {
        let topics = serde_json::Value::from(topics.to_vec());
        match self.weights {
            Some(_) => serde_json::json!([
                topics,
                [
                    format!("{:.6}", weights.grammar),
                    format!("{:.6}", weights.coherence),
                    format!("{:.6}", weights.relevance)
                ]
            ])
            .to_string(),
            None => topics.to_string(),
        }
    }
}

/// Main analysis engine: runs the three facets concurrently and aggregates
/// their scores into a composite result
pub struct AnalysisEngine {
    config: Config,
    pool: WorkerPool,
    embedder: Arc<dyn EmbeddingProvider>,
    remote: Option<RemotePass>,
    facets: FacetSet,
    cache: Option<Arc<ResultCache>>,
    history: Option<Arc<dyn HistoryStore>>,
}

impl AnalysisEngine {
    /// Create an engine from a validated config. The remote pass is enabled
    /// when the `ai` feature is built in and an API key is present.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.analysis.worker_threads).context("Failed to start worker pool")?;

        let remote = if config.remote.enabled && is_ai_available() {
            match ClaudeClient::from_env() {
                Ok(client) => {
                    let client: Arc<dyn EnrichmentClient> = Arc::new(client.model(&config.remote.model));
                    Some(RemotePass::new(client, &config.remote))
                }
                Err(e) => {
                    debug!("Remote pass disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let facets = FacetSet::new(
            GrammarFacet::new(RuleChecker::new().with_overrides(&config.rules)),
            CoherenceFacet,
            RelevanceFacet,
        );
        let cache = config
            .cache
            .enabled
            .then(|| Arc::new(ResultCache::from_config(&config.cache)));

        Ok(Self {
            config,
            pool,
            embedder: Arc::new(HashingEmbedder::new()),
            remote,
            facets,
            cache,
            history: None,
        })
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = embedder;
        self
    }

    /// Use `client` for the remote pass with the configured limits
    pub fn with_remote_client(self, client: Arc<dyn EnrichmentClient>) -> Self {
        let pass = RemotePass::new(client, &self.config.remote);
        self.with_remote_pass(pass)
    }

    pub fn with_remote_pass(mut self, pass: RemotePass) -> Self {
        self.remote = Some(pass);
        self
    }

    pub fn without_remote(mut self) -> Self {
        self.remote = None;
        self
    }

    /// Share `cache` with other engines (or the CLI that persists it)
    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    /// Register a facet, replacing the built-in one of the same kind
    pub fn with_facet(mut self, facet: Box<dyn Facet>) -> Self {
        self.facets.register(facet);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    pub fn history(&self) -> Option<&Arc<dyn HistoryStore>> {
        self.history.as_ref()
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    /// Analyze one text
    pub fn analyze(&self, request: &AnalyzeRequest) -> Result<CompositeResult, AnalyzeError> {
        self.analyze_with_cancel(request, &CancellationToken::new())
    }

    /// Analyze one text, abandoning the work once `cancel` is set. A
    /// cancelled request writes nothing to the cache or history.
    pub fn analyze_with_cancel(
        &self,
        request: &AnalyzeRequest,
        cancel: &CancellationToken,
    ) -> Result<CompositeResult, AnalyzeError> {
        let started = Instant::now();
        cancel.check()?;

        let normalized = preprocess(&request.text);
        self.validate_length(&normalized)?;
        let weights = ScoreCalculator::normalize_weights(
            &self.config.weights,
            request.weights.as_ref(),
            self.config.custom_weight_policy,
        )?;
        let topics = request.all_topics();

        let key = ResultCache::key(&normalized, &request.descriptor(&topics, &weights));
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key) {
                debug!("Cache hit for {}", key);
                return Ok(hit);
            }
        }

        let input = FacetInput {
            text: Arc::new(PreparedText::from_normalized(normalized)),
            topics: Arc::new(topics),
        };
        let ctx = FacetContext {
            pool: &self.pool,
            embedder: self.embedder.as_ref(),
            remote: self.remote.as_ref(),
            cancel,
            settings: &self.config.analysis,
        };

        let (grammar, coherence, relevance) = self.pool.join3(
            || self.run_facet(FacetKind::Grammar, &input, &ctx),
            || self.run_facet(FacetKind::Coherence, &input, &ctx),
            || self.run_facet(FacetKind::Relevance, &input, &ctx),
        );
        let (grammar, coherence, relevance) = (grammar?, coherence?, relevance?);

        let result = self.aggregate(&input.text, weights, grammar, coherence, relevance, started);
        cancel.check()?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(&key, &result) {
                warn!("Failed to cache result: {}", e);
            }
        }
        if let Some(history) = &self.history {
            let id = history_id(&key, result.timestamp);
            let topic = input.topics.first().map(String::as_str);
            if let Err(e) = history.put(&id, input.text.as_str(), topic, &result) {
                warn!("Failed to record history: {:#}", e);
            }
        }

        info!(
            "Analyzed {} words: overall {:.2} in {:.3}s",
            result.stats.word_count, result.overall_score, result.processing_time
        );
        Ok(result)
    }

    /// Analyze 1..=100 texts in order. The first failing text fails the batch.
    pub fn analyze_batch(&self, requests: &[AnalyzeRequest], compare: bool) -> Result<BatchResult, AnalyzeError> {
        self.analyze_batch_with_cancel(requests, compare, &CancellationToken::new())
    }

    pub fn analyze_batch_with_cancel(
        &self,
        requests: &[AnalyzeRequest],
        compare: bool,
        cancel: &CancellationToken,
    ) -> Result<BatchResult, AnalyzeError> {
        if requests.is_empty() || requests.len() > MAX_BATCH_SIZE {
            return Err(ValidationError::BatchSize {
                got: requests.len(),
                max: MAX_BATCH_SIZE,
            }
            .into());
        }

        let mut results = Vec::with_capacity(requests.len());
        for (i, request) in requests.iter().enumerate() {
            debug!("Batch item {}/{}", i + 1, requests.len());
            results.push(self.analyze_with_cancel(request, cancel)?);
        }
        Ok(BatchResult::from_results(results, compare))
    }

    fn validate_length(&self, text: &str) -> Result<(), ValidationError> {
        if text.is_empty() {
            return Err(ValidationError::Empty);
        }
        let length = text.chars().count();
        if length < self.config.min_text_length {
            return Err(ValidationError::TooShort {
                length,
                min: self.config.min_text_length,
            });
        }
        if length > self.config.max_text_length {
            return Err(ValidationError::TooLong {
                length,
                max: self.config.max_text_length,
            });
        }
        Ok(())
    }

    /// Run one facet. Failures and panics degrade to a neutral score; only
    /// cancellation is reported.
    fn run_facet(
        &self,
        kind: FacetKind,
        input: &FacetInput,
        ctx: &FacetContext<'_>,
    ) -> Result<FacetScore, AnalyzeError> {
        let facet = self.facets.get(kind);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| facet.analyze(input, ctx)))
            .unwrap_or_else(|payload| Err(FacetError::Panicked(kind, panic_message(payload.as_ref()))));

        match outcome {
            Ok(mut score) => {
                score.score = if score.score.is_finite() {
                    score.score.clamp(0.0, 100.0)
                } else {
                    NEUTRAL_SCORE
                };
                Ok(score)
            }
            Err(FacetError::Cancelled) => Err(AnalyzeError::Cancelled),
            Err(_) if ctx.cancel.is_cancelled() => Err(AnalyzeError::Cancelled),
            Err(e) => {
                warn!("{} facet failed, using neutral score: {}", kind, e);
                Ok(FacetScore::neutral(format!("{} analysis unavailable: {}", kind.label(), e)))
            }
        }
    }

    fn aggregate(
        &self,
        text: &PreparedText,
        weights: WeightVector,
        grammar: FacetScore,
        coherence: FacetScore,
        relevance: FacetScore,
        started: Instant,
    ) -> CompositeResult {
        let settings = &self.config.analysis;
        let scores = [grammar.score, coherence.score, relevance.score];
        let overall_score = ScoreCalculator::composite(scores, &weights);

        let feedback_summary = ScoreCalculator::feedback_summary(overall_score, scores, settings.imbalance_threshold);
        let strengths = ScoreCalculator::strengths(
            scores,
            lexical_diversity(&grammar),
            settings.strength_threshold,
            settings.strength_cap,
        );
        let improvements = ScoreCalculator::improvements([&grammar, &coherence, &relevance], settings.improvement_cap);

        CompositeResult {
            overall_score,
            grammar,
            coherence,
            relevance,
            weights,
            stats: text.stats(),
            processing_time: (started.elapsed().as_secs_f64() * 1000.0).round() / 1000.0,
            timestamp: Utc::now(),
            feedback_summary,
            strengths,
            improvements,
        }
    }
}

impl std::fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisEngine")
            .field("pool", &self.pool)
            .field("remote", &self.remote.is_some())
            .field("cache", &self.cache.is_some())
            .field("history", &self.history.is_some())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::relevance::NO_TOPIC_SUGGESTION;
    use crate::history::InMemoryHistory;

    const SAMPLE: &str = "This is a simple test sentence. It has two sentences.";

    fn engine() -> AnalysisEngine {
        AnalysisEngine::new(Config::default()).unwrap().without_remote()
    }

    struct Exploding;

    impl Facet for Exploding {
        fn kind(&self) -> FacetKind {
            FacetKind::Coherence
        }

        fn analyze(&self, _: &FacetInput, _: &FacetContext<'_>) -> Result<FacetScore, FacetError> {
            panic!("boom")
        }
    }

    struct Failing;

    impl Facet for Failing {
        fn kind(&self) -> FacetKind {
            FacetKind::Grammar
        }

        fn analyze(&self, _: &FacetInput, _: &FacetContext<'_>) -> Result<FacetScore, FacetError> {
            Err(FacetError::Failed {
                facet: FacetKind::Grammar,
                message: "checker offline".to_string(),
            })
        }
    }

    #[test]
    fn test_all_topics_dedups_in_order() {
        let request = AnalyzeRequest::new("x").topic("rust").topics(["cargo", "rust", " ", "crates"]);
        assert_eq!(request.all_topics(), vec!["rust", "cargo", "crates"]);
    }

    #[test]
    fn test_descriptor_is_topic_list_for_plain_requests() {
        let request = AnalyzeRequest::new("x").topic("rust");
        let topics = request.all_topics();
        assert_eq!(request.descriptor(&topics, &WeightVector::default()), r#"["rust"]"#);
        assert_eq!(AnalyzeRequest::new("x").descriptor(&[], &WeightVector::default()), "[]");
    }

    #[test]
    fn test_descriptor_keeps_joined_and_split_topics_apart() {
        let joined = AnalyzeRequest::new("x").topic("rust|cooking");
        let split = AnalyzeRequest::new("x").topics(["rust", "cooking"]);
        let weights = WeightVector::default();
        assert_ne!(
            joined.descriptor(&joined.all_topics(), &weights),
            split.descriptor(&split.all_topics(), &weights)
        );

        let weighted = AnalyzeRequest::new("x").topic("rust").weight("grammar", 1.0);
        let plain = AnalyzeRequest::new("x").topic("rust");
        assert_ne!(
            weighted.descriptor(&weighted.all_topics(), &weights),
            plain.descriptor(&plain.all_topics(), &weights)
        );
    }

    #[test]
    fn test_topic_separators_do_not_share_cache_entries() {
        let engine = engine();
        let text = "Rust has ownership rules. Cooking needs patience and good knives in the kitchen.";
        let joined = engine.analyze(&AnalyzeRequest::new(text).topic("rust|cooking")).unwrap();
        let split = engine
            .analyze(&AnalyzeRequest::new(text).topics(["rust", "cooking"]))
            .unwrap();

        let coverage = |r: &CompositeResult| r.relevance.detail["topic_coverage"].as_object().map(|m| m.len());
        assert_eq!(coverage(&joined), Some(1));
        assert_eq!(coverage(&split), Some(2));
        let stats = engine.cache().unwrap().stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_rejects_empty_and_short_text() {
        let engine = engine();
        assert_eq!(
            engine.analyze(&AnalyzeRequest::new("   \n  ")),
            Err(AnalyzeError::Validation(ValidationError::Empty))
        );
        assert_eq!(
            engine.analyze(&AnalyzeRequest::new("Too short.")),
            Err(AnalyzeError::Validation(ValidationError::TooShort { length: 10, min: 50 }))
        );
    }

    #[test]
    fn test_rejects_too_long_text() {
        let mut config = Config::default();
        config.max_text_length = 60;
        let engine = AnalysisEngine::new(config).unwrap().without_remote();
        let text = "word ".repeat(20);
        assert!(matches!(
            engine.analyze(&AnalyzeRequest::new(text)),
            Err(AnalyzeError::Validation(ValidationError::TooLong { max: 60, .. }))
        ));
    }

    #[test]
    fn test_no_topic_gives_neutral_relevance() {
        let result = engine().analyze(&AnalyzeRequest::new(SAMPLE)).unwrap();
        assert_eq!(result.relevance.score, 50.0);
        assert!(result.relevance.suggestions.iter().any(|s| s == NO_TOPIC_SUGGESTION));
        assert!((0.0..=100.0).contains(&result.overall_score));
        assert_eq!(result.stats.sentence_count, 2);
    }

    #[test]
    fn test_grammar_only_weights() {
        let request = AnalyzeRequest::new(SAMPLE).weight("grammar", 1.0);
        let result = engine().analyze(&request).unwrap();
        assert_eq!(result.weights, WeightVector::new(1.0, 0.0, 0.0));
        assert_eq!(result.overall_score, crate::round2(result.grammar.score));
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let request = AnalyzeRequest::new(SAMPLE).weight("style", 1.0);
        assert_eq!(
            engine().analyze(&request),
            Err(AnalyzeError::Validation(ValidationError::UnknownFacet("style".to_string())))
        );
    }

    #[test]
    fn test_second_call_served_from_cache() {
        let engine = engine();
        let request = AnalyzeRequest::new(SAMPLE).topic("testing");
        let first = engine.analyze(&request).unwrap();
        let second = engine.analyze(&request).unwrap();
        assert_eq!(first, second);
        let stats = engine.cache().unwrap().stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_panicking_facet_degrades_to_neutral() {
        let engine = engine().with_facet(Box::new(Exploding));
        let result = engine.analyze(&AnalyzeRequest::new(SAMPLE)).unwrap();
        assert_eq!(result.coherence.score, 50.0);
        assert!(result.coherence.suggestions[0].starts_with("Coherence analysis unavailable"));
        assert!(result.coherence.suggestions[0].contains("boom"));
    }

    #[test]
    fn test_failing_facet_degrades_to_neutral() {
        let engine = engine().with_facet(Box::new(Failing));
        let result = engine.analyze(&AnalyzeRequest::new(SAMPLE)).unwrap();
        assert_eq!(result.grammar.score, 50.0);
        assert!(result.grammar.findings.is_empty());
        assert!(result.grammar.suggestions[0].contains("checker offline"));
    }

    #[test]
    fn test_cancelled_request_writes_nothing() {
        let history = Arc::new(InMemoryHistory::new(10));
        let engine = engine().with_history(history.clone());
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(
            engine.analyze_with_cancel(&AnalyzeRequest::new(SAMPLE), &token),
            Err(AnalyzeError::Cancelled)
        );
        assert_eq!(engine.cache().unwrap().stats().entries, 0);
        assert!(history.list(10).unwrap().is_empty());
    }

    #[test]
    fn test_history_records_result() {
        let history = Arc::new(InMemoryHistory::new(10));
        let engine = engine().with_history(history.clone());
        let result = engine.analyze(&AnalyzeRequest::new(SAMPLE).topic("tests")).unwrap();
        let items = history.list(10).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].topic.as_deref(), Some("tests"));
        assert_eq!(history.get(&items[0].id).unwrap(), Some(result));
    }

    #[test]
    fn test_batch_size_bounds() {
        let engine = engine();
        assert!(matches!(
            engine.analyze_batch(&[], false),
            Err(AnalyzeError::Validation(ValidationError::BatchSize { got: 0, .. }))
        ));
        let too_many = vec![AnalyzeRequest::new(SAMPLE); MAX_BATCH_SIZE + 1];
        assert!(matches!(
            engine.analyze_batch(&too_many, false),
            Err(AnalyzeError::Validation(ValidationError::BatchSize { got: 101, max: 100 }))
        ));
    }

    #[test]
    fn test_batch_fails_on_first_invalid_text() {
        let requests = vec![AnalyzeRequest::new(SAMPLE), AnalyzeRequest::new("short")];
        assert!(matches!(
            engine().analyze_batch(&requests, true),
            Err(AnalyzeError::Validation(ValidationError::TooShort { .. }))
        ));
    }

    #[test]
    fn test_batch_with_comparison() {
        let requests = vec![
            AnalyzeRequest::new(SAMPLE),
            AnalyzeRequest::new("Another short paragraph for the batch. It also has two sentences."),
        ];
        let batch = engine().analyze_batch(&requests, true).unwrap();
        assert_eq!(batch.results.len(), 2);
        assert_eq!(batch.summary_statistics.total_texts, 2);
        assert!(batch.comparative_analysis.is_some());
    }
}
