//! Config schema and deserialization

use crate::{FacetKind, WeightVector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Grammar rule severity override (low, medium, high, critical, off)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    Low,
    Medium,
    High,
    Critical,
    /// Disable the rule entirely
    Off,
}

impl RuleSeverity {
    /// Convert to crate::Severity if not Off
    pub fn to_severity(self) -> Option<crate::Severity> {
        match self {
            RuleSeverity::Low => Some(crate::Severity::Low),
            RuleSeverity::Medium => Some(crate::Severity::Medium),
            RuleSeverity::High => Some(crate::Severity::High),
            RuleSeverity::Critical => Some(crate::Severity::Critical),
            RuleSeverity::Off => None,
        }
    }
}

/// How per-request custom weights combine with the configured defaults.
///
/// `Replace` is the default on purpose: `{"grammar": 1}` must yield the
/// grammar score alone, which overlaying the defaults cannot give. Callers
/// wanting the older "missing facets keep their default" merge opt into
/// `Overlay`. Do not flip the default without changing that contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CustomWeightPolicy {
    /// Facets missing from the custom weights get weight 0
    #[default]
    Replace,
    /// Facets missing from the custom weights keep their default weight
    Overlay,
}

/// Result cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Time-to-live of an entry in seconds
    pub ttl_secs: u64,
    /// Upper bound on the summed size of cached results
    pub max_bytes: u64,
    /// Snapshot file used by the CLI (relative to the working directory)
    pub path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
            max_bytes: 1_000_000_000,
            path: ".quill-cache.json".to_string(),
        }
    }
}

/// Remote enrichment pass settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteConfig {
    pub enabled: bool,
    pub rate_limit_per_minute: u32,
    /// Per-call timeout
    pub timeout_secs: u64,
    pub max_attempts: u32,
    /// First retry delay; doubles on every further attempt
    pub backoff_base_ms: u64,
    /// Texts this long or longer skip the remote pass
    pub max_chars: usize,
    pub model: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limit_per_minute: 60,
            timeout_secs: 30,
            max_attempts: 3,
            backoff_base_ms: 1000,
            max_chars: 2000,
            model: "claude-sonnet-4-20250514".to_string(),
        }
    }
}

/// Facet tuning values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    pub worker_threads: usize,
    /// Max endpoint distance (chars) at which two findings count as the same issue
    pub overlap_tolerance: usize,
    /// Adjacent-sentence similarity below which a link is weak
    pub weak_link_threshold: f64,
    /// Best topic similarity below which a paragraph drifts
    pub drift_threshold: f64,
    pub suggestion_cap: usize,
    pub improvement_cap: usize,
    pub strength_cap: usize,
    pub strength_threshold: f64,
    /// Facet score spread above which the summary names strongest and weakest
    pub imbalance_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            worker_threads: crate::pool::DEFAULT_WIDTH,
            overlap_tolerance: 5,
            weak_link_threshold: 0.3,
            drift_threshold: 0.3,
            suggestion_cap: 5,
            improvement_cap: 3,
            strength_cap: 3,
            strength_threshold: 85.0,
            imbalance_threshold: 20.0,
        }
    }
}

/// Analysis history settings (CLI only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub path: String,
    pub max_items: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: ".quill-history.json".to_string(),
            max_items: 100,
        }
    }
}

/// Root config structure for .quillrc.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Extend another config file (path relative to this config)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    /// Minimum overall score (exit 1 if below). Default: none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u8>,

    /// Default facet weights, normalized before use
    #[serde(default)]
    pub weights: WeightVector,

    #[serde(default)]
    pub custom_weight_policy: CustomWeightPolicy,

    /// Minimum text length in characters, after trimming
    #[serde(default = "default_min_text_length")]
    pub min_text_length: usize,

    /// Maximum text length in characters, after trimming
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,

    /// Per-rule severity overrides for the local grammar pass. Key is the rule id.
    #[serde(default)]
    pub rules: HashMap<String, RuleSeverity>,

    /// Glob patterns for files/directories to skip when walking a directory
    #[serde(default)]
    pub ignore: Vec<String>,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub history: HistoryConfig,
}

fn default_min_text_length() -> usize {
    50
}

fn default_max_text_length() -> usize {
    50_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extends: None,
            threshold: None,
            weights: WeightVector::default(),
            custom_weight_policy: CustomWeightPolicy::default(),
            min_text_length: default_min_text_length(),
            max_text_length: default_max_text_length(),
            rules: HashMap::new(),
            ignore: Vec::new(),
            cache: CacheConfig::default(),
            remote: RemoteConfig::default(),
            analysis: AnalysisConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Config {
    /// Merge CLI overrides into config. CLI values take precedence.
    pub fn merge_with_cli(mut self, cli_threshold: Option<u8>, no_cache: bool) -> Self {
        if cli_threshold.is_some() {
            self.threshold = cli_threshold;
        }
        if no_cache {
            self.cache.enabled = false;
        }
        self
    }

    /// Get the configured override for a rule, if any
    pub fn rule_severity(&self, rule_id: &str) -> Option<RuleSeverity> {
        self.rules.get(rule_id).copied()
    }

    /// Reject values no analysis could run with
    pub fn validate(&self) -> anyhow::Result<()> {
        for facet in FacetKind::ALL {
            let w = self.weights.get(facet);
            if !w.is_finite() || w < 0.0 {
                anyhow::bail!("Invalid weight for {}: {}", facet, w);
            }
        }
        if self.weights.total() <= 0.0 {
            anyhow::bail!("At least one facet weight must be positive");
        }
        if self.min_text_length > self.max_text_length {
            anyhow::bail!(
                "minTextLength ({}) is greater than maxTextLength ({})",
                self.min_text_length,
                self.max_text_length
            );
        }
        if self.remote.rate_limit_per_minute == 0 {
            anyhow::bail!("remote.rateLimitPerMinute must be at least 1");
        }
        Ok(())
    }

    /// Resolve the cache snapshot path against a working directory
    pub fn cache_path(&self, work_dir: &Path) -> std::path::PathBuf {
        work_dir.join(&self.cache.path)
    }

    pub fn history_path(&self, work_dir: &Path) -> std::path::PathBuf {
        work_dir.join(&self.history.path)
    }
}
