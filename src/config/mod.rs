//! Configuration loading for Quill

mod schema;

pub use schema::{
    AnalysisConfig, CacheConfig, Config, CustomWeightPolicy, HistoryConfig, RemoteConfig,
    RuleSeverity,
};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = ".quillrc.json";

/// Find and load config file with extends resolution. Searches current directory then parents.
pub fn load_config(work_dir: &Path, custom_path: Option<&Path>) -> Result<Config> {
    let path = if let Some(p) = custom_path {
        let path = if p.is_absolute() {
            p.to_path_buf()
        } else {
            work_dir.join(p)
        };
        if path.exists() {
            Some(path)
        } else {
            anyhow::bail!("Config file not found: {}", path.display());
        }
    } else {
        find_config_in_parents(work_dir)
    };

    let config = match path {
        Some(path) => {
            let raw = load_json_with_extends(&path, &mut HashSet::new())?;
            serde_json::from_value::<Config>(raw)
                .with_context(|| format!("Invalid config: {}", path.display()))?
        }
        None => Config::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Load a config file as JSON and fold its extends chain underneath it
fn load_json_with_extends(config_path: &Path, visited: &mut HashSet<PathBuf>) -> Result<Value> {
    // Prevent circular extends
    let canonical = config_path
        .canonicalize()
        .unwrap_or_else(|_| config_path.to_path_buf());
    if !visited.insert(canonical) {
        anyhow::bail!(
            "Circular extends detected in config: {}",
            config_path.display()
        );
    }

    let content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
    let mut value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in config: {}", config_path.display()))?;

    let extends = value
        .as_object_mut()
        .and_then(|obj| obj.remove("extends"))
        .and_then(|v| v.as_str().map(str::to_string));

    match extends {
        Some(extends) => {
            let base_path = resolve_extends(config_path, &extends)?;
            let mut base = load_json_with_extends(&base_path, visited)?;
            merge_json(&mut base, value);
            Ok(base)
        }
        None => Ok(value),
    }
}

/// Resolve an extends reference relative to the referencing config
fn resolve_extends(config_path: &Path, extends: &str) -> Result<PathBuf> {
    let config_dir = config_path.parent().unwrap_or(Path::new("."));
    let extends_path = if Path::new(extends).is_absolute() {
        PathBuf::from(extends)
    } else {
        config_dir.join(extends)
    };

    // Ensure it has .json extension
    let extends_path = if extends_path.extension().is_none() {
        extends_path.with_extension("json")
    } else {
        extends_path
    };

    if !extends_path.exists() {
        anyhow::bail!(
            "Extended config not found: {} (referenced from {})",
            extends_path.display(),
            config_path.display()
        );
    }
    Ok(extends_path)
}

/// Overlay `child` onto `base`. Objects merge key by key, `ignore` lists
/// concatenate, anything else in the child replaces the base value.
fn merge_json(base: &mut Value, child: Value) {
    match (base, child) {
        (Value::Object(base_map), Value::Object(child_map)) => {
            for (key, child_value) in child_map {
                match base_map.get_mut(&key) {
                    Some(Value::Array(base_items)) if key == "ignore" => {
                        if let Value::Array(items) = child_value {
                            base_items.extend(items);
                        }
                    }
                    Some(base_value) => merge_json(base_value, child_value),
                    None => {
                        base_map.insert(key, child_value);
                    }
                }
            }
        }
        (base, child) => *base = child,
    }
}

/// Search for .quillrc.json in directory and its parents
fn find_config_in_parents(mut dir: &Path) -> Option<PathBuf> {
    loop {
        let candidate = dir.join(CONFIG_FILENAME);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
}

/// Build a GlobSet from ignore patterns for path matching
pub fn build_ignore_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("Invalid ignore pattern: {}", pattern))?;
        builder.add(glob);
    }
    builder.build().map_err(|e| anyhow::anyhow!("{}", e))
}

/// Check if a path should be ignored based on config glob patterns
pub fn is_ignored(path: &Path, ignore_set: &GlobSet) -> bool {
    ignore_set.is_match(path)
}

/// Pretty JSON for a fresh `.quillrc.json`
pub fn default_config_json(threshold: Option<u8>) -> Result<String> {
    let mut config = Config::default();
    config.threshold = threshold;
    config.ignore = vec!["**/node_modules/**".to_string(), "**/target/**".to_string()];
    serde_json::to_string_pretty(&config).context("Failed to serialize default config")
}
