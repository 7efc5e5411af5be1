//! Analysis history - an injected store of past composite results

use crate::CompositeResult;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Characters of the analyzed text kept in a history item
const PREVIEW_CHARS: usize = 100;

/// Summary row of a stored analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub text_preview: String,
    pub overall_score: f64,
    pub word_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl HistoryItem {
    pub fn new(id: &str, text: &str, topic: Option<&str>, result: &CompositeResult) -> Self {
        Self {
            id: id.to_string(),
            timestamp: result.timestamp,
            text_preview: crate::analyzer::preview(text, PREVIEW_CHARS),
            overall_score: result.overall_score,
            word_count: result.stats.word_count,
            topic: topic.map(str::to_string),
        }
    }
}

/// Id for a history record: the cache key prefix plus the creation time
pub fn history_id(cache_key: &str, at: DateTime<Utc>) -> String {
    let prefix: String = cache_key.chars().take(12).collect();
    format!("{}-{}", prefix, at.timestamp_millis())
}

/// Where composite results are kept after analysis
pub trait HistoryStore: Send + Sync {
    fn put(&self, id: &str, text: &str, topic: Option<&str>, result: &CompositeResult) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<CompositeResult>>;

    /// Most recent first
    fn list(&self, limit: usize) -> Result<Vec<HistoryItem>>;

    fn delete(&self, id: &str) -> Result<bool>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAnalysis {
    item: HistoryItem,
    result: CompositeResult,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    analyses: Vec<StoredAnalysis>,
}

impl HistoryFile {
    fn put(&mut self, stored: StoredAnalysis, max_items: usize) {
        self.analyses.retain(|a| a.item.id != stored.item.id);
        self.analyses.push(stored);
        if self.analyses.len() > max_items {
            self.analyses.drain(0..self.analyses.len() - max_items);
        }
    }

    fn get(&self, id: &str) -> Option<CompositeResult> {
        self.analyses
            .iter()
            .find(|a| a.item.id == id)
            .map(|a| a.result.clone())
    }

    fn list(&self, limit: usize) -> Vec<HistoryItem> {
        self.analyses
            .iter()
            .rev()
            .take(limit)
            .map(|a| a.item.clone())
            .collect()
    }

    fn delete(&mut self, id: &str) -> bool {
        let before = self.analyses.len();
        self.analyses.retain(|a| a.item.id != id);
        self.analyses.len() != before
    }
}

/// Process-local history, bounded to `max_items`
pub struct InMemoryHistory {
    data: Mutex<HistoryFile>,
    max_items: usize,
}

impl InMemoryHistory {
    pub fn new(max_items: usize) -> Self {
        Self {
            data: Mutex::new(HistoryFile::default()),
            max_items: max_items.max(1),
        }
    }

    fn data(&self) -> std::sync::MutexGuard<'_, HistoryFile> {
        match self.data.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl HistoryStore for InMemoryHistory {
    fn put(&self, id: &str, text: &str, topic: Option<&str>, result: &CompositeResult) -> Result<()> {
        let stored = StoredAnalysis {
            item: HistoryItem::new(id, text, topic, result),
            result: result.clone(),
        };
        self.data().put(stored, self.max_items);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<CompositeResult>> {
        Ok(self.data().get(id))
    }

    fn list(&self, limit: usize) -> Result<Vec<HistoryItem>> {
        Ok(self.data().list(limit))
    }

    fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.data().delete(id))
    }
}

/// History persisted to a JSON file, read and rewritten on every change
pub struct JsonFileHistory {
    path: PathBuf,
    max_items: usize,
    /// Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl JsonFileHistory {
    pub fn new(path: &Path, max_items: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            max_items: max_items.max(1),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load history (or start empty when the file does not exist yet)
    fn load(&self) -> Result<HistoryFile> {
        if !self.path.exists() {
            return Ok(HistoryFile::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read history: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse history: {}", self.path.display()))
    }

    fn save(&self, history: &HistoryFile) -> Result<()> {
        let content = serde_json::to_string_pretty(history).context("Failed to serialize history")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write history: {}", self.path.display()))
    }

    fn with_file<R>(&self, f: impl FnOnce(&mut HistoryFile) -> (R, bool)) -> Result<R> {
        let _guard = match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut history = self.load()?;
        let (out, changed) = f(&mut history);
        if changed {
            self.save(&history)?;
        }
        Ok(out)
    }
}

impl HistoryStore for JsonFileHistory {
    fn put(&self, id: &str, text: &str, topic: Option<&str>, result: &CompositeResult) -> Result<()> {
        let stored = StoredAnalysis {
            item: HistoryItem::new(id, text, topic, result),
            result: result.clone(),
        };
        let max_items = self.max_items;
        self.with_file(|h| {
            h.put(stored, max_items);
            ((), true)
        })
    }

    fn get(&self, id: &str) -> Result<Option<CompositeResult>> {
        self.with_file(|h| (h.get(id), false))
    }

    fn list(&self, limit: usize) -> Result<Vec<HistoryItem>> {
        self.with_file(|h| (h.list(limit), false))
    }

    fn delete(&self, id: &str) -> Result<bool> {
        self.with_file(|h| {
            let removed = h.delete(id);
            (removed, removed)
        })
    }
}
