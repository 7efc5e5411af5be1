//! Analysis result caching
//!
//! Content-addressed memoization of composite results with a time-to-live and
//! a byte budget enforced by least-recently-used eviction. Safe to share
//! between concurrent requests: every operation takes the one internal lock,
//! and entries are immutable once inserted, so a reader never sees a
//! partially written entry.

use crate::CompositeResult;
use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Bumped whenever the cached payload's shape changes
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to serialize cache entry: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Cache storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Result of {size} bytes exceeds the cache budget of {max} bytes")]
    TooLarge { size: usize, max: u64 },
}

/// One cached composite result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub payload: CompositeResult,
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    /// Time-to-live in milliseconds
    pub ttl_ms: u64,
    /// Serialized size of the payload
    #[serde(default)]
    pub size: usize,
}

impl CacheEntry {
    pub fn is_expired(&self) -> bool {
        let age = Utc::now().signed_duration_since(self.created_at);
        // Entries from the future (clock skew) are not expired
        age.to_std()
            .map(|age| age >= Duration::from_millis(self.ttl_ms))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// On-disk form. Entries are stored least recently used first.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: Vec<CacheEntry>,
}

struct Inner {
    entries: LruCache<String, Arc<CacheEntry>>,
    bytes: usize,
    hits: u64,
    misses: u64,
}

impl Inner {
    fn remove(&mut self, key: &str) -> Option<Arc<CacheEntry>> {
        let removed = self.entries.pop(key)?;
        self.bytes = self.bytes.saturating_sub(removed.size);
        Some(removed)
    }
}

/// Cache manager for composite results
pub struct ResultCache {
    inner: Mutex<Inner>,
    ttl: Duration,
    max_bytes: u64,
    /// Whether the cache changed since it was loaded or saved
    dirty: AtomicBool,
}

impl ResultCache {
    pub fn new(ttl: Duration, max_bytes: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                bytes: 0,
                hits: 0,
                misses: 0,
            }),
            ttl,
            max_bytes,
            dirty: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &crate::config::CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_secs), config.max_bytes)
    }

    /// Compute the cache key for a normalized text and its request descriptor.
    /// Each part is length-prefixed so no text/descriptor split collides
    /// with another.
    pub fn key(text: &str, descriptor: &str) -> String {
        let mut hasher = Sha256::new();
        for part in [text, descriptor] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave a torn entry behind:
        // entries are swapped in whole
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Cached result if present, unexpired and of the current schema.
    /// Stale entries are evicted on the way.
    pub fn get(&self, key: &str) -> Option<CompositeResult> {
        let entry = {
            let mut inner = self.lock();
            let lookup = inner.entries.get(key).cloned();
            match lookup {
                Some(entry) if entry.schema_version == SCHEMA_VERSION && !entry.is_expired() => {
                    inner.hits += 1;
                    Some(entry)
                }
                Some(_) => {
                    debug!("Evicting stale cache entry {}", key);
                    inner.remove(key);
                    inner.misses += 1;
                    self.dirty.store(true, Ordering::Relaxed);
                    None
                }
                None => {
                    inner.misses += 1;
                    None
                }
            }
        };
        entry.map(|e| e.payload.clone())
    }

    /// Store a result, evicting least recently used entries until the byte
    /// budget holds again.
    pub fn set(&self, key: &str, result: &CompositeResult) -> Result<(), CacheError> {
        let size = serde_json::to_vec(result)?.len();
        if size as u64 > self.max_bytes {
            return Err(CacheError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }
        let entry = Arc::new(CacheEntry {
            key: key.to_string(),
            payload: result.clone(),
            schema_version: SCHEMA_VERSION,
            created_at: Utc::now(),
            ttl_ms: self.ttl.as_millis() as u64,
            size,
        });

        let mut inner = self.lock();
        self.insert_locked(&mut inner, entry);
        self.dirty.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn insert_locked(&self, inner: &mut Inner, entry: Arc<CacheEntry>) {
        let size = entry.size;
        if let Some(previous) = inner.entries.put(entry.key.clone(), entry) {
            inner.bytes = inner.bytes.saturating_sub(previous.size);
        }
        inner.bytes += size;

        while inner.bytes as u64 > self.max_bytes {
            let Some((evicted, old)) = inner.entries.pop_lru() else {
                break;
            };
            debug!("Evicting cache entry {} ({} bytes)", evicted, old.size);
            inner.bytes = inner.bytes.saturating_sub(old.size);
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        let removed = self.lock().remove(key).is_some();
        if removed {
            self.dirty.store(true, Ordering::Relaxed);
        }
        removed
    }

    /// Clear all cached entries
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.bytes = 0;
        self.dirty.store(true, Ordering::Relaxed);
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.lock();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        if !expired.is_empty() {
            self.dirty.store(true, Ordering::Relaxed);
        }
        expired.len()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let lookups = inner.hits + inner.misses;
        CacheStats {
            entries: inner.entries.len(),
            bytes: inner.bytes,
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: if lookups > 0 {
                inner.hits as f64 / lookups as f64
            } else {
                0.0
            },
        }
    }

    /// Load a snapshot. A missing, unreadable or outdated file yields an
    /// empty cache; expired entries are skipped.
    pub fn load(path: &Path, ttl: Duration, max_bytes: u64) -> Self {
        let cache = Self::new(ttl, max_bytes);
        let Some(snapshot) = Self::read_snapshot(path) else {
            return cache;
        };

        {
            let mut inner = cache.lock();
            for entry in snapshot.entries {
                if entry.schema_version != SCHEMA_VERSION || entry.is_expired() {
                    continue;
                }
                cache.insert_locked(&mut inner, Arc::new(entry));
            }
            debug!("Loaded {} cache entries from {}", inner.entries.len(), path.display());
        }
        cache
    }

    fn read_snapshot(path: &Path) -> Option<Snapshot> {
        let content = fs::read_to_string(path).ok()?;
        let snapshot: Snapshot = match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                return None;
            }
        };

        // Check version compatibility
        if snapshot.version != SCHEMA_VERSION {
            debug!("Ignoring cache file with schema version {}", snapshot.version);
            return None;
        }
        Some(snapshot)
    }

    /// Save to disk if anything changed since load
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        if !self.dirty.load(Ordering::Relaxed) {
            return Ok(());
        }

        let snapshot = {
            let inner = self.lock();
            Snapshot {
                version: SCHEMA_VERSION,
                // iter() runs most recent first
                entries: inner.entries.iter().rev().map(|(_, e)| e.as_ref().clone()).collect(),
            }
        };
        let content = serde_json::to_string(&snapshot)?;
        fs::write(path, content)?;
        self.dirty.store(false, Ordering::Relaxed);
        Ok(())
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("ttl", &self.ttl)
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}
