//! Remote enrichment pass: a rate-limited, time-bounded, retried call to an
//! external analyzer whose free-text reply embeds JSON.

pub mod claude;
pub mod extract;
pub mod prompts;

pub use claude::{is_ai_available, ClaudeClient};
pub use extract::extract_json;

use crate::config::RemoteConfig;
use crate::pool::CancellationToken;
use serde_json::Value;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Error from the remote analyzer
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("ANTHROPIC_API_KEY environment variable not set")]
    NoApiKey,
    #[error("Authentication failed: {0}")]
    Unauthorized(String),
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Rate limited - try again later")]
    RateLimited,
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl RemoteError {
    /// Missing or rejected credentials will not fix themselves between attempts
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RemoteError::NoApiKey | RemoteError::Unauthorized(_))
    }
}

/// An external analyzer: prompt in, free text out
pub trait EnrichmentClient: Send + Sync {
    fn query(&self, prompt: &str) -> Result<String, RemoteError>;
}

/// Result of the remote pass, made explicit so the caller picks the fallback
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutcome {
    /// The first well-formed JSON value found in the reply
    Enriched(Value),
    /// The pass could not produce data; the facet continues local-only
    Unavailable(String),
}

/// Enforces a minimum interval between request starts by blocking the caller.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn per_minute(requests: u32) -> Self {
        Self::with_interval(Duration::from_secs_f64(60.0 / requests.max(1) as f64))
    }

    pub fn with_interval(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a request may start, then record it. The lock is held while
    /// sleeping so concurrent callers queue up one interval apart.
    pub fn acquire(&self) {
        let mut last = match self.last_request.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}

/// The remote pass shared by every facet of an engine
pub struct RemotePass {
    client: Arc<dyn EnrichmentClient>,
    limiter: RateLimiter,
    timeout: Duration,
    max_attempts: u32,
    backoff_base: Duration,
    max_chars: usize,
}

impl RemotePass {
    pub fn new(client: Arc<dyn EnrichmentClient>, settings: &RemoteConfig) -> Self {
        Self {
            client,
            limiter: RateLimiter::per_minute(settings.rate_limit_per_minute),
            timeout: Duration::from_secs(settings.timeout_secs),
            max_attempts: settings.max_attempts.max(1),
            backoff_base: Duration::from_millis(settings.backoff_base_ms),
            max_chars: settings.max_chars,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Whether a text of `char_len` characters is short enough to send
    pub fn accepts(&self, char_len: usize) -> bool {
        char_len < self.max_chars
    }

    /// Run the prompt through the client with rate limiting, per-call timeout
    /// and exponential backoff. Never fails: every problem becomes `Unavailable`.
    pub fn run(&self, prompt: &str, cancel: &CancellationToken) -> RemoteOutcome {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return RemoteOutcome::Unavailable("cancelled".to_string());
            }
            self.limiter.acquire();

            match self.call_with_timeout(prompt) {
                Ok(reply) => {
                    return match extract_json(&reply) {
                        Some(value) => RemoteOutcome::Enriched(value),
                        None => {
                            warn!("Remote reply contained no parseable JSON");
                            RemoteOutcome::Unavailable("no JSON in reply".to_string())
                        }
                    };
                }
                Err(e) if !e.is_retryable() => {
                    debug!("Remote pass unavailable: {}", e);
                    return RemoteOutcome::Unavailable(e.to_string());
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        warn!("Remote pass failed after {} attempts: {}", attempt, e);
                        return RemoteOutcome::Unavailable(e.to_string());
                    }
                    let delay = self.backoff_base * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        "Remote call failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt, self.max_attempts, delay, e
                    );
                    if !sleep_unless_cancelled(delay, cancel) {
                        return RemoteOutcome::Unavailable("cancelled".to_string());
                    }
                }
            }
        }
    }

    fn call_with_timeout(&self, prompt: &str) -> Result<String, RemoteError> {
        let (tx, rx) = mpsc::channel();
        let client = Arc::clone(&self.client);
        let prompt = prompt.to_string();
        std::thread::Builder::new()
            .name("quill-remote".to_string())
            .spawn(move || {
                // Receiver may be gone after a timeout
                let _ = tx.send(client.query(&prompt));
            })
            .map_err(|e| RemoteError::RequestFailed(e.to_string()))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(RemoteError::Timeout(self.timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(RemoteError::RequestFailed("remote worker panicked".to_string()))
            }
        }
    }
}

impl std::fmt::Debug for RemotePass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemotePass")
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_base", &self.backoff_base)
            .field("max_chars", &self.max_chars)
            .finish()
    }
}

/// Sleep in short slices; false if the token was cancelled meanwhile
fn sleep_unless_cancelled(total: Duration, cancel: &CancellationToken) -> bool {
    const SLICE: Duration = Duration::from_millis(25);
    let deadline = Instant::now() + total;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(SLICE.min(deadline - now));
    }
}
