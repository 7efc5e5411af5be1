//! Bounded worker pool and request cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Default number of worker threads
pub const DEFAULT_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("request was cancelled")]
pub struct Cancelled;

/// Shared flag tying task lifetime to the request that spawned it.
///
/// Clones observe the same flag. Work checks it at every suspension point
/// and stops early once it is set.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Fixed-width pool all CPU-bound and blocking facet work is submitted to
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    width: usize,
}

impl WorkerPool {
    pub fn new(width: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let width = width.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(width)
            .thread_name(|i| format!("quill-worker-{}", i))
            .build()?;
        Ok(Self { pool, width })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Run `f` on the pool unless the token is already cancelled, and discard
    /// its output if cancellation happened while it ran.
    pub fn submit<R, F>(&self, cancel: &CancellationToken, f: F) -> Result<R, Cancelled>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        cancel.check()?;
        let out = self.pool.install(f);
        cancel.check()?;
        Ok(out)
    }

    /// Run two tasks concurrently on the pool and wait for both
    pub fn join<A, B, RA, RB>(&self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        self.pool.install(|| rayon::join(a, b))
    }

    /// Run three tasks concurrently on the pool and wait for all of them
    pub fn join3<A, B, C, RA, RB, RC>(&self, a: A, b: B, c: C) -> (RA, RB, RC)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        C: FnOnce() -> RC + Send,
        RA: Send,
        RB: Send,
        RC: Send,
    {
        self.pool.install(|| {
            let (ra, (rb, rc)) = rayon::join(a, || rayon::join(b, c));
            (ra, rb, rc)
        })
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("width", &self.width).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_token_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());
        clone.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(Cancelled));
    }

    #[test]
    fn test_submit_skips_when_cancelled() {
        let pool = WorkerPool::new(2).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let ran = AtomicUsize::new(0);
        let result = pool.submit(&token, || ran.fetch_add(1, Ordering::SeqCst));
        assert!(result.is_err());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_submit_discards_output_cancelled_mid_flight() {
        let pool = WorkerPool::new(2).unwrap();
        let token = CancellationToken::new();
        let inner = token.clone();
        let result = pool.submit(&token, move || {
            inner.cancel();
            42
        });
        assert_eq!(result, Err(Cancelled));
    }

    #[test]
    fn test_join_and_join3() {
        let pool = WorkerPool::new(4).unwrap();
        assert_eq!(pool.width(), 4);
        let (a, b, c) = pool.join3(|| 1, || "two", || 3.0);
        assert_eq!((a, b, c), (1, "two", 3.0));
        assert_eq!(pool.join(|| "a", || 2), ("a", 2));
    }

    #[test]
    fn test_zero_width_is_clamped() {
        assert_eq!(WorkerPool::new(0).unwrap().width(), 1);
    }
}
