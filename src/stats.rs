//! Hit/miss counters exposed for callers that want visibility into cache
//! effectiveness without attaching a full metrics pipeline.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cache hit/miss counters, safe to share across concurrent resolves.
#[derive(Debug, Default)]
pub struct Statistics {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Statistics {
    /// A zeroed counter pair.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a cache hit (fresh or acceptably-stale serve).
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a cache miss (forwarded to the resolver).
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Total hits recorded so far.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Total misses recorded so far.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
