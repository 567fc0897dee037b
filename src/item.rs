//! `CacheItem`: a cached response plus the instant it entered the cache.

use std::time::{Instant, SystemTime};

use crate::cache_control::CacheControl;
use crate::freshness::{self, Freshness};
use crate::response::Response;

/// A response bundled with the monotonic instant it was cached. The instant
/// is assigned exactly once, at construction, and never mutated.
#[derive(Debug, Clone)]
pub struct CacheItem {
    /// The cached response.
    pub response: Response,
    /// The instant this item entered the cache (for lease ordering/metrics).
    pub cached_at: Instant,
    /// The wall-clock time this item entered the cache, used for the
    /// freshness arithmetic, which is defined in terms of HTTP dates rather
    /// than a monotonic clock.
    pub response_time: SystemTime,
}

impl CacheItem {
    /// Wraps `response`, stamping it with the current instant.
    pub fn new(response: Response) -> Self {
        Self { response, cached_at: Instant::now(), response_time: SystemTime::now() }
    }

    /// Classifies this item's freshness as of `now`.
    pub fn freshness(&self, now: SystemTime) -> Freshness {
        let cache_control = CacheControl::parse(&self.response.headers);
        freshness::classify(
            &self.response.headers,
            &cache_control,
            self.response_time,
            now,
        )
    }

    /// `true` iff this item is stale as of `now`.
    pub fn is_stale(&self, now: SystemTime) -> bool {
        self.freshness(now) == Freshness::Stale
    }
}
