//! Per-URI serialization so concurrent requests for the same uncached
//! resource collapse into a single resolve instead of a thundering herd.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A registry of per-URI mutexes, created on first use and dropped once no
/// lease references them.
#[derive(Debug, Default)]
pub struct LockRegistry {
    entries: DashMap<String, Arc<Mutex<()>>>,
}

/// Holds a URI's lock until dropped. The registry entry is reclaimed once
/// this is the last outstanding reference.
pub struct Lease {
    _guard: OwnedMutexGuard<()>,
}

impl LockRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    /// Acquires the lock for `uri`, waiting if another caller already holds
    /// it. The returned lease releases the lock on drop.
    pub async fn acquire(&self, uri: &str) -> Lease {
        let mutex = self
            .entries
            .entry(uri.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        if mutex.try_lock().is_err() {
            log::debug!("lock for {uri} contended, waiting");
        }
        let guard = mutex.lock_owned().await;
        log::debug!("lock for {uri} acquired");
        Lease { _guard: guard }
    }

    /// Removes the entry for `uri` if nothing else currently holds a
    /// reference to its mutex. Safe to call opportunistically; a concurrent
    /// acquirer simply recreates the entry.
    pub fn reap(&self, uri: &str) {
        self.entries.remove_if(uri, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
