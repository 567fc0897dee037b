//! The in-memory store: a bounded LRU keyed by (URI, variant fingerprint).
//! Built on the `lru` crate rather than an async/TinyLFU cache so eviction
//! is a synchronous, single-victim event a composing store can hook to
//! release resources it owns (see [`super::EvictionListener`]).

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;

use super::{BufferingRewriter, EvictionListener, PayloadRewriter, Storage, StorageKey};
use crate::error::Result;
use crate::item::CacheItem;
use crate::request::Request;
use crate::response::Response;
use crate::variant;

const DEFAULT_CAPACITY: usize = 1024;

/// A bounded, readers-writer-locked LRU from [`StorageKey`] to [`CacheItem`].
pub struct MemoryStore {
    inner: RwLock<LruCache<StorageKey, CacheItem>>,
    rewriter: Arc<dyn PayloadRewriter>,
    listener: Option<Arc<dyn EvictionListener>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap())
    }
}

impl MemoryStore {
    /// Creates a bounded store with the default in-memory payload rewriter
    /// and no eviction listener.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_rewriter(capacity, Arc::new(BufferingRewriter))
    }

    /// Creates a bounded store with a custom payload rewriter (used by
    /// [`super::persistent::PersistentStore`] to spill to disk).
    pub fn with_rewriter(
        capacity: NonZeroUsize,
        rewriter: Arc<dyn PayloadRewriter>,
    ) -> Self {
        Self {
            inner: RwLock::new(LruCache::new(capacity)),
            rewriter,
            listener: None,
        }
    }

    /// Registers the eviction listener, replacing any previous one.
    pub fn set_listener(&mut self, listener: Arc<dyn EvictionListener>) {
        self.listener = Some(listener);
    }

    /// Finds the key of the stored item (if any) whose variant fingerprint
    /// matches `request`, scanning every item under the same URI. See
    /// `storage::Storage::get`'s doc comment for why this needs the item's
    /// own `Vary` rather than a single direct lookup.
    fn matching_key(
        cache: &LruCache<StorageKey, CacheItem>,
        uri: &str,
        request: &Request,
    ) -> Option<StorageKey> {
        for (key, item) in cache.iter() {
            if key.uri != uri {
                continue;
            }
            let candidate =
                variant::fingerprint(item.response.headers.vary(), &request.headers);
            if candidate.as_deref() == Some(key.fingerprint.as_str()) {
                return Some(key.clone());
            }
        }
        None
    }

    async fn notify_evicted(&self, evicted: Vec<(StorageKey, CacheItem)>) {
        if let Some(listener) = &self.listener {
            for (key, item) in &evicted {
                listener.on_evict(key, item).await;
            }
        }
    }

    /// Inserts an already-rewritten item directly, bypassing the payload
    /// rewriter. Used by [`super::persistent::PersistentStore`] to repopulate
    /// from a snapshot, where the payload is already spilled to its file.
    pub(super) async fn insert_raw(&self, key: StorageKey, item: CacheItem) {
        let evicted = {
            let mut guard = self.inner.write().await;
            guard.push(key, item).into_iter().collect::<Vec<_>>()
        };
        self.notify_evicted(evicted).await;
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn get(&self, request: &Request) -> Result<Option<CacheItem>> {
        let uri = request.normalized_uri();
        let key = {
            let guard = self.inner.read().await;
            Self::matching_key(&guard, &uri, request)
        };
        let Some(key) = key else { return Ok(None) };
        let mut guard = self.inner.write().await;
        Ok(guard.get(&key).cloned())
    }

    async fn insert(
        &self,
        request: &Request,
        response: Response,
    ) -> Result<Response> {
        let uri = request.normalized_uri();
        let Some(fingerprint) =
            variant::fingerprint(response.headers.vary(), &request.headers)
        else {
            // `Vary: *`: not cacheable; nothing to store.
            return Ok(response);
        };
        let key = StorageKey::new(uri, fingerprint);

        let rewritten =
            self.rewriter.rewrite(&key, response.payload.as_ref()).await?;
        let mut stored = response;
        stored.payload = rewritten;

        let item = CacheItem::new(stored.clone());
        let evicted = {
            let mut guard = self.inner.write().await;
            guard.push(key, item).into_iter().collect::<Vec<_>>()
        };
        self.notify_evicted(evicted).await;
        Ok(stored)
    }

    async fn update(
        &self,
        request: &Request,
        response: Response,
    ) -> Result<Response> {
        let uri = request.normalized_uri();
        let found_key = {
            let guard = self.inner.read().await;
            Self::matching_key(&guard, &uri, request)
        };
        let Some(key) = found_key else {
            return self.insert(request, response).await;
        };

        let mut guard = self.inner.write().await;
        let Some(existing) = guard.get(&key).cloned() else {
            drop(guard);
            return self.insert(request, response).await;
        };
        let preserved_payload = existing.response.payload;
        let mut updated = response;
        updated.payload = preserved_payload.clone();
        guard.put(key, CacheItem::new(updated.clone()));
        Ok(updated)
    }

    async fn invalidate(&self, uri: &str) -> Result<()> {
        let evicted = {
            let mut guard = self.inner.write().await;
            let keys: Vec<StorageKey> = guard
                .iter()
                .filter(|(k, _)| k.uri == uri)
                .map(|(k, _)| k.clone())
                .collect();
            keys.into_iter()
                .filter_map(|k| guard.pop(&k).map(|item| (k, item)))
                .collect::<Vec<_>>()
        };
        self.notify_evicted(evicted).await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let evicted = {
            let mut guard = self.inner.write().await;
            let all: Vec<(StorageKey, CacheItem)> =
                guard.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            guard.clear();
            all
        };
        self.notify_evicted(evicted).await;
        Ok(())
    }

    async fn size(&self) -> usize {
        self.inner.read().await.len()
    }

    async fn entries(&self) -> Vec<(StorageKey, CacheItem)> {
        self.inner
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
