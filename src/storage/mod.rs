//! The storage contract and its two concrete shapes.

pub mod key;
pub mod memory;
pub mod persistent;

pub use key::StorageKey;

use async_trait::async_trait;

use crate::error::Result;
use crate::item::CacheItem;
use crate::payload::Payload;
use crate::request::Request;
use crate::response::Response;

/// Abstract cache storage, implemented by [`memory::MemoryStore`] and
/// [`persistent::PersistentStore`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns the item whose variant fingerprint (derived from its own
    /// cached `Vary`) matches `request`, if any.
    async fn get(&self, request: &Request) -> Result<Option<CacheItem>>;

    /// Stores `response` under the variant key derived from its `Vary`
    /// header, evicting per capacity policy. Returns a response whose
    /// payload has been rewritten to a handle owned by storage.
    async fn insert(
        &self,
        request: &Request,
        response: Response,
    ) -> Result<Response>;

    /// Replaces the headers of the existing item for `request`'s variant,
    /// preserving its payload. Used for 304/HEAD-refresh merges.
    async fn update(
        &self,
        request: &Request,
        response: Response,
    ) -> Result<Response>;

    /// Removes every variant stored under `uri`.
    async fn invalidate(&self, uri: &str) -> Result<()>;

    /// Removes everything. Persistent implementations also delete on-disk
    /// state.
    async fn clear(&self) -> Result<()>;

    /// The number of live items.
    async fn size(&self) -> usize;

    /// A restartable snapshot of every `(key, item)` pair. Mutating storage
    /// concurrently with consuming this snapshot is safe (it is a copy) but
    /// may not reflect those mutations.
    async fn entries(&self) -> Vec<(StorageKey, CacheItem)>;
}

/// Notified when the in-memory store evicts or replaces an entry, so a
/// composing store (the persistent store) can release resources it owns —
/// e.g. delete the backing payload file.
#[async_trait]
pub trait EvictionListener: Send + Sync {
    /// Called with the key and item that left the cache.
    async fn on_evict(&self, key: &StorageKey, item: &CacheItem);
}

/// The payload-rewriter hook: consumes the incoming payload and produces
/// the handle storage will hold onto, or `None` for a payload-less cache
/// item.
#[async_trait]
pub trait PayloadRewriter: Send + Sync {
    /// Rewrites `payload` (if any) into storage's own representation.
    async fn rewrite(
        &self,
        key: &StorageKey,
        payload: Option<&Payload>,
    ) -> Result<Option<Payload>>;
}

/// The default in-memory rewriter: buffers the payload into an owned byte
/// vector so it outlives the original request/response values.
#[derive(Debug, Default)]
pub struct BufferingRewriter;

#[async_trait]
impl PayloadRewriter for BufferingRewriter {
    async fn rewrite(
        &self,
        _key: &StorageKey,
        payload: Option<&Payload>,
    ) -> Result<Option<Payload>> {
        match payload {
            None => Ok(None),
            Some(p) => {
                let bytes = p.bytes().await?;
                Ok(Some(Payload::from_bytes(bytes, p.media_type.clone())))
            }
        }
    }
}
