//! The persistent store: spills payload bytes to a hash-sharded file tree
//! and periodically serialises its metadata map. Composed from a
//! [`MemoryStore`] plus a file-spill rewriter and eviction listener rather
//! than reimplementing the LRU index.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;

use super::key::StorageKey;
use super::memory::MemoryStore;
use super::{EvictionListener, PayloadRewriter, Storage};
use crate::error::{CacheError, Result};
use crate::headers::Headers;
use crate::item::CacheItem;
use crate::payload::Payload;
use crate::request::Request;
use crate::response::Response;

const SNAPSHOT_MAGIC: u32 = 0x4854_4350; // "HTCP"
const SNAPSHOT_VERSION: u16 = 1;
const DEFAULT_SNAPSHOT_NAME: &str = "snapshot.postcard";

/// When the persistent store rewrites its metadata snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotPolicy {
    /// Snapshot after every `N` mutations, if set.
    pub every_n: Option<u64>,
    /// Snapshot once at least this much time has elapsed since the last
    /// snapshot, if set.
    pub every_interval: Option<Duration>,
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self { every_n: Some(100), every_interval: Some(Duration::from_secs(10)) }
    }
}

impl SnapshotPolicy {
    /// Snapshots are never written automatically (only at `flush()`).
    pub fn never() -> Self {
        Self { every_n: None, every_interval: None }
    }

    fn should_snapshot(&self, mutations: u64, since_last: Duration) -> bool {
        let by_count = self.every_n.is_some_and(|n| mutations >= n);
        let by_interval = self.every_interval.is_some_and(|d| since_last >= d);
        by_count || by_interval
    }
}

fn shard_path(root: &Path, key: &StorageKey) -> PathBuf {
    let digest = blake3::hash(format!("{}\u{0}{}", key.uri, key.fingerprint).as_bytes());
    let hex = hex::encode(digest.as_bytes());
    root.join(&hex[0..2]).join(&hex[2..4]).join(&hex[4..])
}

fn to_unix_nanos(t: SystemTime) -> u128 {
    t.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_nanos()
}

fn from_unix_nanos(nanos: u128) -> SystemTime {
    UNIX_EPOCH + Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    key: StorageKey,
    status: u16,
    headers: Headers,
    media_type: Option<String>,
    has_payload: bool,
    response_time_unix_nanos: u128,
}

/// Writes the incoming payload to a file under `root`'s hash-sharded tree.
struct FileSpillRewriter {
    root: PathBuf,
}

#[async_trait]
impl PayloadRewriter for FileSpillRewriter {
    async fn rewrite(
        &self,
        key: &StorageKey,
        payload: Option<&Payload>,
    ) -> Result<Option<Payload>> {
        let Some(payload) = payload else { return Ok(None) };
        let path = shard_path(&self.root, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = payload.bytes().await?;
        tokio::fs::write(&path, &bytes).await?;
        Ok(Some(Payload::from_file(path, payload.media_type.clone())))
    }
}

/// Deletes a payload's backing file when its entry leaves the in-memory
/// index (eviction, replacement, or invalidation).
struct FileSpillListener;

#[async_trait]
impl EvictionListener for FileSpillListener {
    async fn on_evict(&self, _key: &StorageKey, item: &CacheItem) {
        if let Some(path) = item.response.payload.as_ref().and_then(Payload::file_path) {
            if let Err(err) = tokio::fs::remove_file(path).await {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("failed to delete cache payload file {path:?}: {err}");
                }
            }
        }
    }
}

/// Extends [`MemoryStore`] with payload spill to disk and a periodically
/// refreshed metadata snapshot.
pub struct PersistentStore {
    root: PathBuf,
    memory: MemoryStore,
    policy: SnapshotPolicy,
    snapshot_name: String,
    mutations_since_snapshot: AtomicU64,
    last_snapshot: AsyncMutex<Instant>,
}

impl std::fmt::Debug for PersistentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStore").field("root", &self.root).finish_non_exhaustive()
    }
}

impl PersistentStore {
    /// Opens (or creates) a persistent store rooted at `root`, loading any
    /// existing snapshot. Snapshot corruption is recovered locally: the
    /// file is discarded and the store starts empty.
    pub async fn open(root: PathBuf, capacity: NonZeroUsize) -> Result<Self> {
        Self::open_with_policy(root, capacity, SnapshotPolicy::default()).await
    }

    /// Like [`Self::open`], with an explicit snapshot policy.
    pub async fn open_with_policy(
        root: PathBuf,
        capacity: NonZeroUsize,
        policy: SnapshotPolicy,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(&root).await?;

        let mut memory = MemoryStore::with_rewriter(
            capacity,
            std::sync::Arc::new(FileSpillRewriter { root: root.clone() }),
        );
        memory.set_listener(std::sync::Arc::new(FileSpillListener));

        let store = Self {
            root,
            memory,
            policy,
            snapshot_name: DEFAULT_SNAPSHOT_NAME.to_string(),
            mutations_since_snapshot: AtomicU64::new(0),
            last_snapshot: AsyncMutex::new(Instant::now()),
        };
        store.load_snapshot().await;
        Ok(store)
    }

    fn snapshot_path(&self) -> PathBuf {
        self.root.join(&self.snapshot_name)
    }

    async fn load_snapshot(&self) {
        let path = self.snapshot_path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(_) => return,
        };
        let entries: Vec<SnapshotEntry> = match decode_snapshot(&bytes) {
            Ok(entries) => entries,
            Err(source) => {
                let err = CacheError::CorruptStore { path: path.clone(), source };
                log::warn!("{err}");
                let _ = tokio::fs::remove_file(&path).await;
                return;
            }
        };

        for entry in entries {
            let file_path = shard_path(&self.root, &entry.key);
            let payload = if entry.has_payload && file_path.exists() {
                Some(Payload::from_file(file_path, entry.media_type))
            } else if entry.has_payload {
                // Orphaned entry: backing file is gone. Pruned on load.
                continue;
            } else {
                None
            };
            let response = Response {
                status: http::StatusCode::from_u16(entry.status)
                    .unwrap_or(http::StatusCode::OK),
                headers: entry.headers,
                payload,
            };
            let item = CacheItem {
                response,
                cached_at: Instant::now(),
                response_time: from_unix_nanos(entry.response_time_unix_nanos),
            };
            self.memory.insert_raw(entry.key, item).await;
        }
    }

    /// Writes a fresh snapshot of every currently-stored item, unconditionally.
    /// Called on the policy's triggers and from [`Self::flush`]. Errors are
    /// swallowed (logged, not returned): snapshots are best-effort and should
    /// never fail a caller's cache operation.
    async fn write_snapshot(&self) {
        let entries: Vec<SnapshotEntry> = self
            .memory
            .entries()
            .await
            .into_iter()
            .map(|(key, item)| SnapshotEntry {
                key,
                status: item.response.status.as_u16(),
                headers: item.response.headers.clone(),
                media_type: item
                    .response
                    .payload
                    .as_ref()
                    .and_then(|p| p.media_type.clone()),
                has_payload: item.response.payload.is_some(),
                response_time_unix_nanos: to_unix_nanos(item.response_time),
            })
            .collect();

        let encoded = match encode_snapshot(&entries) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("failed to encode cache snapshot: {err}");
                return;
            }
        };

        let tmp_path = self.snapshot_path().with_extension("tmp");
        if let Err(err) = tokio::fs::write(&tmp_path, &encoded).await {
            log::warn!("failed to write cache snapshot: {err}");
            return;
        }
        if let Err(err) = tokio::fs::rename(&tmp_path, self.snapshot_path()).await {
            log::warn!("failed to finalize cache snapshot: {err}");
            return;
        }
        log::debug!("wrote cache snapshot with {} entries", entries.len());
    }

    async fn maybe_snapshot(&self) {
        let mutations = self.mutations_since_snapshot.load(Ordering::Relaxed);
        let since_last = {
            let guard = self.last_snapshot.lock().await;
            guard.elapsed()
        };
        if self.policy.should_snapshot(mutations, since_last) {
            self.write_snapshot().await;
            self.mutations_since_snapshot.store(0, Ordering::Relaxed);
            *self.last_snapshot.lock().await = Instant::now();
        }
    }

    fn record_mutation(&self) {
        self.mutations_since_snapshot.fetch_add(1, Ordering::Relaxed);
    }

    /// Best-effort snapshot write, meant to be called by the host program on
    /// clean shutdown rather than relying on a process-exit hook.
    pub async fn flush(&self) {
        self.write_snapshot().await;
        self.mutations_since_snapshot.store(0, Ordering::Relaxed);
        *self.last_snapshot.lock().await = Instant::now();
    }
}

fn encode_snapshot(entries: &[SnapshotEntry]) -> Result<Vec<u8>> {
    let body = postcard::to_allocvec(entries)?;
    let mut out = Vec::with_capacity(body.len() + 6);
    out.extend_from_slice(&SNAPSHOT_MAGIC.to_le_bytes());
    out.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

fn decode_snapshot(bytes: &[u8]) -> std::result::Result<Vec<SnapshotEntry>, postcard::Error> {
    if bytes.len() < 6 {
        return Err(postcard::Error::DeserializeUnexpectedEnd);
    }
    let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    let version = u16::from_le_bytes(bytes[4..6].try_into().unwrap());
    if magic != SNAPSHOT_MAGIC || version != SNAPSHOT_VERSION {
        return Err(postcard::Error::WontImplement);
    }
    postcard::from_bytes(&bytes[6..])
}

#[async_trait]
impl Storage for PersistentStore {
    async fn get(&self, request: &Request) -> Result<Option<CacheItem>> {
        self.memory.get(request).await
    }

    async fn insert(
        &self,
        request: &Request,
        response: Response,
    ) -> Result<Response> {
        let result = self.memory.insert(request, response).await?;
        self.record_mutation();
        self.maybe_snapshot().await;
        Ok(result)
    }

    async fn update(
        &self,
        request: &Request,
        response: Response,
    ) -> Result<Response> {
        let result = self.memory.update(request, response).await?;
        self.record_mutation();
        self.maybe_snapshot().await;
        Ok(result)
    }

    async fn invalidate(&self, uri: &str) -> Result<()> {
        self.memory.invalidate(uri).await?;
        self.record_mutation();
        self.maybe_snapshot().await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.memory.clear().await?;
        let _ = tokio::fs::remove_file(self.snapshot_path()).await;
        Ok(())
    }

    async fn size(&self) -> usize {
        self.memory.size().await
    }

    async fn entries(&self) -> Vec<(StorageKey, CacheItem)> {
        self.memory.entries().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::Headers;
    use http::{Method, StatusCode, Uri};

    fn get_request(uri: &str) -> Request {
        Request {
            uri: uri.parse::<Uri>().unwrap(),
            method: Method::GET,
            headers: Headers::new(),
            payload: None,
        }
    }

    fn response_with_body(body: &[u8]) -> Response {
        Response {
            status: StatusCode::OK,
            headers: Headers::new(),
            payload: Some(Payload::from_bytes(body.to_vec(), None)),
        }
    }

    #[tokio::test]
    async fn insert_spills_payload_to_hash_sharded_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::open(
            dir.path().to_path_buf(),
            NonZeroUsize::new(16).unwrap(),
        )
        .await
        .unwrap();

        let request = get_request("http://example.com/r");
        store.insert(&request, response_with_body(b"hello")).await.unwrap();

        let item = store.get(&request).await.unwrap().unwrap();
        let path = item.response.payload.as_ref().unwrap().file_path().unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(tokio::fs::read(path).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn invalidate_deletes_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::open(
            dir.path().to_path_buf(),
            NonZeroUsize::new(16).unwrap(),
        )
        .await
        .unwrap();
        let request = get_request("http://example.com/r");
        store.insert(&request, response_with_body(b"hello")).await.unwrap();
        let path = store
            .get(&request)
            .await
            .unwrap()
            .unwrap()
            .response
            .payload
            .unwrap()
            .file_path()
            .unwrap()
            .to_path_buf();
        assert!(path.exists());

        store.invalidate("http://example.com/r").await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn round_trip_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = PersistentStore::open_with_policy(
                dir.path().to_path_buf(),
                NonZeroUsize::new(16).unwrap(),
                SnapshotPolicy::never(),
            )
            .await
            .unwrap();
            for i in 0..5 {
                let uri = format!("http://example.com/{i}");
                store
                    .insert(&get_request(&uri), response_with_body(format!("body-{i}").as_bytes()))
                    .await
                    .unwrap();
            }
            store.flush().await;
        }

        let reopened = PersistentStore::open(
            dir.path().to_path_buf(),
            NonZeroUsize::new(16).unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(reopened.size().await, 5);
        for i in 0..5 {
            let uri = format!("http://example.com/{i}");
            let item = reopened.get(&get_request(&uri)).await.unwrap().unwrap();
            assert_eq!(
                item.response.payload.unwrap().bytes().await.unwrap(),
                format!("body-{i}").into_bytes()
            );
        }
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_discarded_and_store_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(DEFAULT_SNAPSHOT_NAME), b"not a snapshot")
            .await
            .unwrap();

        let store = PersistentStore::open(
            dir.path().to_path_buf(),
            NonZeroUsize::new(16).unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(store.size().await, 0);
    }

    #[tokio::test]
    async fn clear_removes_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentStore::open_with_policy(
            dir.path().to_path_buf(),
            NonZeroUsize::new(16).unwrap(),
            SnapshotPolicy::never(),
        )
        .await
        .unwrap();
        store
            .insert(&get_request("http://example.com/r"), response_with_body(b"x"))
            .await
            .unwrap();
        store.flush().await;
        assert!(store.snapshot_path().exists());

        store.clear().await.unwrap();
        assert!(!store.snapshot_path().exists());
        assert_eq!(store.size().await, 0);
    }
}
