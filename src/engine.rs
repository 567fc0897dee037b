//! The cache engine: ties storage, a resolver, per-URI locking, and the
//! freshness/cache-control calculators together into a single `resolve`
//! entry point.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::error::{CacheError, Result};
use crate::freshness::{self, Freshness};
use crate::helper::{
    self, DEFAULT_DATE_TOLERANCE,
};
use crate::locks::LockRegistry;
use crate::request::Request;
use crate::resolver::Resolver;
use crate::response::Response;
use crate::stats::Statistics;
use crate::storage::Storage;

/// The "cache" agent: every request handed to [`CacheEngine::resolve`] and
/// [`CacheEngine::resolve_with`] leaves having been classified, served from
/// storage, revalidated, or forwarded, with storage kept consistent.
pub struct CacheEngine<R: Resolver> {
    storage: Arc<dyn Storage>,
    resolver: R,
    locks: LockRegistry,
    stats: Statistics,
    date_tolerance: Duration,
}

impl<R: Resolver> CacheEngine<R> {
    /// Builds an engine over `storage`, forwarding misses to `resolver`.
    pub fn new(storage: Arc<dyn Storage>, resolver: R) -> Self {
        Self {
            storage,
            resolver,
            locks: LockRegistry::new(),
            stats: Statistics::new(),
            date_tolerance: DEFAULT_DATE_TOLERANCE,
        }
    }

    /// Hit/miss counters accumulated so far.
    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    #[cfg(test)]
    fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Resolves `request` the ordinary way: serve from cache when fresh
    /// (or acceptably stale), revalidate otherwise, populate storage with
    /// whatever the origin returns.
    pub async fn resolve(&self, request: &Request) -> Result<Response> {
        self.resolve_with(request, false).await
    }

    /// Like [`Self::resolve`], but with `force_refresh` set, skips serving
    /// directly from storage (a manual cache-busting refresh) while still
    /// updating storage with the result.
    pub async fn resolve_with(&self, request: &Request, force_refresh: bool) -> Result<Response> {
        let uri = request.normalized_uri();

        if !request.is_safe_method() {
            log::debug!("{uri}: unsafe method {}, invalidating then forwarding", request.method);
            return match self.storage.invalidate(&uri).await {
                Ok(()) => self.forward(request).await,
                Err(err) => Err(err),
            };
        }

        if !helper::request_is_cacheable(request) {
            log::debug!("{uri}: request is not cacheable, forwarding directly");
            return self.forward(request).await;
        }

        log::debug!("{uri}: cacheable request, acquiring lock");
        let lease = self.locks.acquire(&uri).await;
        let outcome = self.resolve_locked(request, &uri, force_refresh).await;
        drop(lease);
        self.locks.reap(&uri);
        outcome
    }

    async fn resolve_locked(
        &self,
        request: &Request,
        uri: &str,
        force_refresh: bool,
    ) -> Result<Response> {
        let now = SystemTime::now();
        let cached = if force_refresh { None } else { self.storage.get(request).await? };

        let Some(item) = cached else {
            log::debug!("{uri}: cache miss");
            self.stats.record_miss();
            let response = self.forward(request).await?;
            return self.store_fresh_response(request, uri, response).await;
        };

        log::debug!("{uri}: cache hit");
        self.stats.record_hit();

        if helper::request_demands_unconditional(request) {
            log::debug!("{uri}: request demands unconditional resolution, forwarding");
            let response = self.forward(request).await?;
            return self.store_fresh_response(request, uri, response).await;
        }

        let response_cc = item.response.cache_control();
        if item.freshness(now) == Freshness::Fresh {
            let mut served = item.response.clone();
            helper::rewrite_for_return(
                &mut served,
                item.response_time,
                now,
                self.date_tolerance,
            );
            return Ok(served);
        }

        if freshness::may_serve_stale(
            &request.cache_control(),
            &response_cc,
            &item.response.headers,
            &response_cc,
            item.response_time,
            now,
        ) {
            let mut served = item.response.clone();
            helper::rewrite_for_return(
                &mut served,
                item.response_time,
                now,
                self.date_tolerance,
            );
            served.add_warning(110, "-", "Response is stale");
            return Ok(served);
        }

        log::debug!("{uri}: stale, revalidating");
        let conditional = helper::prepare_conditional_request(request, &item.response);
        match self.forward(&conditional).await {
            Ok(fresh) if fresh.status == http::StatusCode::NOT_MODIFIED => {
                let mut updated = item.response.clone();
                helper::merge_revalidation_headers(&mut updated, &fresh);
                let stored = self.storage.update(request, updated).await?;
                Ok(stored)
            }
            Ok(fresh) => {
                let to_store = if request.method == http::Method::HEAD {
                    let mut merged = item.response.clone();
                    helper::merge_revalidation_headers(&mut merged, &fresh);
                    merged
                } else {
                    fresh
                };
                self.store_fresh_response(request, uri, to_store).await
            }
            Err(err) => {
                let mut stale = item.response.clone();
                stale.add_warning(111, "-", "Revalidation failed");
                helper::rewrite_for_return(
                    &mut stale,
                    item.response_time,
                    now,
                    self.date_tolerance,
                );
                log::warn!("revalidation of {uri} failed, serving stale: {err}");
                Ok(stale)
            }
        }
    }

    /// Stores a freshly obtained response if it's cacheable, preserving the
    /// existing payload for `HEAD` (whose response never carries one),
    /// discarding any stale entry it replaces when it turns out not to be
    /// cacheable.
    async fn store_fresh_response(
        &self,
        request: &Request,
        uri: &str,
        response: Response,
    ) -> Result<Response> {
        if !helper::response_is_cacheable(request, &response) {
            self.storage.invalidate(uri).await?;
            return Ok(response);
        }
        if request.method == http::Method::HEAD {
            self.storage.update(request, response).await
        } else {
            self.storage.insert(request, response).await
        }
    }

    async fn forward(&self, request: &Request) -> Result<Response> {
        log::debug!("dispatching {} {} to resolver", request.method, request.uri);
        self.resolver
            .resolve(request)
            .await
            .map_err(|err| CacheError::Upstream(Box::new(err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::Headers;
    use crate::payload::Payload;
    use crate::resolver::test_support::ScriptedResolver;
    use crate::storage::memory::MemoryStore;
    use http::{Method, StatusCode, Uri};
    use std::num::NonZeroUsize;

    fn get(uri: &str) -> Request {
        Request { uri: uri.parse::<Uri>().unwrap(), method: Method::GET, headers: Headers::new(), payload: None }
    }

    fn ok_with_max_age(secs: u64, body: &[u8]) -> Response {
        let mut headers = Headers::new();
        headers.insert("date", httpdate::fmt_http_date(SystemTime::now()));
        headers.insert("cache-control", format!("max-age={secs}"));
        Response {
            status: StatusCode::OK,
            headers,
            payload: Some(Payload::from_bytes(body.to_vec(), None)),
        }
    }

    fn engine_with(
        responses: Vec<std::result::Result<Response, crate::resolver::test_support::StubError>>,
    ) -> (CacheEngine<ScriptedResolver>, Arc<crate::storage::memory::MemoryStore>) {
        let storage = Arc::new(MemoryStore::new(NonZeroUsize::new(16).unwrap()));
        let resolver = ScriptedResolver::new(responses);
        (CacheEngine::new(storage.clone(), resolver), storage)
    }

    #[tokio::test]
    async fn miss_then_fresh_hit_calls_resolver_once() {
        let (engine, _) = engine_with(vec![Ok(ok_with_max_age(60, b"A"))]);
        let request = get("http://example.com/r");

        let first = engine.resolve(&request).await.unwrap();
        assert_eq!(first.payload.unwrap().bytes().await.unwrap(), b"A");
        assert_eq!(engine.stats().misses(), 1);

        let second = engine.resolve(&request).await.unwrap();
        assert_eq!(second.payload.unwrap().bytes().await.unwrap(), b"A");
        assert_eq!(engine.stats().hits(), 1);
    }

    #[tokio::test]
    async fn revalidation_304_preserves_cached_payload() {
        let mut stale = ok_with_max_age(0, b"cached-body");
        stale.headers.insert("etag", "\"v1\"");
        let not_modified = Response { status: StatusCode::NOT_MODIFIED, headers: Headers::new(), payload: None };

        let (engine, _) = engine_with(vec![Ok(stale), Ok(not_modified)]);
        let request = get("http://example.com/r");

        let first = engine.resolve(&request).await.unwrap();
        assert_eq!(first.payload.unwrap().bytes().await.unwrap(), b"cached-body");
        assert_eq!(engine.stats().misses(), 1);
        assert_eq!(engine.stats().hits(), 0);

        let second = engine.resolve(&request).await.unwrap();
        assert_eq!(second.payload.unwrap().bytes().await.unwrap(), b"cached-body");
        assert_eq!(engine.stats().misses(), 1);
        assert_eq!(engine.stats().hits(), 1);
    }

    #[tokio::test]
    async fn head_revalidation_keeps_cached_payload_and_validators() {
        let mut initial = ok_with_max_age(0, b"body");
        initial.headers.insert("etag", "\"v1\"");
        let mut refreshed = ok_with_max_age(60, b"");
        refreshed.headers.insert("etag", "\"ignored\"");
        refreshed.payload = None;

        let (engine, _) = engine_with(vec![Ok(initial), Ok(refreshed)]);
        let request = Request { method: Method::HEAD, ..get("http://example.com/r") };

        let first = engine.resolve(&request).await.unwrap();
        assert_eq!(first.payload.unwrap().bytes().await.unwrap(), b"body");

        let second = engine.resolve(&request).await.unwrap();
        assert_eq!(second.headers.get("etag"), Some("\"v1\""));
        assert_eq!(second.payload.unwrap().bytes().await.unwrap(), b"body");
    }

    #[tokio::test]
    async fn request_no_cache_forwards_unconditionally_without_validators() {
        let mut cached = ok_with_max_age(60, b"A");
        cached.headers.insert("etag", "\"v1\"");
        let refreshed = ok_with_max_age(60, b"B");

        let (engine, _) = engine_with(vec![Ok(cached), Ok(refreshed)]);
        let request = get("http://example.com/r");
        engine.resolve(&request).await.unwrap();

        let mut no_cache_req = get("http://example.com/r");
        no_cache_req.headers.insert("cache-control", "no-cache");
        let second = engine.resolve(&no_cache_req).await.unwrap();

        assert_eq!(second.payload.unwrap().bytes().await.unwrap(), b"B");
        let forwarded = engine.resolver().last_request().unwrap();
        assert!(forwarded.headers.get("if-none-match").is_none());
        assert!(forwarded.headers.get("if-modified-since").is_none());
        assert_eq!(engine.stats().hits(), 1);
        assert_eq!(engine.stats().misses(), 1);
    }

    #[tokio::test]
    async fn network_failure_serves_stale_with_warning() {
        let stale = ok_with_max_age(0, b"cached-body");
        let (engine, _) = engine_with(vec![Ok(stale)]);
        let request = get("http://example.com/r");
        engine.resolve(&request).await.unwrap();

        // second call's revalidation attempt gets the stub's default error
        let second = engine.resolve(&request).await.unwrap();
        assert_eq!(second.payload.unwrap().bytes().await.unwrap(), b"cached-body");
        assert!(second.headers.get("warning").unwrap().starts_with("111"));
    }

    #[tokio::test]
    async fn unsafe_method_invalidates_then_forwards() {
        let (engine, storage) = engine_with(vec![
            Ok(ok_with_max_age(60, b"A")),
            Ok(Response { status: StatusCode::NO_CONTENT, headers: Headers::new(), payload: None }),
        ]);
        let get_req = get("http://example.com/r");
        engine.resolve(&get_req).await.unwrap();
        assert_eq!(storage.size().await, 1);

        let put_req = Request { method: Method::PUT, ..get("http://example.com/r") };
        engine.resolve(&put_req).await.unwrap();
        assert_eq!(storage.size().await, 0);
    }

    #[tokio::test]
    async fn uncacheable_fresh_response_invalidates_existing_entry() {
        let mut private_resp = ok_with_max_age(60, b"secret");
        private_resp.headers.insert("cache-control", "private, max-age=60");
        let (engine, storage) = engine_with(vec![Ok(ok_with_max_age(0, b"A")), Ok(private_resp)]);
        let request = get("http://example.com/r");
        engine.resolve(&request).await.unwrap();
        assert_eq!(storage.size().await, 1);

        engine.resolve(&request).await.unwrap();
        assert_eq!(storage.size().await, 0);
    }
}
