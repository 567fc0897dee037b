//! Request/response rewriting, conditional-request construction, and
//! cacheability predicates — the glue the engine calls into, kept separate
//! from `engine.rs` so each rule is independently testable.

use std::time::{Duration, SystemTime};

use crate::headers::names;
use crate::request::Request;
use crate::response::Response;

/// Default tolerance for rewriting a cached response's `Date` header before
/// returning it.
pub const DEFAULT_DATE_TOLERANCE: Duration = Duration::from_secs(60);

/// Headers from a 304 response a revalidation merge must not let clobber
/// the validators already recorded for the cached body.
const NON_UPDATABLE_ON_REVALIDATION: &[&str] = &[
    names::CONTENT_LENGTH,
    names::CONTENT_MD5,
    names::ETAG,
    names::LAST_MODIFIED,
];

/// Request cacheability: cacheable method and no `no-store`.
pub fn request_is_cacheable(request: &Request) -> bool {
    request.is_cacheable_method() && !request.cache_control().no_store()
}

/// Response cacheability: whitelisted status, no `no-store`/`private`, and
/// not `Vary: *`.
pub fn response_is_cacheable(request: &Request, response: &Response) -> bool {
    if !request_is_cacheable(request) {
        return false;
    }
    if response.has_vary_star() {
        return false;
    }
    let cc = response.cache_control();
    response.has_cacheable_status() && !cc.no_store() && !cc.private()
}

/// `true` for requests whose own `Cache-Control: no-cache` demands an
/// unconditional resolve regardless of what storage holds.
pub fn request_demands_unconditional(request: &Request) -> bool {
    request.cache_control().no_cache()
}

/// Builds the conditional request used to revalidate a stale cached
/// response. If the cached payload is no longer available, conditionals
/// are omitted so the origin is forced to resend a body.
pub fn prepare_conditional_request(
    original: &Request,
    cached: &Response,
) -> Request {
    let mut request = original.clone();

    let payload_missing = cached
        .payload
        .as_ref()
        .map(|p| !p.is_available())
        .unwrap_or(false);

    if payload_missing {
        request.headers.remove(names::IF_NONE_MATCH);
        request.headers.remove(names::IF_MODIFIED_SINCE);
        return request;
    }

    if let Some(etag) = cached.headers.etag() {
        request.headers.insert(names::IF_NONE_MATCH, etag.to_string());
    }
    if let Some(last_modified) = cached.headers.last_modified() {
        request
            .headers
            .insert(names::IF_MODIFIED_SINCE, last_modified.to_string());
    }
    request
}

/// Merges a 304 response's headers onto the cached response: the 304's
/// `Content-Length`/`Content-MD5`/`ETag`/`Last-Modified` do not override the
/// cached validators, while every other header (notably `Date`) does.
pub fn merge_revalidation_headers(cached: &mut Response, fresh: &Response) {
    let mut incoming = fresh.headers.clone();
    for name in NON_UPDATABLE_ON_REVALIDATION {
        incoming.remove(name);
    }
    cached.headers.merge_replace(&incoming);
}

/// Rewrites a cached response's `Age`/`Date` headers before handing it back
/// to a caller.
pub fn rewrite_for_return(
    response: &mut Response,
    response_time: SystemTime,
    now: SystemTime,
    date_tolerance: Duration,
) {
    let age = crate::freshness::current_age(&response.headers, response_time, now);
    response.headers.insert(names::AGE, age.as_secs().to_string());

    let needs_new_date = match response.headers.date() {
        Some(value) => match httpdate::parse_http_date(value) {
            Ok(date) => {
                now.duration_since(date).unwrap_or(Duration::ZERO)
                    > date_tolerance
            }
            Err(_) => true,
        },
        None => true,
    };
    if needs_new_date {
        response.headers.insert(names::DATE, httpdate::fmt_http_date(now));
    }
}
