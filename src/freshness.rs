//! Age and freshness-lifetime arithmetic per RFC 7234 §4.2, as free
//! functions over this crate's own `Headers`/`CacheControl` types.

use std::time::{Duration, SystemTime};

use crate::cache_control::CacheControl;
use crate::headers::Headers;

fn parse_http_date(value: &str) -> Option<SystemTime> {
    httpdate::parse_http_date(value).ok()
}

/// Whether a cached item is still usable without contacting the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// `current_age < freshness_lifetime` and no directive forces staleness.
    Fresh,
    /// Past its freshness lifetime, or forced stale by `no-cache`.
    Stale,
}

/// *apparentAge* = max(0, responseTime − Date).
fn apparent_age(headers: &Headers, response_time: SystemTime) -> Duration {
    match headers.date().and_then(parse_http_date) {
        Some(date) => {
            response_time.duration_since(date).unwrap_or(Duration::ZERO)
        }
        None => Duration::ZERO,
    }
}

/// The `Age` header's value, interpreted as seconds (0 if absent or invalid).
fn age_header_value(headers: &Headers) -> Duration {
    headers
        .age()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::ZERO)
}

/// *currentAge* = apparentAge + (now − responseTime) + Age header.
pub fn current_age(
    headers: &Headers,
    response_time: SystemTime,
    now: SystemTime,
) -> Duration {
    let resident_time =
        now.duration_since(response_time).unwrap_or(Duration::ZERO);
    apparent_age(headers, response_time) + resident_time + age_header_value(headers)
}

/// *freshnessLifetime* = s-maxage, else max-age, else (Expires − Date), else 0.
pub fn freshness_lifetime(
    headers: &Headers,
    cache_control: &CacheControl,
) -> Duration {
    if let Some(s_maxage) = cache_control.s_maxage() {
        return s_maxage;
    }
    if let Some(max_age) = cache_control.max_age() {
        return max_age;
    }
    if let (Some(expires), Some(date)) = (
        headers.expires().and_then(parse_http_date),
        headers.date().and_then(parse_http_date),
    ) {
        return expires.duration_since(date).unwrap_or(Duration::ZERO);
    }
    Duration::ZERO
}

/// Classifies a cached response: fresh iff `current_age < freshness_lifetime`
/// and `Cache-Control: no-cache` is absent (which forces stale treatment
/// regardless of lifetime).
pub fn classify(
    headers: &Headers,
    cache_control: &CacheControl,
    response_time: SystemTime,
    now: SystemTime,
) -> Freshness {
    if cache_control.no_cache() {
        return Freshness::Stale;
    }
    let age = current_age(headers, response_time, now);
    let lifetime = freshness_lifetime(headers, cache_control);
    if age < lifetime {
        Freshness::Fresh
    } else {
        Freshness::Stale
    }
}

/// Whether a stale response may still be served: the request or cached
/// response's `max-stale` directive permits it, bounded by the optional
/// delta, and `must-revalidate`/`proxy-revalidate` is absent.
pub fn may_serve_stale(
    request_cc: &CacheControl,
    response_cc: &CacheControl,
    headers: &Headers,
    cache_control: &CacheControl,
    response_time: SystemTime,
    now: SystemTime,
) -> bool {
    if response_cc.must_revalidate() || response_cc.proxy_revalidate() {
        return false;
    }
    let max_stale = match request_cc.max_stale() {
        Some(v) => Some(v),
        None => response_cc.max_stale(),
    };
    let Some(allowance) = max_stale else {
        return false;
    };
    let age = current_age(headers, response_time, now);
    let lifetime = freshness_lifetime(headers, cache_control);
    let staleness = age.saturating_sub(lifetime);
    match allowance {
        None => true,
        Some(delta) => staleness <= delta,
    }
}
