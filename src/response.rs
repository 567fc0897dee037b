//! The response model: status, headers, and an optional payload.

use http::StatusCode;

use crate::cache_control::CacheControl;
use crate::headers::{names, Headers};
use crate::payload::Payload;

/// A caller-scoped HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    /// The status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: Headers,
    /// The response body, if any.
    pub payload: Option<Payload>,
}

/// Status codes this cache will store. 206 is excluded because
/// partial-content support is out of scope.
const CACHEABLE_STATUSES: &[u16] = &[200, 203, 204, 300, 301, 404, 410];

impl Response {
    /// Parses this response's `Cache-Control` header.
    pub fn cache_control(&self) -> CacheControl {
        CacheControl::parse(&self.headers)
    }

    /// `true` iff the status is in the cacheable-by-default whitelist.
    pub fn has_cacheable_status(&self) -> bool {
        CACHEABLE_STATUSES.contains(&self.status.as_u16())
    }

    /// `true` iff `self.headers` carries `Vary: *`.
    pub fn has_vary_star(&self) -> bool {
        self.headers
            .vary()
            .map(|v| v.split(',').any(|n| n.trim() == "*"))
            .unwrap_or(false)
    }

    /// Appends a `Warning` header per RFC 2616 §14.46.
    pub fn add_warning(&mut self, code: u16, agent: &str, text: &str) {
        let escaped = text.replace('"', "'").replace(['\n', '\r'], " ");
        self.headers.append(
            names::WARNING,
            format!(
                "{code} {agent} \"{escaped}\" \"{}\"",
                httpdate::fmt_http_date(std::time::SystemTime::now())
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16) -> Response {
        Response {
            status: StatusCode::from_u16(status).unwrap(),
            headers: Headers::new(),
            payload: None,
        }
    }

    #[test]
    fn whitelisted_statuses_are_cacheable() {
        for status in [200, 203, 204, 300, 301, 404, 410] {
            assert!(response(status).has_cacheable_status());
        }
    }

    #[test]
    fn non_whitelisted_statuses_are_not_cacheable() {
        for status in [206, 401, 500, 502] {
            assert!(!response(status).has_cacheable_status());
        }
    }

    #[test]
    fn vary_star_detected() {
        let mut r = response(200);
        r.headers.insert("vary", "*");
        assert!(r.has_vary_star());
    }

    #[test]
    fn add_warning_appends_without_clobbering() {
        let mut r = response(200);
        r.add_warning(110, "cache", "Response is stale");
        assert!(r.headers.get("warning").unwrap().starts_with("110 cache"));
    }
}
