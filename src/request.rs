//! The request model: URI, method, headers, and an optional payload.

use http::{Method, Uri};

use crate::cache_control::CacheControl;
use crate::headers::Headers;
use crate::payload::Payload;

/// A caller-scoped HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    /// The target URI.
    pub uri: Uri,
    /// The HTTP method.
    pub method: Method,
    /// Request headers.
    pub headers: Headers,
    /// The request body, if any.
    pub payload: Option<Payload>,
}

impl Request {
    /// Builds a bodyless `GET` request for `uri`.
    pub fn get(uri: Uri) -> Self {
        Self { uri, method: Method::GET, headers: Headers::new(), payload: None }
    }

    /// `true` for methods that do not mutate server state: GET, HEAD,
    /// OPTIONS, TRACE.
    pub fn is_safe_method(&self) -> bool {
        matches!(
            self.method,
            Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
        )
    }

    /// `true` for methods eligible to have their response stored: GET, HEAD.
    pub fn is_cacheable_method(&self) -> bool {
        matches!(self.method, Method::GET | Method::HEAD)
    }

    /// Parses this request's `Cache-Control` header.
    pub fn cache_control(&self) -> CacheControl {
        CacheControl::parse(&self.headers)
    }

    /// The URI normalised for use as a per-resource cache/lock key: the
    /// fragment is stripped.
    pub fn normalized_uri(&self) -> String {
        normalize_uri(&self.uri)
    }
}

/// Strips the fragment from a URI's string form for comparison purposes.
pub fn normalize_uri(uri: &Uri) -> String {
    let s = uri.to_string();
    match s.find('#') {
        Some(idx) => s[..idx].to_string(),
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_and_cacheable_methods() {
        let get = Request { method: Method::GET, ..Request::get("/".parse().unwrap()) };
        assert!(get.is_safe_method());
        assert!(get.is_cacheable_method());

        let post = Request { method: Method::POST, ..Request::get("/".parse().unwrap()) };
        assert!(!post.is_safe_method());
        assert!(!post.is_cacheable_method());

        let head = Request { method: Method::HEAD, ..Request::get("/".parse().unwrap()) };
        assert!(head.is_safe_method());
        assert!(head.is_cacheable_method());
    }

    #[test]
    fn normalized_uri_strips_fragment() {
        let uri: Uri = "http://example.com/r#section".parse().unwrap();
        assert_eq!(normalize_uri(&uri), "http://example.com/r");
    }
}
