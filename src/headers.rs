//! A case-insensitive, order-preserving header multimap with typed accessors
//! for the handful of fields the caching protocol cares about.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known header names the cache engine reasons about directly.
pub mod names {
    /// `Cache-Control`
    pub const CACHE_CONTROL: &str = "cache-control";
    /// `Date`
    pub const DATE: &str = "date";
    /// `Expires`
    pub const EXPIRES: &str = "expires";
    /// `Age`
    pub const AGE: &str = "age";
    /// `Last-Modified`
    pub const LAST_MODIFIED: &str = "last-modified";
    /// `ETag`
    pub const ETAG: &str = "etag";
    /// `Vary`
    pub const VARY: &str = "vary";
    /// `Allow`
    pub const ALLOW: &str = "allow";
    /// `Location`
    pub const LOCATION: &str = "location";
    /// `Content-Location`
    pub const CONTENT_LOCATION: &str = "content-location";
    /// `Content-Type`
    pub const CONTENT_TYPE: &str = "content-type";
    /// `Warning`
    pub const WARNING: &str = "warning";
    /// `If-None-Match`
    pub const IF_NONE_MATCH: &str = "if-none-match";
    /// `If-Modified-Since`
    pub const IF_MODIFIED_SINCE: &str = "if-modified-since";
    /// `Content-Length`
    pub const CONTENT_LENGTH: &str = "content-length";
    /// `Content-MD5`
    pub const CONTENT_MD5: &str = "content-md5";
}

/// An immutable-by-convention, case-insensitive multimap of header values.
///
/// Mutation methods (`insert`, `append`, `remove`) take `&mut self` for
/// ergonomics, but every caching code path treats a `Headers` value as a
/// value type: build a new one (via `with_*`/`clone`) rather than mutating
/// one that's shared. Iteration order is insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

fn normalize(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl Headers {
    /// Creates an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all values for `name` with the single value `value`.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let key = normalize(name);
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = vec![value.into()];
        } else {
            self.entries.push((key, vec![value.into()]));
        }
    }

    /// Appends `value` to the sequence of values stored under `name`.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        let key = normalize(name);
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1.push(value.into());
        } else {
            self.entries.push((key, vec![value.into()]));
        }
    }

    /// Removes every value stored under `name`.
    pub fn remove(&mut self, name: &str) {
        let key = normalize(name);
        self.entries.retain(|(k, _)| *k != key);
    }

    /// Returns the first value stored under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().copied()
    }

    /// Returns every value stored under `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        let key = normalize(name);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, vals)| vals.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns `true` if `name` has at least one stored value.
    pub fn contains(&self, name: &str) -> bool {
        let key = normalize(name);
        self.entries.iter().any(|(k, _)| *k == key)
    }

    /// Iterates over `(name, value)` pairs in insertion order. A header with
    /// multiple values yields one pair per value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(k, vals)| {
            vals.iter().map(move |v| (k.as_str(), v.as_str()))
        })
    }

    /// Number of distinct header names stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` iff no headers are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merges `other`'s values into `self`, replacing any value(s) `self`
    /// already has for each name in `other` (used to merge a 304's headers
    /// onto a cached response during revalidation merge).
    pub fn merge_replace(&mut self, other: &Headers) {
        for (name, _) in &other.entries {
            self.remove(name);
        }
        for (name, values) in &other.entries {
            for value in values {
                self.append(name, value.clone());
            }
        }
    }

    // -- typed accessors -------------------------------------------------

    /// `Cache-Control` values (one entry per comma-joined header occurrence).
    pub fn cache_control(&self) -> Vec<&str> {
        self.get_all(names::CACHE_CONTROL)
    }

    /// `Date`
    pub fn date(&self) -> Option<&str> {
        self.get(names::DATE)
    }

    /// `Expires`
    pub fn expires(&self) -> Option<&str> {
        self.get(names::EXPIRES)
    }

    /// `Age`
    pub fn age(&self) -> Option<&str> {
        self.get(names::AGE)
    }

    /// `Last-Modified`
    pub fn last_modified(&self) -> Option<&str> {
        self.get(names::LAST_MODIFIED)
    }

    /// `ETag`
    pub fn etag(&self) -> Option<&str> {
        self.get(names::ETAG)
    }

    /// `Vary`
    pub fn vary(&self) -> Option<&str> {
        self.get(names::VARY)
    }

    /// `Allow`
    pub fn allow(&self) -> Option<&str> {
        self.get(names::ALLOW)
    }

    /// `Location`
    pub fn location(&self) -> Option<&str> {
        self.get(names::LOCATION)
    }

    /// `Content-Location`
    pub fn content_location(&self) -> Option<&str> {
        self.get(names::CONTENT_LOCATION)
    }

    /// `Content-Type`
    pub fn content_type(&self) -> Option<&str> {
        self.get(names::CONTENT_TYPE)
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            writeln!(f, "{name}: {value}")?;
        }
        Ok(())
    }
}

impl From<&http::HeaderMap> for Headers {
    fn from(map: &http::HeaderMap) -> Self {
        let mut headers = Headers::new();
        for name in map.keys() {
            for value in map.get_all(name) {
                if let Ok(v) = value.to_str() {
                    headers.append(name.as_str(), v.to_string());
                }
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_get_and_insert() {
        let mut h = Headers::new();
        h.insert("Content-Type", "text/plain");
        assert_eq!(h.get("content-type"), Some("text/plain"));
        assert_eq!(h.get("CONTENT-TYPE"), Some("text/plain"));
    }

    #[test]
    fn append_preserves_multiple_values_in_order() {
        let mut h = Headers::new();
        h.append("Vary", "Accept");
        h.append("vary", "Accept-Language");
        assert_eq!(h.get_all("VARY"), vec!["Accept", "Accept-Language"]);
    }

    #[test]
    fn insert_replaces_prior_values() {
        let mut h = Headers::new();
        h.append("X-Foo", "a");
        h.append("X-Foo", "b");
        h.insert("x-foo", "c");
        assert_eq!(h.get_all("x-foo"), vec!["c"]);
    }

    #[test]
    fn iteration_order_is_insertion_order() {
        let mut h = Headers::new();
        h.insert("b", "2");
        h.insert("a", "1");
        let names: Vec<_> = h.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn merge_replace_overwrites_shared_names_only() {
        let mut cached = Headers::new();
        cached.insert("etag", "\"v1\"");
        cached.insert("content-type", "text/plain");

        let mut fresh = Headers::new();
        fresh.insert("etag", "\"v2\"");
        fresh.insert("date", "today");

        cached.merge_replace(&fresh);
        assert_eq!(cached.get("etag"), Some("\"v2\""));
        assert_eq!(cached.get("content-type"), Some("text/plain"));
        assert_eq!(cached.get("date"), Some("today"));
    }
}
