//! Parsing of `Cache-Control` directives, grounded on the directive-table
//! parsing in `http-cache-semantics`' `parse_cache_control`.

use std::collections::HashMap;
use std::time::Duration;

use crate::headers::Headers;

/// A parsed `Cache-Control` header: directive name (lowercased) to optional
/// value. Repeated directives with conflicting values collapse to a single
/// `must-revalidate`, per RFC 7234 §5.2.1.1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheControl {
    directives: HashMap<String, Option<String>>,
}

impl CacheControl {
    /// Parses every `Cache-Control` occurrence on `headers` into one set of
    /// directives.
    pub fn parse(headers: &Headers) -> Self {
        let mut directives = HashMap::new();
        let mut conflict = false;

        for raw in headers.cache_control() {
            for part in raw.split(',') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                let mut kv = part.splitn(2, '=');
                let name = kv.next().unwrap().trim().to_ascii_lowercase();
                if name.is_empty() {
                    continue;
                }
                let value = kv
                    .next()
                    .map(|v| v.trim().trim_matches('"').to_string());

                match directives.get(&name) {
                    Some(existing) if existing != &value => conflict = true,
                    _ => {}
                }
                directives.insert(name, value);
            }
        }

        if conflict {
            directives.insert("must-revalidate".to_string(), None);
        }

        Self { directives }
    }

    fn has(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }

    fn duration_of(&self, name: &str) -> Option<Duration> {
        self.directives
            .get(name)?
            .as_ref()
            .and_then(|v| v.parse::<i64>().ok())
            .map(|secs| Duration::from_secs(secs.max(0) as u64))
    }

    /// `no-store`
    pub fn no_store(&self) -> bool {
        self.has("no-store")
    }

    /// `no-cache`. The optional field-list argument is not modelled (the
    /// engine only needs the all-fields form).
    pub fn no_cache(&self) -> bool {
        self.has("no-cache")
    }

    /// `private`
    pub fn private(&self) -> bool {
        self.has("private")
    }

    /// `public`
    pub fn public(&self) -> bool {
        self.has("public")
    }

    /// `must-revalidate`
    pub fn must_revalidate(&self) -> bool {
        self.has("must-revalidate")
    }

    /// `proxy-revalidate`
    pub fn proxy_revalidate(&self) -> bool {
        self.has("proxy-revalidate")
    }

    /// `max-age=Δ`
    pub fn max_age(&self) -> Option<Duration> {
        self.duration_of("max-age")
    }

    /// `s-maxage=Δ`
    pub fn s_maxage(&self) -> Option<Duration> {
        self.duration_of("s-maxage")
    }

    /// `min-fresh=Δ`
    pub fn min_fresh(&self) -> Option<Duration> {
        self.duration_of("min-fresh")
    }

    /// `max-stale` (bare) or `max-stale=Δ`. `Some(None)` means the directive
    /// is present with no delta (any staleness is acceptable); `Some(Some(d))`
    /// bounds the acceptable staleness to `d`.
    pub fn max_stale(&self) -> Option<Option<Duration>> {
        self.directives.get("max-stale").map(|v| {
            v.as_ref().and_then(|v| v.parse::<i64>().ok()).map(|secs| {
                Duration::from_secs(secs.max(0) as u64)
            })
        })
    }
}
