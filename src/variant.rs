//! Variant fingerprinting from a response's `Vary` header.

use crate::headers::Headers;

/// Derives the variant fingerprint for a response cached under the given
/// request headers. Returns `None` if the response is not cacheable because
/// it carries `Vary: *`, which names every header as significant and so can
/// never be matched against a later request.
pub fn fingerprint(
    vary: Option<&str>,
    request_headers: &Headers,
) -> Option<String> {
    let vary = match vary {
        None => return Some(String::new()),
        Some(v) => v,
    };

    let names: Vec<&str> = vary.split(',').map(str::trim).collect();
    if names.iter().any(|n| *n == "*") {
        return None;
    }

    let mut parts = Vec::with_capacity(names.len());
    for name in names {
        if name.is_empty() {
            continue;
        }
        let value = request_headers.get(name).unwrap_or("");
        parts.push(format!("{}={}", name.to_ascii_lowercase(), value));
    }
    parts.sort();
    Some(parts.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_vary_yields_stable_empty_fingerprint() {
        let req = Headers::new();
        assert_eq!(fingerprint(None, &req), Some(String::new()));
    }

    #[test]
    fn vary_star_is_not_cacheable() {
        let req = Headers::new();
        assert_eq!(fingerprint(Some("*"), &req), None);
    }

    #[test]
    fn vary_names_select_request_header_values() {
        let mut req = Headers::new();
        req.insert("Accept-Language", "fr");
        req.insert("Accept", "en");
        let fp = fingerprint(Some("Accept-Language"), &req).unwrap();
        assert_eq!(fp, "accept-language=fr");
    }

    #[test]
    fn distinct_variant_values_yield_distinct_fingerprints() {
        let mut en = Headers::new();
        en.insert("Accept-Language", "en");
        let mut fr = Headers::new();
        fr.insert("Accept-Language", "fr");
        assert_ne!(
            fingerprint(Some("Accept-Language"), &en),
            fingerprint(Some("Accept-Language"), &fr)
        );
    }
}
