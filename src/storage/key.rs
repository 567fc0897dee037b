//! The storage key: (request URI, variant fingerprint).

use serde::{Deserialize, Serialize};

/// Identifies one cached variant of one URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageKey {
    /// The normalised request URI (fragment stripped).
    pub uri: String,
    /// The variant fingerprint derived from the response's `Vary` header.
    pub fingerprint: String,
}

impl StorageKey {
    /// Builds a key from an already-normalised URI and fingerprint.
    pub fn new(uri: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self { uri: uri.into(), fingerprint: fingerprint.into() }
    }
}
