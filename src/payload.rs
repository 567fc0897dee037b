//! The payload byte-source abstraction the cache requires: just enough to
//! consume an incoming body once and re-expose a stable, independently
//! readable handle once it has been captured into storage. True streaming
//! and partial reads are left to whatever performs the network request.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;

#[derive(Debug, Clone)]
enum Body {
    Bytes(Arc<Vec<u8>>),
    File(PathBuf),
}

/// An opaque response body plus its media type.
#[derive(Debug, Clone)]
pub struct Payload {
    /// The `Content-Type` the bytes should be interpreted as, if known.
    pub media_type: Option<String>,
    body: Body,
}

impl Payload {
    /// Wraps an in-memory buffer.
    pub fn from_bytes(bytes: Vec<u8>, media_type: Option<String>) -> Self {
        Self { media_type, body: Body::Bytes(Arc::new(bytes)) }
    }

    /// Wraps a handle to a file holding the payload on disk.
    pub fn from_file(path: PathBuf, media_type: Option<String>) -> Self {
        Self { media_type, body: Body::File(path) }
    }

    /// `true` once the underlying bytes are still readable (a backing file
    /// may have been removed by an evicting or invalidating store).
    pub fn is_available(&self) -> bool {
        match &self.body {
            Body::Bytes(_) => true,
            Body::File(path) => path.exists(),
        }
    }

    /// Reads the full body. Safe to call repeatedly and concurrently: an
    /// in-memory payload clones an `Arc`, a file-backed payload opens a
    /// fresh read handle each time.
    pub async fn bytes(&self) -> Result<Vec<u8>> {
        match &self.body {
            Body::Bytes(b) => Ok((**b).clone()),
            Body::File(path) => Ok(tokio::fs::read(path).await?),
        }
    }

    /// The backing file path, if this payload is file-spilled. Used by the
    /// persistent store to delete the file on eviction/invalidation.
    pub fn file_path(&self) -> Option<&std::path::Path> {
        match &self.body {
            Body::Bytes(_) => None,
            Body::File(path) => Some(path.as_path()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_payload_is_always_available() {
        let p = Payload::from_bytes(b"hi".to_vec(), None);
        assert!(p.is_available());
        assert_eq!(p.bytes().await.unwrap(), b"hi");
    }

    #[tokio::test]
    async fn missing_file_payload_is_unavailable() {
        let p = Payload::from_file(
            PathBuf::from("/nonexistent/path/for/test"),
            None,
        );
        assert!(!p.is_available());
        assert!(p.bytes().await.is_err());
    }
}
