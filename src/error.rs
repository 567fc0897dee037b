use miette::Diagnostic;
use thiserror::Error;

/// A `Result` typedef to use with the [`CacheError`] type
pub type Result<T> = std::result::Result<T, CacheError>;

/// A generic "error" for the cache engine and its storage backends
#[derive(Error, Diagnostic, Debug)]
pub enum CacheError {
    /// The resolver failed and no cached response could stand in for it
    #[error("upstream resolver failed: {0}")]
    #[diagnostic(code(http_cache::upstream))]
    Upstream(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The engine was asked to resolve a request without a resolver configured
    #[error("cache engine has no resolver configured")]
    #[diagnostic(code(http_cache::misconfigured))]
    Misconfigured,

    /// A persistent store's on-disk snapshot could not be parsed
    #[error("persistent store snapshot at {path:?} is corrupt: {source}")]
    #[diagnostic(code(http_cache::corrupt_store))]
    CorruptStore {
        /// Path to the snapshot file that failed to load
        path: std::path::PathBuf,
        /// Underlying decode error
        #[source]
        source: postcard::Error,
    },

    /// A cached payload's backing file is no longer readable
    #[error("cached payload for {key} is no longer available")]
    #[diagnostic(code(http_cache::payload_unavailable))]
    PayloadUnavailable {
        /// The storage key whose payload is missing
        key: String,
    },

    /// There was an error converting a header to a string
    #[error(transparent)]
    #[diagnostic(code(http_cache::header_to_str))]
    HeaderToStr(#[from] http::header::ToStrError),

    /// There was an error parsing an HTTP header value
    #[error(transparent)]
    #[diagnostic(code(http_cache::invalid_header_value))]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// There was an error parsing an HTTP header name
    #[error(transparent)]
    #[diagnostic(code(http_cache::invalid_header_name))]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// There was an error parsing the URI
    #[error(transparent)]
    #[diagnostic(code(http_cache::invalid_uri))]
    InvalidUri(#[from] http::uri::InvalidUri),

    /// I/O failure underlying a persistent store operation
    #[error(transparent)]
    #[diagnostic(code(http_cache::io))]
    Io(#[from] std::io::Error),

    /// Failure serialising or deserialising a snapshot entry
    #[error(transparent)]
    #[diagnostic(code(http_cache::serialization))]
    Serialization(#[from] postcard::Error),
}
