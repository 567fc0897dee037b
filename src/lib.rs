//! A client-side HTTP cache implementing RFC 7234 caching semantics.
//!
//! The entry point is [`engine::CacheEngine`], built over a [`storage::Storage`]
//! backend ([`storage::memory::MemoryStore`] or [`storage::persistent::PersistentStore`])
//! and a caller-supplied [`resolver::Resolver`] that performs the actual
//! network request:
//!
//! ```no_run
//! use std::num::NonZeroUsize;
//! use std::sync::Arc;
//!
//! use rfc_http_cache::engine::CacheEngine;
//! use rfc_http_cache::request::Request;
//! use rfc_http_cache::resolver::Resolver;
//! use rfc_http_cache::response::Response;
//! use rfc_http_cache::storage::memory::MemoryStore;
//!
//! # struct MyResolver;
//! # #[async_trait::async_trait]
//! # impl Resolver for MyResolver {
//! #     type Error = std::io::Error;
//! #     async fn resolve(&self, _request: &Request) -> Result<Response, std::io::Error> {
//! #         unimplemented!()
//! #     }
//! # }
//! # async fn run() -> rfc_http_cache::error::Result<()> {
//! let storage = Arc::new(MemoryStore::new(NonZeroUsize::new(1024).unwrap()));
//! let engine = CacheEngine::new(storage, MyResolver);
//! let request = Request::get("https://example.com/".parse().unwrap());
//! let response = engine.resolve(&request).await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```
//!
//! Caching decisions (what gets stored, how long it stays fresh, when a
//! stale entry may still be served, how conditional revalidation is built)
//! live in [`helper`], [`freshness`], and [`cache_control`]; the engine
//! composes them rather than reimplementing them.

pub mod cache_control;
pub mod engine;
pub mod error;
pub mod freshness;
pub mod headers;
pub mod helper;
pub mod item;
pub mod locks;
pub mod payload;
pub mod request;
pub mod resolver;
pub mod response;
pub mod stats;
pub mod storage;
pub mod variant;

pub use engine::CacheEngine;
pub use error::{CacheError, Result};
pub use item::CacheItem;
pub use request::Request;
pub use resolver::Resolver;
pub use response::Response;
