//! The upstream transport the engine delegates to when it needs a fresh
//! response. Kept deliberately ignorant of caching semantics: a resolver
//! just sends a request and returns what came back, or an error if the
//! network attempt itself failed.

use async_trait::async_trait;

/// Performs the actual network request for a cache miss or revalidation.
///
/// Implementations should not interpret `Cache-Control`, conditional
/// headers, or status codes — that is the engine's job. A resolver that
/// successfully talks to the origin and gets any HTTP response back,
/// including a 5xx, should return `Ok`; `Err` is reserved for transport
/// failure (connection refused, timeout, DNS failure, and the like).
#[async_trait]
pub trait Resolver: Send + Sync {
    /// The resolver's own error type, wrapped into [`crate::error::CacheError::Upstream`]
    /// by the engine.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends `request` upstream and returns the response it got back.
    async fn resolve(
        &self,
        request: &crate::request::Request,
    ) -> std::result::Result<crate::response::Response, Self::Error>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::request::Request;
    use crate::response::Response;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, thiserror::Error)]
    #[error("stub resolver failure")]
    pub struct StubError;

    /// A resolver returning a scripted sequence of responses, counting calls
    /// and recording the requests it was actually sent.
    pub struct ScriptedResolver {
        script: Mutex<Vec<std::result::Result<Response, StubError>>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<Request>>,
    }

    impl ScriptedResolver {
        pub fn new(script: Vec<std::result::Result<Response, StubError>>) -> Self {
            // Reverse so `pop()` yields responses in the given order.
            let mut script = script;
            script.reverse();
            Self { script: Mutex::new(script), calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()) }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// The last request the resolver was asked to resolve, if any.
        pub fn last_request(&self) -> Option<Request> {
            self.seen.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl Resolver for ScriptedResolver {
        type Error = StubError;

        async fn resolve(
            &self,
            request: &Request,
        ) -> std::result::Result<Response, StubError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.clone());
            self.script.lock().unwrap().pop().unwrap_or(Err(StubError))
        }
    }
}
