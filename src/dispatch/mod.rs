//! Cached, rate-limited dispatch of API requests
//!
//! Every outbound call goes through a `Dispatcher`: the response cache is
//! consulted first, keyed by the fully resolved request URL, and only on a
//! miss (or an expired entry) is the call throttled and sent. Successful
//! bodies are stored; failures are returned as they are and never cached.

mod throttle;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use throttle::{interval_for, Throttle, DEFAULT_REQUESTS_PER_SECOND};
pub use transport::{HttpTransport, Transport, TransportResponse, DEFAULT_REQUEST_TIMEOUT};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{CacheLookup, RequestCache};
use crate::request::OutboundRequest;

/// Errors that can occur when an outbound call is made
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The API answered with a non-2xx status
    #[error("API returned HTTP status {0}")]
    Status(u16),

    /// The request could not be sent or its body could not be read
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// The call did not complete within the deadline
    #[error("HTTP request timed out")]
    Timeout,
}

impl FetchError {
    /// Whether this error came from the call deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Sends API requests through a response cache and a shared throttle
///
/// One dispatcher models one upstream origin: all calls share a single
/// throttle. Point a dispatcher at a different host or language only after
/// clearing its cache, since cached keys embed the old target.
pub struct Dispatcher {
    cache: RequestCache,
    throttle: Throttle,
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("cache", &self.cache)
            .field("throttle", &self.throttle)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher with default cache bounds, rate and timeout
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_parts(
            transport,
            RequestCache::default(),
            Throttle::default(),
            DEFAULT_REQUEST_TIMEOUT,
        )
    }

    /// Creates a dispatcher from explicit parts
    pub fn with_parts(
        transport: Arc<dyn Transport>,
        cache: RequestCache,
        throttle: Throttle,
        timeout: Duration,
    ) -> Self {
        Self {
            cache,
            throttle,
            transport,
            timeout,
        }
    }

    /// Adjusts the cache bounds and the request rate
    ///
    /// Existing entries are left alone; a smaller capacity is enforced on the
    /// next insertion and a shorter expiration on the next lookup.
    pub fn configure(&self, capacity: usize, expiration: Duration, requests_per_second: u32) {
        self.cache.set_capacity(capacity);
        self.cache.set_expiration(expiration);
        self.throttle
            .set_min_interval(interval_for(requests_per_second));
        debug!(
            capacity,
            ?expiration,
            requests_per_second,
            "dispatcher reconfigured"
        );
    }

    /// Drops every cached response
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of cached responses
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// The response cache
    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }

    /// The outbound call throttle
    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// Deadline applied to each outbound call
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetches `request` through the configured transport
    pub async fn fetch(&self, request: &OutboundRequest) -> Result<Vec<u8>, FetchError> {
        self.fetch_with(request.cache_key(), || self.transport.get(request))
            .await
    }

    /// Returns the cached body for `key`, or calls `issue` to fetch it
    ///
    /// `issue` runs only on a cache miss, after the throttle has granted a
    /// slot, and is cut off after the dispatcher's timeout. Its 2xx body is
    /// cached under `key`; anything else is returned as an error.
    pub async fn fetch_with<F, Fut>(&self, key: &str, issue: F) -> Result<Vec<u8>, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TransportResponse, FetchError>>,
    {
        match self.cache.get(key) {
            CacheLookup::Fresh(body) => {
                debug!(url = key, "cache hit");
                return Ok(body);
            }
            CacheLookup::Expired => debug!(url = key, "cache entry expired"),
            CacheLookup::Missing => debug!(url = key, "cache miss"),
        }

        self.throttle.acquire().await;

        let result = match tokio::time::timeout(self.timeout, issue()).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        };

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!(url = key, error = %err, "API request failed");
                return Err(err);
            }
        };

        if !response.is_success() {
            warn!(url = key, status = response.status, "API returned an error status");
            return Err(FetchError::Status(response.status));
        }

        self.cache.put(key, response.body.clone());
        Ok(response.body)
    }
}
