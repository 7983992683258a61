//! The capability of performing one outbound GET request
//!
//! The dispatcher only needs a status code and a body back, so anything that
//! can turn an `OutboundRequest` into a `TransportResponse` can stand in for
//! the real HTTP client (tests use in-memory doubles).

use futures::future::BoxFuture;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::time::Duration;

use super::FetchError;
use crate::request::OutboundRequest;

/// Default per-call deadline
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Status and body of a completed call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Creates a response
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can perform one outbound call
pub trait Transport: Send + Sync {
    /// Issues `request` and returns its status and body
    fn get<'a>(
        &'a self,
        request: &'a OutboundRequest,
    ) -> BoxFuture<'a, Result<TransportResponse, FetchError>>;
}

/// `Transport` backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport whose calls time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    /// Creates a transport around an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn get<'a>(
        &'a self,
        request: &'a OutboundRequest,
    ) -> BoxFuture<'a, Result<TransportResponse, FetchError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(request.url.clone())
                .header(USER_AGENT, request.user_agent.as_str())
                .send()
                .await
                .map_err(FetchError::from)?;
            let status = response.status().as_u16();
            let body = response.bytes().await.map_err(FetchError::from)?;
            Ok(TransportResponse::new(status, body.to_vec()))
        })
    }
}
