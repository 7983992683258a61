//! In-memory transport double for dispatcher and client tests

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::{FetchError, Transport, TransportResponse};
use crate::request::OutboundRequest;

/// Answers every request from a fixed script and records what it saw
#[derive(Debug)]
pub(crate) struct ScriptedTransport {
    /// (URL substring, response) pairs, first match wins
    routes: Vec<(String, Result<TransportResponse, FetchError>)>,
    fallback: Result<TransportResponse, FetchError>,
    delay: Duration,
    seen: Mutex<Vec<(Instant, OutboundRequest)>>,
}

impl ScriptedTransport {
    pub(crate) fn ok(body: &str) -> Self {
        Self::answering(Ok(TransportResponse::new(200, body)))
    }

    pub(crate) fn status(status: u16) -> Self {
        Self::answering(Ok(TransportResponse::new(status, Vec::new())))
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self::answering(Err(FetchError::Transport(message.to_string())))
    }

    fn answering(fallback: Result<TransportResponse, FetchError>) -> Self {
        Self {
            routes: Vec::new(),
            fallback,
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Answers requests whose URL contains `fragment` with a 200 and `body`
    pub(crate) fn with_route(mut self, fragment: &str, body: &str) -> Self {
        self.routes
            .push((fragment.to_string(), Ok(TransportResponse::new(200, body))));
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        self.seen.lock().len()
    }

    pub(crate) fn requests(&self) -> Vec<OutboundRequest> {
        self.seen.lock().iter().map(|(_, r)| r.clone()).collect()
    }

    pub(crate) fn issue_times(&self) -> Vec<Instant> {
        let mut times: Vec<_> = self.seen.lock().iter().map(|(t, _)| *t).collect();
        times.sort();
        times
    }

    fn answer(&self, request: &OutboundRequest) -> Result<TransportResponse, FetchError> {
        let url = request.url.as_str();
        self.routes
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Transport for ScriptedTransport {
    fn get<'a>(
        &'a self,
        request: &'a OutboundRequest,
    ) -> BoxFuture<'a, Result<TransportResponse, FetchError>> {
        Box::pin(async move {
            self.seen.lock().push((Instant::now(), request.clone()));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.answer(request)
        })
    }
}
