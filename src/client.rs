//! MediaWiki API client
//!
//! `WikiClient` is the entry point for callers: it owns the dispatcher (and
//! with it the response cache and throttle) together with the current API
//! target. Endpoint-specific helpers are expected to build `QueryParams` and
//! go through `query` or `query_raw`.

use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::RequestCache;
use crate::config::ClientConfig;
use crate::dispatch::{Dispatcher, FetchError, HttpTransport, Throttle, Transport};
use crate::request::{ApiEndpoint, OutboundRequest, QueryParams};

/// Errors that can occur when querying the API
#[derive(Debug, Error)]
pub enum WikiError {
    /// The HTTP call failed, timed out or returned a non-2xx status
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The response body was not valid JSON
    #[error("Failed to parse JSON response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The API URL template did not expand to a valid URL
    #[error("Invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The API answered with an error envelope
    #[error("API error '{code}': {info}")]
    Api { code: String, info: String },
}

/// Target of outgoing requests; changing the endpoint invalidates the cache
#[derive(Debug, Clone)]
struct Target {
    endpoint: ApiEndpoint,
    user_agent: String,
}

/// Client for a MediaWiki action API
#[derive(Debug)]
pub struct WikiClient {
    dispatcher: Dispatcher,
    target: RwLock<Target>,
}

impl WikiClient {
    /// Creates a client that talks HTTP using the given settings
    pub fn new(config: &ClientConfig) -> Result<Self, WikiError> {
        let transport = HttpTransport::new(config.request_timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates a client that issues its calls through `transport`
    pub fn with_transport(config: &ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let dispatcher = Dispatcher::with_parts(
            transport,
            RequestCache::new(config.cache_capacity, config.cache_expiration()),
            Throttle::per_second(config.requests_per_second),
            config.request_timeout(),
        );
        Self {
            dispatcher,
            target: RwLock::new(Target {
                endpoint: config.endpoint(),
                user_agent: config.user_agent.clone(),
            }),
        }
    }

    /// Current language prefix
    pub fn language(&self) -> String {
        self.target.read().endpoint.language.clone()
    }

    /// Current API URL template
    pub fn api_url(&self) -> String {
        self.target.read().endpoint.url_template.clone()
    }

    /// Current user agent
    pub fn user_agent(&self) -> String {
        self.target.read().user_agent.clone()
    }

    /// Switches to another language edition and clears the cache
    ///
    /// `language` is one of the prefixes listed at
    /// <https://meta.wikimedia.org/wiki/List_of_Wikipedias>.
    pub fn set_language(&self, language: &str) {
        self.target.write().endpoint.language = language.to_string();
        self.dispatcher.clear_cache();
        info!(language, "switched API language, cache cleared");
    }

    /// Points the client at another API URL template and clears the cache
    ///
    /// The template may contain `{lang}`. It is rejected if it does not
    /// expand to a valid URL.
    pub fn set_api_url(&self, url_template: &str) -> Result<(), WikiError> {
        {
            let mut target = self.target.write();
            let endpoint = ApiEndpoint::new(url_template, target.endpoint.language.clone());
            endpoint.resolve()?;
            target.endpoint = endpoint;
        }
        self.dispatcher.clear_cache();
        info!(url = url_template, "switched API URL, cache cleared");
        Ok(())
    }

    /// Changes the user agent sent with future requests
    pub fn set_user_agent(&self, user_agent: &str) {
        self.target.write().user_agent = user_agent.to_string();
    }

    /// Adjusts cache bounds and request rate
    pub fn configure_cache(&self, capacity: usize, expiration: Duration, requests_per_second: u32) {
        self.dispatcher
            .configure(capacity, expiration, requests_per_second);
    }

    /// Drops every cached response
    pub fn clear_cache(&self) {
        self.dispatcher.clear_cache();
    }

    /// Number of cached responses
    pub fn cache_len(&self) -> usize {
        self.dispatcher.cache_len()
    }

    /// The underlying dispatcher
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Resolves `params` into the request that would be sent
    pub fn request_for(&self, params: &QueryParams) -> Result<OutboundRequest, WikiError> {
        let target = self.target.read();
        Ok(OutboundRequest::build(
            &target.endpoint,
            params,
            &target.user_agent,
        )?)
    }

    /// Runs a query and returns the raw response body
    pub async fn query_raw(&self, params: &QueryParams) -> Result<Vec<u8>, WikiError> {
        let request = self.request_for(params)?;
        Ok(self.dispatcher.fetch(&request).await?)
    }

    /// Runs a query and returns the parsed JSON response
    ///
    /// An `error` object in the response becomes `WikiError::Api`.
    pub async fn query(&self, params: &QueryParams) -> Result<Value, WikiError> {
        let body = self.query_raw(params).await?;
        let value: Value = serde_json::from_slice(&body)?;
        check_api_error(&value)?;
        Ok(value)
    }

    /// Runs a query and follows `continue` pagination
    ///
    /// The `continue` object of each response is merged into the original
    /// parameters for the next request. Stops when a response carries no
    /// `continue` object or after `max_batches` responses.
    pub async fn query_continued(
        &self,
        params: &QueryParams,
        max_batches: usize,
    ) -> Result<Vec<Value>, WikiError> {
        let mut batches = Vec::new();
        let mut next = params.clone();

        while batches.len() < max_batches {
            let value = self.query(&next).await?;
            let continuation = value.get("continue").and_then(Value::as_object).cloned();
            batches.push(value);

            let Some(continuation) = continuation else {
                break;
            };
            debug!(batch = batches.len(), "following continuation");
            next = params.clone();
            for (key, value) in continuation {
                next.set(key, param_value(&value));
            }
        }

        Ok(batches)
    }
}

/// Turns a MediaWiki error envelope into an error
fn check_api_error(value: &Value) -> Result<(), WikiError> {
    let Some(error) = value.get("error") else {
        return Ok(());
    };
    let field = |name: &str| {
        error
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Err(WikiError::Api {
        code: field("code"),
        info: field("info"),
    })
}

/// Renders a continuation value as a query parameter
fn param_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::testing::ScriptedTransport;

    fn test_config() -> ClientConfig {
        ClientConfig {
            requests_per_second: 0,
            ..Default::default()
        }
    }

    fn client(transport: &Arc<ScriptedTransport>) -> WikiClient {
        WikiClient::with_transport(&test_config(), Arc::clone(transport) as Arc<dyn Transport>)
    }

    #[tokio::test]
    async fn test_query_parses_json() {
        let transport = Arc::new(ScriptedTransport::ok(
            r#"{"batchcomplete":"","query":{"random":[{"id":1,"title":"Ferris"}]}}"#,
        ));
        let client = client(&transport);

        let value = client
            .query(&QueryParams::new().with("list", "random"))
            .await
            .expect("query should succeed");

        assert_eq!(value["query"]["random"][0]["title"], "Ferris");
        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].url.as_str().starts_with("https://en.wikipedia.org/w/api.php?"));
        assert!(sent[0].user_agent.starts_with("wikiquery/"));
    }

    #[tokio::test]
    async fn test_api_error_envelope_is_an_error() {
        let transport = Arc::new(ScriptedTransport::ok(
            r#"{"error":{"code":"badvalue","info":"Unrecognized value for parameter \"list\"."}}"#,
        ));
        let client = client(&transport);

        let err = client
            .query(&QueryParams::new().with("list", "nope"))
            .await
            .unwrap_err();

        match err {
            WikiError::Api { code, info } => {
                assert_eq!(code, "badvalue");
                assert!(info.contains("Unrecognized"));
            }
            other => panic!("expected an API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_a_parse_error() {
        let transport = Arc::new(ScriptedTransport::ok("<html>maintenance</html>"));
        let client = client(&transport);

        let err = client.query(&QueryParams::new()).await.unwrap_err();

        assert!(matches!(err, WikiError::Parse(_)));
    }

    #[tokio::test]
    async fn test_upstream_status_is_propagated() {
        let transport = Arc::new(ScriptedTransport::status(429));
        let client = client(&transport);

        let err = client.query_raw(&QueryParams::new()).await.unwrap_err();

        assert!(matches!(err, WikiError::Fetch(FetchError::Status(429))));
    }

    #[tokio::test]
    async fn test_set_language_clears_cache_and_changes_host() {
        let transport = Arc::new(ScriptedTransport::ok("{}"));
        let client = client(&transport);
        let params = QueryParams::new().with("titles", "Paris");

        client.query(&params).await.expect("query should succeed");
        assert_eq!(client.cache_len(), 1);

        client.set_language("fr");
        assert_eq!(client.cache_len(), 0);
        assert_eq!(client.language(), "fr");

        client.query(&params).await.expect("query should succeed");
        let sent = transport.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].url.host_str(), Some("fr.wikipedia.org"));
    }

    #[tokio::test]
    async fn test_set_api_url_validates_and_clears_cache() {
        let transport = Arc::new(ScriptedTransport::ok("{}"));
        let client = client(&transport);
        client.query(&QueryParams::new()).await.expect("query should succeed");

        assert!(client.set_api_url("::not a url::").is_err());
        assert_eq!(client.cache_len(), 1, "a rejected URL must not clear the cache");

        client
            .set_api_url("http://localhost:8080/{lang}/api.php")
            .expect("template should be accepted");
        assert_eq!(client.cache_len(), 0);

        let request = client.request_for(&QueryParams::new()).expect("request should build");
        assert!(request.cache_key().starts_with("http://localhost:8080/en/api.php?"));
    }

    #[tokio::test]
    async fn test_user_agent_change_keeps_cache() {
        let transport = Arc::new(ScriptedTransport::ok("{}"));
        let client = client(&transport);
        let params = QueryParams::new().with("titles", "Oslo");
        client.query(&params).await.expect("query should succeed");

        client.set_user_agent("research-bot/1.0 (ops@example.org)");
        client.query(&params).await.expect("query should succeed");

        assert_eq!(client.user_agent(), "research-bot/1.0 (ops@example.org)");
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_query_continued_follows_continuation() {
        let transport = Arc::new(
            ScriptedTransport::ok(r#"{"query":{"pages":{}}}"#)
                .with_route(
                    "plcontinue=2",
                    r#"{"continue":{"plcontinue":"3","continue":"||"},"query":{"pages":{"2":{}}}}"#,
                )
                .with_route(
                    "plcontinue=3",
                    r#"{"batchcomplete":"","query":{"pages":{"3":{}}}}"#,
                )
                .with_route(
                    "prop=links",
                    r#"{"continue":{"plcontinue":"2","continue":"||"},"query":{"pages":{"1":{}}}}"#,
                ),
        );
        let client = client(&transport);
        let params = QueryParams::new()
            .with("prop", "links")
            .with("titles", "Rust");

        let batches = client
            .query_continued(&params, 10)
            .await
            .expect("pagination should succeed");

        assert_eq!(batches.len(), 3);
        assert!(batches[2].get("continue").is_none());
        let sent = transport.requests();
        assert_eq!(sent.len(), 3);
        assert!(sent[2].url.as_str().contains("titles=Rust"));
        assert!(sent[2].url.as_str().contains("continue=%7C%7C"));
    }

    #[tokio::test]
    async fn test_query_continued_respects_batch_limit() {
        let transport = Arc::new(ScriptedTransport::ok(
            r#"{"continue":{"rncontinue":7,"continue":"-||"},"query":{"random":[]}}"#,
        ));
        let client = client(&transport);

        let batches = client
            .query_continued(&QueryParams::new().with("list", "random"), 2)
            .await
            .expect("pagination should succeed");

        assert_eq!(batches.len(), 2);
        let sent = transport.requests();
        assert!(sent[1].url.as_str().contains("rncontinue=7"));
    }

    #[tokio::test]
    async fn test_configure_cache_applies_to_dispatcher() {
        let transport = Arc::new(ScriptedTransport::ok("{}"));
        let client = client(&transport);

        client.configure_cache(10, Duration::from_secs(60), 50);

        assert_eq!(client.dispatcher().cache().capacity(), 10);
        assert_eq!(client.dispatcher().throttle().min_interval(), Duration::from_millis(20));
    }
}
