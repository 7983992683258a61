//! Outbound request construction for the MediaWiki action API
//!
//! Turns a set of query parameters into a fully resolved GET request. The
//! parameters are kept sorted so that the same logical request always yields
//! the same URL string, which is what the response cache is keyed on.

use std::collections::BTreeMap;

use url::Url;

/// Default API URL template; `{lang}` is replaced by the language prefix
pub const DEFAULT_API_URL: &str = "https://{lang}.wikipedia.org/w/api.php";

/// Default language prefix
pub const DEFAULT_LANGUAGE: &str = "en";

/// Default user agent sent with every request
pub const DEFAULT_USER_AGENT: &str = concat!("wikiquery/", env!("CARGO_PKG_VERSION"));

/// Placeholder substituted with the language prefix
const LANG_PLACEHOLDER: &str = "{lang}";

/// Ordered set of API query parameters
///
/// `action=query` and `format=json` are filled in when the caller does not
/// set them. Flag parameters such as `explaintext` are set with an empty
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: BTreeMap<String, String>,
}

impl QueryParams {
    /// Creates an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a parameter, builder style
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Adds a value-less flag parameter, builder style
    pub fn flag(self, key: impl Into<String>) -> Self {
        self.with(key, "")
    }

    /// Adds or replaces a parameter
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Returns the value of a parameter, if set
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Removes a parameter, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.params.remove(key)
    }

    /// Number of explicitly set parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether no parameters are set
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterates over the parameters that will be sent, defaults included,
    /// in key order
    pub fn resolved(&self) -> impl Iterator<Item = (&str, &str)> {
        let mut all: BTreeMap<&str, &str> = self
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        all.entry("action").or_insert("query");
        all.entry("format").or_insert("json");
        all.into_iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

/// API location: a URL template plus the language prefix it is expanded with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoint {
    /// URL template, optionally containing `{lang}`
    pub url_template: String,
    /// Language prefix such as `en` or `fr`
    pub language: String,
}

impl Default for ApiEndpoint {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_API_URL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl ApiEndpoint {
    /// Creates an endpoint from a template and a language prefix
    pub fn new(url_template: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            language: language.into(),
        }
    }

    /// Expands the template into the API base URL
    ///
    /// Templates without a `{lang}` placeholder are used verbatim.
    pub fn resolve(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.url_template.replace(LANG_PLACEHOLDER, &self.language))
    }
}

/// A fully resolved GET request against the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// Complete request URL, query string included
    pub url: Url,
    /// Value of the `User-Agent` header
    pub user_agent: String,
}

impl OutboundRequest {
    /// Builds the request for `params` against `endpoint`
    ///
    /// Any query string already present in the endpoint URL is replaced.
    pub fn build(
        endpoint: &ApiEndpoint,
        params: &QueryParams,
        user_agent: &str,
    ) -> Result<Self, url::ParseError> {
        let mut url = endpoint.resolve()?;
        url.set_query(None);
        url.query_pairs_mut().extend_pairs(params.resolved());
        Ok(Self {
            url,
            user_agent: user_agent.to_string(),
        })
    }

    /// The string the response cache is keyed on
    ///
    /// Only the URL takes part; the user agent does not change the response.
    pub fn cache_key(&self) -> &str {
        self.url.as_str()
    }
}
