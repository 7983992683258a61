//! Command-line interface parsing for wikiquery
//!
//! This module handles parsing of CLI arguments using clap: API query
//! parameters given as `KEY=VALUE` pairs plus flags that override the
//! configuration file.

use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::{ClientConfig, ConfigError};
use crate::request::QueryParams;

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// A query parameter was not of the form KEY=VALUE
    #[error("Invalid parameter: '{0}'. Expected KEY=VALUE (use KEY= for flags)")]
    InvalidParam(String),

    /// The configuration file could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// wikiquery - Query a MediaWiki API with caching and rate limiting
#[derive(Parser, Debug)]
#[command(name = "wikiquery")]
#[command(about = "Query a MediaWiki API politely: cached, throttled, with a proper user agent")]
#[command(version)]
pub struct Cli {
    /// Query parameters as KEY=VALUE pairs
    ///
    /// `action=query` and `format=json` are added unless given.
    ///
    /// Examples:
    ///   wikiquery list=search srsearch=rust srlimit=3
    ///   wikiquery prop=extracts explaintext= titles=Ferris
    #[arg(value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Language prefix of the wiki to query (e.g. en, fr, de)
    #[arg(long, value_name = "PREFIX")]
    pub lang: Option<String>,

    /// API URL template; `{lang}` is replaced by the language prefix
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// User-Agent header to send
    #[arg(long, value_name = "AGENT")]
    pub user_agent: Option<String>,

    /// Configuration file (defaults to the XDG config location)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Maximum number of cached responses
    #[arg(long, value_name = "N")]
    pub cache_capacity: Option<usize>,

    /// Maximum outbound requests per second (0 disables throttling)
    #[arg(long, value_name = "N")]
    pub rps: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Follow `continue` pagination for up to N responses
    #[arg(long, value_name = "N", conflicts_with = "raw")]
    pub continue_batches: Option<usize>,

    /// Print the raw response body instead of pretty JSON
    #[arg(long)]
    pub raw: bool,
}

/// Everything needed to run one invocation, derived from CLI arguments
#[derive(Debug, Clone)]
pub struct QueryPlan {
    /// Client settings after applying CLI overrides
    pub config: ClientConfig,
    /// Parameters of the query to run
    pub params: QueryParams,
    /// Number of continuation batches to follow, if any
    pub continue_batches: Option<usize>,
    /// Whether to print the body verbatim
    pub raw: bool,
}

/// Parses a `KEY=VALUE` argument into a parameter pair.
///
/// # Arguments
/// * `s` - The argument string from the CLI
///
/// # Returns
/// * `Ok((key, value))` if the argument has a non-empty key and an `=`
/// * `Err(CliError::InvalidParam)` otherwise
pub fn parse_param_arg(s: &str) -> Result<(String, String), CliError> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(CliError::InvalidParam(s.to_string())),
    }
}

impl QueryPlan {
    /// Creates a QueryPlan from parsed CLI arguments.
    ///
    /// Loads the configuration file given with `--config` (or the default
    /// one, if present) and applies the command-line overrides on top.
    ///
    /// # Returns
    /// * `Ok(QueryPlan)` with the merged settings
    /// * `Err(CliError)` if a parameter is malformed or the config is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let params = cli
            .params
            .iter()
            .map(|arg| parse_param_arg(arg))
            .collect::<Result<QueryParams, CliError>>()?;

        let mut config = match &cli.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::load_default()?,
        };
        cli.apply_overrides(&mut config);

        Ok(QueryPlan {
            config,
            params,
            continue_batches: cli.continue_batches,
            raw: cli.raw,
        })
    }
}

impl Cli {
    /// Overwrites config values with those given on the command line
    pub fn apply_overrides(&self, config: &mut ClientConfig) {
        if let Some(lang) = &self.lang {
            config.language = lang.clone();
        }
        if let Some(api_url) = &self.api_url {
            config.api_url = api_url.clone();
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        if let Some(capacity) = self.cache_capacity {
            config.cache_capacity = capacity;
        }
        if let Some(rps) = self.rps {
            config.requests_per_second = rps;
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = timeout;
        }
    }
}
