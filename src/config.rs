//! Client configuration
//!
//! Settings can come from a TOML file, from command-line flags, or both.
//! Every field has a default, so a partial file (or none at all) is fine.

use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::cache::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_EXPIRATION};
use crate::dispatch::{DEFAULT_REQUESTS_PER_SECOND, DEFAULT_REQUEST_TIMEOUT};
use crate::request::{ApiEndpoint, DEFAULT_API_URL, DEFAULT_LANGUAGE, DEFAULT_USER_AGENT};

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has wrong field types
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings for a `WikiClient`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Language prefix substituted into `api_url`
    pub language: String,
    /// API URL template, `{lang}` is replaced by `language`
    pub api_url: String,
    /// `User-Agent` header sent with every request
    pub user_agent: String,
    /// Maximum number of cached responses (0 disables caching)
    pub cache_capacity: usize,
    /// How long a cached response stays fresh, in seconds
    pub cache_expiration_secs: u64,
    /// Outbound request ceiling (0 disables throttling)
    pub requests_per_second: u32,
    /// Per-request deadline, in seconds
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_expiration_secs: DEFAULT_CACHE_EXPIRATION.as_secs(),
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl ClientConfig {
    /// Parses a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reads the file at the default location, falling back to defaults if
    /// there is no such file
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// XDG-compliant config file location
    ///
    /// `~/.config/wikiquery/config.toml` on Linux. Returns `None` if no home
    /// directory can be determined.
    pub fn default_path() -> Option<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "wikiquery")?;
        Some(project_dirs.config_dir().join("config.toml"))
    }

    /// The API endpoint these settings point at
    pub fn endpoint(&self) -> ApiEndpoint {
        ApiEndpoint::new(self.api_url.clone(), self.language.clone())
    }

    pub fn cache_expiration(&self) -> Duration {
        Duration::from_secs(self.cache_expiration_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
