//! wikiquery library
//!
//! A client for MediaWiki-style APIs that keeps to API etiquette: every call
//! goes through a bounded response cache and a shared request throttle, and
//! carries a configurable user agent.

pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod request;

pub use cache::{CacheLookup, RequestCache};
pub use client::{WikiClient, WikiError};
pub use config::{ClientConfig, ConfigError};
pub use dispatch::{Dispatcher, FetchError, HttpTransport, Throttle, Transport, TransportResponse};
pub use request::{ApiEndpoint, OutboundRequest, QueryParams};
