//! Configuration surface for the session core.
//!
//! Two knobs, both environment-driven: the proxy endpoint override and the
//! verbose traffic-log flag. Everything else is injected at construction.

use crate::DEFAULT_PROXY_ENDPOINT;
use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::panic::Location;

use log::{info, warn};
use url::Url;

/// Environment variable overriding the proxy endpoint.
pub const PROXY_URL_ENV: &str = "ANALYSIS_PROXY_URL";

/// Environment variable enabling redacted traffic logs.
pub const TRAFFIC_LOG_ENV: &str = "ANALYSIS_TRAFFIC_LOG";

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub endpoint: Url,
    pub traffic_log: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(DEFAULT_PROXY_ENDPOINT).expect("default endpoint is well-formed"),
            traffic_log: false,
        }
    }
}

impl ProxyConfig {
    /// Load configuration from the process environment (with a `.env` pass).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] if an endpoint override is
    /// present but unparseable, or parses to a non-WebSocket scheme.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// `from_env` wires this to the process environment; tests supply a
    /// closure over fixed values.
    pub fn from_vars(fetch: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let endpoint = match fetch(PROXY_URL_ENV) {
            Some(raw) => Url::parse(&raw).map_err(|e| ConfigError::InvalidEndpoint {
                message: format!("{PROXY_URL_ENV}={raw}: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?,
            None => {
                info!("{PROXY_URL_ENV} not set, using default endpoint {DEFAULT_PROXY_ENDPOINT}");
                Url::parse(DEFAULT_PROXY_ENDPOINT)
                    .expect("default endpoint is well-formed")
            }
        };

        let config = Self {
            endpoint,
            traffic_log: fetch(TRAFFIC_LOG_ENV).map(|raw| parse_flag(&raw)).unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] for non ws/wss schemes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.endpoint.scheme() {
            "ws" | "wss" => Ok(()),
            other => Err(ConfigError::InvalidEndpoint {
                message: format!(
                    "unsupported scheme '{other}' in {} (expected ws or wss)",
                    self.endpoint
                ),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}

pub(crate) fn parse_flag(raw: &str) -> bool {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => true,
        "0" | "false" | "off" | "no" | "" => false,
        other => {
            warn!("unrecognized flag value '{other}', treating as disabled");
            false
        }
    }
}
