//! Client configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the client can start with zero
//! configuration against a local development backend.

use std::path::PathBuf;
use std::time::Duration;

use brillprime_shared::constants::{DEFAULT_API_URL, DEFAULT_WS_URL, REQUEST_TIMEOUT_SECS};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API.
    /// Env: `BRILLPRIME_API_URL`
    /// Default: `http://localhost:3000/api`
    pub api_url: String,

    /// WebSocket endpoint for push events.
    /// Env: `BRILLPRIME_WS_URL`
    /// Default: `ws://localhost:3000/ws`
    pub ws_url: String,

    /// Override for the local database directory (tests, sandboxes).
    /// Env: `BRILLPRIME_DATA_DIR`
    /// Default: the platform data directory.
    pub data_dir: Option<PathBuf>,

    /// Fixed outbound request deadline.
    /// Env: `BRILLPRIME_REQUEST_TIMEOUT_SECS`
    /// Default: 30 seconds.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            data_dir: None,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("BRILLPRIME_API_URL") {
            if let Some(url) = checked_url(value, "BRILLPRIME_API_URL") {
                config.api_url = url;
            }
        }

        if let Ok(value) = std::env::var("BRILLPRIME_WS_URL") {
            if let Some(url) = checked_url(value, "BRILLPRIME_WS_URL") {
                config.ws_url = url;
            }
        }

        if let Ok(path) = std::env::var("BRILLPRIME_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(path));
        }

        if let Ok(value) = std::env::var("BRILLPRIME_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = value.parse::<u64>() {
                config.request_timeout = Duration::from_secs(secs);
            } else {
                tracing::warn!(
                    value = %value,
                    "Invalid BRILLPRIME_REQUEST_TIMEOUT_SECS, using default"
                );
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Validate an URL-bearing environment value; a bad value keeps the default.
fn checked_url(value: String, var: &str) -> Option<String> {
    match url::Url::parse(&value) {
        Ok(_) => Some(value),
        Err(e) => {
            tracing::warn!(var, value = %value, error = %e, "Invalid URL, using default");
            None
        }
    }
}
