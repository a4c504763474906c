//! Client configuration loaded from environment variables.
//!
//! Every knob has a default matching the backend's observed behavior; only
//! the API base URL is required.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Seconds before expiry at which a token counts as "expiring".
pub const DEFAULT_REFRESH_BUFFER_SECS: i64 = 30;

/// Background monitor polling cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Consecutive authorization failures before the circuit opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Wall-clock window after which the failure counter resets.
pub const DEFAULT_FAILURE_WINDOW: Duration = Duration::from_secs(60);

/// Client configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the forum REST backend, e.g. `https://forum.example.com/api`.
    pub base_url: String,
    /// Durable credential file. `None` keeps credentials in memory only.
    pub credentials_path: Option<PathBuf>,
    /// Buffer before expiry at which the interceptors refresh proactively.
    pub refresh_buffer_secs: i64,
    /// Background monitor polling cadence.
    pub poll_interval: Duration,
    /// Consecutive authorization failures before forced logout.
    pub failure_threshold: u32,
    /// Wall-clock window after which the failure counter resets.
    pub failure_window: Duration,
    /// Per-request timeout. Also bounds the refresh call, so a hung refresh
    /// cannot stall waiters forever.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            credentials_path: None,
            refresh_buffer_secs: DEFAULT_REFRESH_BUFFER_SECS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            failure_window: DEFAULT_FAILURE_WINDOW,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Build a config for the given backend base URL with default tuning.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// `FORUM_API_URL` is required; everything else falls back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = Self::default();

        Ok(Self {
            base_url: env::var("FORUM_API_URL").map_err(|_| ConfigError::Missing("FORUM_API_URL"))?,
            credentials_path: env::var("FORUM_CREDENTIALS_PATH").ok().map(PathBuf::from),
            refresh_buffer_secs: env::var("FORUM_REFRESH_BUFFER_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.refresh_buffer_secs),
            poll_interval: env::var("FORUM_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            failure_threshold: env::var("FORUM_FAILURE_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.failure_threshold),
            failure_window: env::var("FORUM_FAILURE_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.failure_window),
            request_timeout: env::var("FORUM_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
