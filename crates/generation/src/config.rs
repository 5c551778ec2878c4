use std::str::FromStr;
use std::time::Duration;

use studio_backend::reconnect::ReconnectPolicy;

use crate::error::ConfigError;

/// Client configuration loaded from environment variables.
///
/// All fields have defaults matching a backend running locally on its
/// standard port.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base HTTP URL of the backend (default: `http://127.0.0.1:8000`).
    pub api_url: String,
    /// Base WebSocket URL of the backend (default: `ws://127.0.0.1:8000`).
    pub ws_url: String,
    /// Timeout for each REST request (default: 300 s; generation calls
    /// may block until the job finishes).
    pub request_timeout: Duration,
    /// Stream reconnects before a job is reported failed (default: `5`).
    pub max_reconnect_attempts: u32,
    /// How long a notification stays listed (default: 5 s). Zero keeps
    /// notifications until they are removed.
    pub notification_ttl: Duration,
    /// Number of finished results kept in the recent list (default: `10`).
    pub recent_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000".into(),
            ws_url: "ws://127.0.0.1:8000".into(),
            request_timeout: Duration::from_secs(300),
            max_reconnect_attempts: studio_backend::reconnect::MAX_RECONNECT_ATTEMPTS,
            notification_ttl: Duration::from_secs(5),
            recent_limit: 10,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                 |
    /// |---------------------------------|-------------------------|
    /// | `STUDIO_API_URL`                | `http://127.0.0.1:8000` |
    /// | `STUDIO_WS_URL`                 | `ws://127.0.0.1:8000`   |
    /// | `STUDIO_REQUEST_TIMEOUT_SECS`   | `300`                   |
    /// | `STUDIO_MAX_RECONNECT_ATTEMPTS` | `5`                     |
    /// | `STUDIO_NOTIFICATION_TTL_SECS`  | `5`                     |
    /// | `STUDIO_RECENT_LIMIT`           | `10`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url = lookup("STUDIO_API_URL").unwrap_or(defaults.api_url);
        let ws_url = lookup("STUDIO_WS_URL").unwrap_or(defaults.ws_url);

        let request_timeout = parse_var(&lookup, "STUDIO_REQUEST_TIMEOUT_SECS", "a valid u64")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let max_reconnect_attempts =
            parse_var(&lookup, "STUDIO_MAX_RECONNECT_ATTEMPTS", "a valid u32")?
                .unwrap_or(defaults.max_reconnect_attempts);

        let notification_ttl = parse_var(&lookup, "STUDIO_NOTIFICATION_TTL_SECS", "a valid u64")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.notification_ttl);

        let recent_limit = parse_var(&lookup, "STUDIO_RECENT_LIMIT", "a valid usize")?
            .unwrap_or(defaults.recent_limit);

        Ok(Self {
            api_url,
            ws_url,
            request_timeout,
            max_reconnect_attempts,
            notification_ttl,
            recent_limit,
        })
    }

    /// Stream reconnection policy with this config's attempt budget.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_reconnect_attempts,
            ..ReconnectPolicy::default()
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                var,
                expected,
                value,
            }),
    }
}
