//! Configuration for the connection manager.

use std::collections::HashMap;
use std::time::Duration;

use url::Url;

use crate::error::{ChatError, Result};

/// Endpoint used when none is configured.
pub const DEFAULT_URL: &str = "ws://127.0.0.1:8000/ws";

/// Environment variable overriding the endpoint in [`ConnectionConfig::from_env`].
pub const URL_ENV_VAR: &str = "STREAMCHAT_WS_URL";

/// Default time a single connection attempt may take before it is abandoned.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Policy for automatic reconnection after an unexpected close.
///
/// The delay is fixed; there is no backoff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Maximum number of automatic attempts before giving up.
    pub max_attempts: u32,
    /// Delay before a scheduled reconnect.
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

impl ReconnectPolicy {
    /// Create a policy with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of reconnection attempts.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the delay before a scheduled reconnect.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Disable automatic reconnection.
    pub fn disabled() -> Self {
        Self::default().max_attempts(0)
    }
}

/// Configuration of one [`ConnectionManager`](super::ConnectionManager).
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    url: Url,
    headers: HashMap<String, String>,
    connect_timeout: Duration,
    reconnect: ReconnectPolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            headers: HashMap::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ConnectionConfig {
    /// Create a configuration for `url`, which must be a `ws://` or `wss://` URL.
    pub fn new(url: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            url: parse_endpoint(url.as_ref())?,
            ..Self::default()
        })
    }

    /// Default configuration, with the endpoint taken from `STREAMCHAT_WS_URL`
    /// when that variable is set and non-empty.
    pub fn from_env() -> Result<Self> {
        match std::env::var(URL_ENV_VAR) {
            Ok(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Ok(Self::default()),
        }
    }

    /// Add a custom header for the handshake.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add multiple headers.
    pub fn headers_from(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Set the per-attempt connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the reconnection policy.
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// The endpoint.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Handshake headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// The per-attempt connection timeout.
    pub fn timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// The reconnection policy.
    pub fn reconnect(&self) -> ReconnectPolicy {
        self.reconnect
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        scheme => Err(ChatError::InvalidUrl(format!(
            "unsupported scheme `{scheme}`, expected ws or wss"
        ))),
    }
}

fn default_url() -> Url {
    Url::parse(DEFAULT_URL).unwrap_or_else(|_| unreachable!("default endpoint is valid"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.url().as_str(), DEFAULT_URL);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.reconnect().max_attempts, 5);
        assert_eq!(config.reconnect().delay, Duration::from_secs(2));
        assert!(config.headers().is_empty());
    }

    #[test]
    fn test_builder() {
        let config = ConnectionConfig::new("wss://chat.example.com/ws")
            .unwrap()
            .connect_timeout(Duration::from_secs(3))
            .reconnect_policy(
                ReconnectPolicy::new()
                    .max_attempts(2)
                    .delay(Duration::from_millis(500)),
            )
            .header("X-Client", "streamchat");

        assert_eq!(config.url().scheme(), "wss");
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.reconnect().max_attempts, 2);
        assert_eq!(config.reconnect().delay, Duration::from_millis(500));
        assert_eq!(
            config.headers().get("X-Client").map(String::as_str),
            Some("streamchat")
        );
    }

    #[test]
    fn test_rejects_non_websocket_scheme() {
        let err = ConnectionConfig::new("http://localhost:8000/ws").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("http"));

        let err = ConnectionConfig::new("not a url").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_disabled_policy() {
        assert_eq!(ReconnectPolicy::disabled().max_attempts, 0);
    }
}
