//! File-based configuration.
//!
//! A chat client is configured from a TOML file. Every key is optional:
//!
//! ```toml
//! [connection]
//! url = "wss://chat.example.com/ws"
//! connect_timeout_ms = 10000
//! max_reconnect_attempts = 5
//! reconnect_delay_ms = 2000
//!
//! [connection.headers]
//! Authorization = "Bearer secret"
//!
//! [conversation]
//! greeting = "Hi! Ask me anything."
//! suggested_questions = ["What can you do?"]
//! ```
//!
//! The `STREAMCHAT_WS_URL` environment variable overrides `connection.url`
//! when [`ChatConfig::with_env_overrides`] is applied.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use streamchat_net::connection::{DEFAULT_URL, URL_ENV_VAR};
use streamchat_net::{ConnectionConfig, ReconnectPolicy};

use crate::error::ConfigError;

/// Complete client configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub connection: ConnectionSettings,
    pub conversation: ConversationSettings,
}

/// `[connection]` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Backend endpoint (`ws://` or `wss://`).
    pub url: String,
    /// How long one connection attempt may take, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Reconnect budget after unexpected closes.
    pub max_reconnect_attempts: u32,
    /// Fixed delay before a scheduled reconnect, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Extra handshake headers.
    pub headers: BTreeMap<String, String>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            url: DEFAULT_URL.to_string(),
            connect_timeout_ms: streamchat_net::connection::DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            max_reconnect_attempts: policy.max_attempts,
            reconnect_delay_ms: policy.delay.as_millis() as u64,
            headers: BTreeMap::new(),
        }
    }
}

/// `[conversation]` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSettings {
    /// First assistant message shown in a new conversation.
    pub greeting: String,
    /// Follow-up prompts offered with the greeting.
    pub suggested_questions: Vec<String>,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            greeting: "Hello! I'm your assistant. How can I help you today?".to_string(),
            suggested_questions: vec![
                "What can you help me with?".to_string(),
                "How do I get started?".to_string(),
                "Where can I find more information?".to_string(),
            ],
        }
    }
}

impl ChatConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded chat config");
        Self::from_toml_str(&text)
    }

    /// Serialize to TOML text.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply environment overrides (`STREAMCHAT_WS_URL`).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(URL_ENV_VAR) {
            let url = url.trim();
            if !url.is_empty() {
                tracing::debug!(url, "endpoint overridden from environment");
                self.connection.url = url.to_string();
            }
        }
        self
    }

    /// Build the connection manager configuration.
    pub fn connection_config(&self) -> Result<ConnectionConfig, ConfigError> {
        let settings = &self.connection;
        let config = ConnectionConfig::new(&settings.url)?
            .connect_timeout(Duration::from_millis(settings.connect_timeout_ms))
            .reconnect_policy(
                ReconnectPolicy::new()
                    .max_attempts(settings.max_reconnect_attempts)
                    .delay(Duration::from_millis(settings.reconnect_delay_ms)),
            )
            .headers_from(settings.headers.clone());
        Ok(config)
    }
}
