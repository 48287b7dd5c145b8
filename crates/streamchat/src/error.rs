//! Error types for configuration and the conversation layer.

use std::path::PathBuf;

use streamchat_net::ChatError;
use thiserror::Error;

/// Errors loading or converting a [`ChatConfig`](crate::config::ChatConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid TOML or has the wrong shape.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be written as TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The connection settings were rejected (bad URL, for example).
    #[error("invalid connection settings: {0}")]
    Connection(#[from] ChatError),
}

/// Errors returned by [`Conversation::submit`](crate::conversation::Conversation::submit).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    /// The message was empty after trimming whitespace.
    #[error("message is empty")]
    EmptyMessage,

    /// The previous response has not finished streaming yet.
    #[error("a response is still streaming")]
    ResponseInProgress,

    /// The connection manager rejected the message.
    #[error(transparent)]
    Connection(#[from] ChatError),
}
