//! Error types for the networking module.

use std::time::Duration;

use thiserror::Error;

/// Classification of a backend-reported error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendFault {
    /// The backend's data layer (vector store, embedding index) is not initialized.
    ///
    /// Outbound messages are queued until a fresh connection is established.
    Initialization,
    /// Any other error reported by the backend.
    Generic,
}

/// Coarse error kind, used by consumers to pick a user-facing message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The transport could not be established.
    TransportOpenFailure,
    /// The transport reported an I/O or protocol error.
    TransportFailure,
    /// A connection attempt did not open within the attempt timeout.
    TransportTimeout,
    /// An open transport was closed unexpectedly.
    TransportClosed,
    /// An outbound frame could not be serialized or transmitted.
    SendFailure,
    /// The backend reported an initialization (data-layer) fault.
    BackendInitialization,
    /// The backend reported any other error.
    BackendGeneric,
    /// The reconnect budget is exhausted; no further attempts will be made.
    ReconnectExhausted,
    /// Invalid configuration.
    Config,
    /// The connection manager is no longer running.
    Stopped,
}

/// Errors produced by the connection manager and its transports.
///
/// Errors delivered to observers are cloned for every observer, so every
/// variant carries owned, cloneable data.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    /// Could not establish the connection.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Transport-level error on an established (or establishing) connection.
    #[error("transport error: {0}")]
    Transport(String),

    /// The connection attempt exceeded the attempt timeout.
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The connection was closed unexpectedly.
    #[error("connection closed (code {code:?}, reason {reason:?})")]
    Closed {
        /// Close code, when the peer sent a close frame.
        code: Option<u16>,
        /// Close reason, when the peer supplied one.
        reason: Option<String>,
    },

    /// An outbound message could not be serialized or transmitted.
    #[error("failed to send message: {0}")]
    Send(String),

    /// An error reported by the backend in a structured frame.
    #[error("server error: {message}")]
    Backend {
        /// How the error was classified.
        fault: BackendFault,
        /// The error text exactly as sent by the backend.
        message: String,
    },

    /// Automatic reconnection gave up after the configured number of attempts.
    #[error("gave up reconnecting after {attempts} attempts")]
    ReconnectExhausted {
        /// The configured attempt budget.
        attempts: u32,
    },

    /// The configured endpoint is not a valid `ws://` or `wss://` URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid handshake header name or value.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The connection manager task has stopped.
    #[error("connection manager is not running")]
    Stopped,
}

impl ChatError {
    /// Build a backend error, classifying its text.
    pub fn backend(message: impl Into<String>) -> Self {
        let message = message.into();
        let fault = crate::protocol::classify_backend_error(&message);
        Self::Backend { fault, message }
    }

    /// The coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connect(_) => ErrorKind::TransportOpenFailure,
            Self::Transport(_) => ErrorKind::TransportFailure,
            Self::Timeout(_) => ErrorKind::TransportTimeout,
            Self::Closed { .. } => ErrorKind::TransportClosed,
            Self::Send(_) => ErrorKind::SendFailure,
            Self::Backend {
                fault: BackendFault::Initialization,
                ..
            } => ErrorKind::BackendInitialization,
            Self::Backend {
                fault: BackendFault::Generic,
                ..
            } => ErrorKind::BackendGeneric,
            Self::ReconnectExhausted { .. } => ErrorKind::ReconnectExhausted,
            Self::InvalidUrl(_) | Self::InvalidHeader(_) => ErrorKind::Config,
            Self::Stopped => ErrorKind::Stopped,
        }
    }

    /// Whether this is a backend initialization fault.
    pub fn is_initialization_fault(&self) -> bool {
        self.kind() == ErrorKind::BackendInitialization
    }
}

impl From<url::ParseError> for ChatError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for ChatError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for ChatError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

/// A specialized Result type for streamchat network operations.
pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_classification() {
        let err = ChatError::backend("FAISS index 0 is out of bounds");
        assert_eq!(err.kind(), ErrorKind::BackendInitialization);
        assert!(err.is_initialization_fault());

        let err = ChatError::backend("rate limited");
        assert_eq!(err.kind(), ErrorKind::BackendGeneric);
        assert!(!err.is_initialization_fault());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ChatError::Closed {
                code: Some(1006),
                reason: None
            }
            .to_string(),
            "connection closed (code Some(1006), reason None)"
        );
        assert_eq!(
            ChatError::Closed {
                code: Some(1001),
                reason: Some("going away".into())
            }
            .to_string(),
            "connection closed (code Some(1001), reason Some(\"going away\"))"
        );
        assert_eq!(
            ChatError::backend("boom").to_string(),
            "server error: boom"
        );
        assert_eq!(
            ChatError::ReconnectExhausted { attempts: 5 }.to_string(),
            "gave up reconnecting after 5 attempts"
        );
    }

    #[test]
    fn test_url_parse_error_conversion() {
        let err: ChatError = url::Url::parse("not a url").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
