//! Transport seam between the connection manager and the socket.
//!
//! A [`Connector`] opens a transport without blocking and returns a
//! [`Transport`] handle immediately. Everything that happens afterwards
//! (open, inbound frames, errors, close) is reported asynchronously through
//! the [`TransportEvents`] sink the connector was given, mirroring the
//! event-callback model of a browser WebSocket.
//!
//! Two connectors ship with the crate:
//!
//! - [`WebSocketConnector`]: tokio-tungstenite client, used in production
//! - [`MemoryConnector`]: in-process transport driven by hand, for tests and demos

mod memory;
mod websocket;

pub use memory::{MemoryConnector, MemoryLink};
pub use websocket::WebSocketConnector;

use tokio::sync::mpsc::WeakUnboundedSender;

use crate::connection::{ConnectionConfig, ManagerEvent};
use crate::error::{ChatError, Result};

/// Standard WebSocket close codes as defined in RFC 6455.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CloseCode {
    /// Normal closure; the connection successfully completed.
    #[default]
    Normal,
    /// Endpoint is going away (e.g., server shutting down).
    Away,
    /// Protocol error occurred.
    Protocol,
    /// No status code was provided.
    NoStatus,
    /// Connection was closed abnormally (no close frame received).
    Abnormal,
    /// Policy violation.
    Policy,
    /// Unexpected condition prevented the request from being fulfilled.
    Error,
    /// Server is restarting.
    Restart,
    /// Server is too busy; try again later.
    Again,
    /// Any other close code.
    Other(u16),
}

impl CloseCode {
    /// Convert to the numeric close code.
    pub fn as_u16(&self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::Away => 1001,
            Self::Protocol => 1002,
            Self::NoStatus => 1005,
            Self::Abnormal => 1006,
            Self::Policy => 1008,
            Self::Error => 1011,
            Self::Restart => 1012,
            Self::Again => 1013,
            Self::Other(code) => *code,
        }
    }

    /// Create from a numeric close code.
    pub fn from_u16(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 => Self::Away,
            1002 => Self::Protocol,
            1005 => Self::NoStatus,
            1006 => Self::Abnormal,
            1008 => Self::Policy,
            1011 => Self::Error,
            1012 => Self::Restart,
            1013 => Self::Again,
            code => Self::Other(code),
        }
    }
}

/// Reason a transport closed, when the peer supplied a close frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CloseReason {
    /// The close status code.
    pub code: CloseCode,
    /// Optional human-readable reason string.
    pub reason: Option<String>,
}

impl CloseReason {
    /// Create a close reason with just a code.
    pub fn new(code: CloseCode) -> Self {
        Self { code, reason: None }
    }

    /// Create a close reason with a code and message.
    pub fn with_reason(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: Some(reason.into()),
        }
    }

    /// Create a normal close reason.
    pub fn normal() -> Self {
        Self::new(CloseCode::Normal)
    }
}

/// An event reported by a transport.
#[derive(Clone, Debug)]
pub enum TransportEvent {
    /// The transport reached the open state.
    Opened,
    /// An inbound text frame.
    Text(String),
    /// An inbound binary frame.
    Binary(Vec<u8>),
    /// A transport-level error. Does not imply the transport closed.
    Error(ChatError),
    /// The transport closed. This is always the last event of a transport.
    Closed(Option<CloseReason>),
}

/// Sink through which a transport reports its events to the manager.
///
/// Each sink is bound to one transport generation; the manager discards
/// events from generations it has since replaced. The sink does not keep the
/// manager alive: once the manager is gone, reporting becomes a no-op.
#[derive(Clone, Debug)]
pub struct TransportEvents {
    generation: u64,
    tx: WeakUnboundedSender<ManagerEvent>,
}

impl TransportEvents {
    pub(crate) fn new(generation: u64, tx: WeakUnboundedSender<ManagerEvent>) -> Self {
        Self { generation, tx }
    }

    /// The transport generation this sink reports for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report an event. Returns `false` if the manager is gone.
    pub fn report(&self, event: TransportEvent) -> bool {
        match self.tx.upgrade() {
            Some(tx) => tx
                .send(ManagerEvent::Transport {
                    generation: self.generation,
                    event,
                })
                .is_ok(),
            None => false,
        }
    }

    /// Report that the transport opened.
    pub fn opened(&self) -> bool {
        self.report(TransportEvent::Opened)
    }

    /// Report an inbound text frame.
    pub fn text(&self, payload: impl Into<String>) -> bool {
        self.report(TransportEvent::Text(payload.into()))
    }

    /// Report a transport error.
    pub fn error(&self, error: ChatError) -> bool {
        self.report(TransportEvent::Error(error))
    }

    /// Report that the transport closed.
    pub fn closed(&self, reason: Option<CloseReason>) -> bool {
        self.report(TransportEvent::Closed(reason))
    }
}

/// Opens transports to the chat backend.
pub trait Connector: Send + Sync + 'static {
    /// Begin opening a transport to `config.url()`.
    ///
    /// Must not block. The returned handle is usable immediately; sends made
    /// before the transport opens may fail. Progress is reported via `events`.
    fn connect(&self, config: &ConnectionConfig, events: TransportEvents) -> Box<dyn Transport>;
}

/// Handle to one live transport.
///
/// Dropping the handle releases the transport; its remaining events may still
/// arrive but are ignored by the manager.
pub trait Transport: Send {
    /// Transmit one text frame.
    fn send_text(&mut self, frame: String) -> Result<()>;

    /// Request a graceful close. A [`TransportEvent::Closed`] follows.
    fn close(&mut self);
}
