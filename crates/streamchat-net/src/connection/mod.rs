//! The resilient streaming connection manager.
//!
//! A [`ConnectionManager`] owns at most one transport to the chat backend at
//! a time. It connects on construction, reconnects after unexpected closes
//! with a fixed delay and a bounded attempt budget, abandons attempts that do
//! not open within the attempt timeout, and buffers outbound messages while
//! the connection (or the backend behind it) is unavailable. Inbound frames
//! are decoded and fanned out to message and error observers.
//!
//! # Example
//!
//! ```no_run
//! use streamchat_net::{ConnectionConfig, ConnectionManager};
//!
//! # async fn demo() -> streamchat_net::Result<()> {
//! let manager = ConnectionManager::new(ConnectionConfig::from_env()?);
//!
//! manager.on_message(|chunk| print!("{chunk}"));
//! manager.on_error(|err| eprintln!("chat error: {err}"));
//!
//! manager.send_message("What is the refund policy?")?;
//! # Ok(())
//! # }
//! ```

mod config;
mod manager;
mod state;
mod timer;

pub use config::{ConnectionConfig, ReconnectPolicy, DEFAULT_CONNECT_TIMEOUT, DEFAULT_URL, URL_ENV_VAR};
pub use manager::ConnectionManager;
pub use state::{BackendReadiness, ConnectionState, Lifecycle, Status};

use tokio::sync::oneshot;

use crate::transport::TransportEvent;
use timer::TimerKind;

/// Input to the manager's event loop.
#[derive(Debug)]
pub(crate) enum ManagerEvent {
    /// `send_message` from the handle.
    Send(String),
    /// Terminal teardown.
    Disconnect,
    /// Snapshot request.
    Status(oneshot::Sender<Status>),
    /// Something happened on a transport.
    Transport { generation: u64, event: TransportEvent },
    /// A timer expired.
    TimerFired { id: u64, kind: TimerKind },
}

impl ManagerEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Send(_) => "send",
            Self::Disconnect => "disconnect",
            Self::Status(_) => "status",
            Self::Transport { .. } => "transport",
            Self::TimerFired { .. } => "timer",
        }
    }
}
