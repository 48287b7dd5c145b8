//! Networking for streamchat.
//!
//! This crate keeps one long-lived WebSocket connection to a chat backend
//! that streams its replies token by token:
//!
//! - **Connection manager**: connect, reconnect, attempt timeouts, outbound
//!   queueing and observer fan-out ([`ConnectionManager`])
//! - **Wire protocol**: `{"query": ...}` out; `content` / `error` envelopes or
//!   plain text in ([`protocol`])
//! - **Transports**: the [`Connector`] seam with a tokio-tungstenite
//!   implementation and an in-memory one for tests
//!
//! # Streaming
//!
//! Each inbound content chunk is delivered to `on_message` observers as it
//! arrives. A chunk equal to [`END_OF_STREAM`] marks the end of one response.
//!
//! ```no_run
//! use streamchat_net::{ConnectionConfig, ConnectionManager, END_OF_STREAM};
//!
//! # async fn demo() -> streamchat_net::Result<()> {
//! let manager = ConnectionManager::new(ConnectionConfig::default());
//! manager.on_message(|chunk| {
//!     if chunk == END_OF_STREAM {
//!         println!();
//!     } else {
//!         print!("{chunk}");
//!     }
//! });
//! manager.send_message("hello")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Backend faults
//!
//! A backend error mentioning its vector store or embedding index is an
//! initialization fault ([`ErrorKind::BackendInitialization`]). The manager
//! then holds outbound messages and reconnects before sending them.

pub mod connection;
mod error;
pub mod protocol;
pub mod transport;

pub use connection::{
    BackendReadiness, ConnectionConfig, ConnectionManager, ConnectionState, Lifecycle,
    ReconnectPolicy, Status,
};
pub use error::{BackendFault, ChatError, ErrorKind, Result};
pub use protocol::END_OF_STREAM;
pub use transport::{CloseCode, CloseReason, Connector, MemoryConnector, MemoryLink, WebSocketConnector};
