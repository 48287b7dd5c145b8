//! streamchat - a streaming chat client.
//!
//! This is the umbrella crate. It re-exports the observer registry from
//! `streamchat-core` and the connection manager from `streamchat-net`, and
//! adds file configuration and an in-memory conversation model.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use streamchat::prelude::*;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ChatConfig::load("streamchat.toml")?.with_env_overrides();
//! let manager = Arc::new(ConnectionManager::new(config.connection_config()?));
//! let conversation = Conversation::new(manager, &config.conversation);
//!
//! let answer = conversation.submit("How do I get started?")?;
//! conversation.response_finished().connect(move |id| {
//!     if *id == answer {
//!         println!("answer complete");
//!     }
//! });
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod conversation;
mod error;
pub mod prelude;

pub use streamchat_core::{logging, ConnectionGuard, ConnectionId, Signal};
pub use streamchat_net::{
    connection, protocol, transport, BackendFault, BackendReadiness, ChatError, CloseCode,
    CloseReason, ConnectionConfig, ConnectionManager, ConnectionState, Connector, ErrorKind,
    Lifecycle, MemoryConnector, MemoryLink, ReconnectPolicy, Status, WebSocketConnector,
    END_OF_STREAM,
};

pub use config::{ChatConfig, ConnectionSettings, ConversationSettings};
pub use conversation::{ChatMessage, Conversation, ErrorNotice, MessageId, Role};
pub use error::{ConfigError, ConversationError};
