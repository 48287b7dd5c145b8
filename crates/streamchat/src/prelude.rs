//! Commonly used types:
//!
//! ```ignore
//! use streamchat::prelude::*;
//! ```

pub use crate::config::ChatConfig;
pub use crate::conversation::{ChatMessage, Conversation, MessageId, Role};
pub use crate::error::{ConfigError, ConversationError};
pub use streamchat_core::{ConnectionId, Signal};
pub use streamchat_net::{
    ChatError, ConnectionConfig, ConnectionManager, ConnectionState, ErrorKind, ReconnectPolicy,
    END_OF_STREAM,
};
