//! Logging facilities for streamchat.
//!
//! streamchat uses the `tracing` crate for instrumentation. To see logs,
//! install a subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("streamchat_net=debug")
//!     .init();
//! ```
//!
//! Every subsystem logs under one of the [`targets`] below, so a filter such as
//! `streamchat_net::connection=info,streamchat_net::transport=debug` can be
//! used to focus on the connection state machine.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/observer system target.
    pub const SIGNAL: &str = "streamchat_core::signal";
    /// Connection manager state machine target.
    pub const CONNECTION: &str = "streamchat_net::connection";
    /// Transport (socket I/O) target.
    pub const TRANSPORT: &str = "streamchat_net::transport";
    /// Wire protocol decode target.
    pub const PROTOCOL: &str = "streamchat_net::protocol";
    /// Conversation layer target.
    pub const CONVERSATION: &str = "streamchat::conversation";
}

/// Span names used throughout streamchat for tracing.
pub mod span_names {
    /// One pass of the connection manager event loop.
    pub const MANAGER_EVENT: &str = "streamchat::manager_event";
    /// Observer fan-out.
    pub const SIGNAL: &str = "streamchat::signal";
}
