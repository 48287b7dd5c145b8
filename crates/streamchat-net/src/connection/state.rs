//! State enums and status snapshot for the connection manager.

/// Transport state as seen by the manager.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport exists.
    #[default]
    Disconnected,
    /// A transport is being opened.
    Connecting,
    /// The transport is open.
    Open,
    /// Teardown closed a live transport; its close has not arrived yet.
    Closing,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Closing => write!(f, "Closing"),
        }
    }
}

/// Whether the backend behind the transport is believed able to serve queries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendReadiness {
    /// Never confirmed, or lost when the transport closed.
    #[default]
    Unconfirmed,
    /// Confirmed when the transport opened.
    Ready,
    /// The backend reported an initialization fault. Outbound messages are
    /// queued until the next successful open.
    Faulted,
}

impl std::fmt::Display for BackendReadiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unconfirmed => write!(f, "Unconfirmed"),
            Self::Ready => write!(f, "Ready"),
            Self::Faulted => write!(f, "Faulted"),
        }
    }
}

/// Whether the manager may still connect on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Lifecycle {
    /// Normal operation.
    #[default]
    Active,
    /// `disconnect()` was called; automatic connection is permanently off.
    TornDown,
}

/// Point-in-time view of a connection manager.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Status {
    pub state: ConnectionState,
    pub readiness: BackendReadiness,
    pub lifecycle: Lifecycle,
    /// Attempts counted against the reconnect budget since the last open.
    pub reconnect_attempts: u32,
    /// Messages waiting in the outbound queue.
    pub queued: usize,
}

impl Status {
    /// Whether a message sent now would be transmitted immediately.
    pub fn can_send(&self) -> bool {
        self.state == ConnectionState::Open && self.readiness == BackendReadiness::Ready
    }
}
