//! In-process transport driven by hand.
//!
//! [`MemoryConnector`] records every transport the manager opens as a
//! [`MemoryLink`]. The link plays the server side: it decides when the
//! transport opens, pushes inbound frames, reports errors and closes, and
//! records every frame the manager sent.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{CloseReason, Connector, Transport, TransportEvent, TransportEvents};
use crate::connection::ConnectionConfig;
use crate::error::{ChatError, Result};

#[derive(Default)]
struct ConnectorState {
    links: Vec<MemoryLink>,
    auto_open: bool,
}

/// Connector producing in-memory transports.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MemoryConnector {
    /// Create a connector whose transports stay in the connecting state until
    /// [`MemoryLink::open`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connector whose transports open as soon as they are created.
    pub fn auto_open() -> Self {
        let connector = Self::default();
        connector.state.lock().auto_open = true;
        connector
    }

    /// Number of transports opened so far.
    pub fn connect_count(&self) -> usize {
        self.state.lock().links.len()
    }

    /// All links, oldest first.
    pub fn links(&self) -> Vec<MemoryLink> {
        self.state.lock().links.clone()
    }

    /// The link at `index` (0 = first connection attempt).
    pub fn link(&self, index: usize) -> Option<MemoryLink> {
        self.state.lock().links.get(index).cloned()
    }

    /// The most recently created link.
    pub fn last_link(&self) -> Option<MemoryLink> {
        self.state.lock().links.last().cloned()
    }
}

impl std::fmt::Debug for MemoryConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnector")
            .field("connect_count", &self.connect_count())
            .finish()
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, config: &ConnectionConfig, events: TransportEvents) -> Box<dyn Transport> {
        let link = MemoryLink {
            shared: Arc::new(LinkShared {
                url: config.url().to_string(),
                events,
                state: Mutex::new(LinkState::default()),
            }),
        };

        let auto_open = {
            let mut state = self.state.lock();
            state.links.push(link.clone());
            state.auto_open
        };
        if auto_open {
            link.open();
        }

        Box::new(MemoryTransport { link })
    }
}

#[derive(Default)]
struct LinkState {
    sent: Vec<String>,
    closed_by_client: bool,
    closed: bool,
    fail_sends: bool,
}

struct LinkShared {
    url: String,
    events: TransportEvents,
    state: Mutex<LinkState>,
}

/// Server-side view of one in-memory transport.
#[derive(Clone)]
pub struct MemoryLink {
    shared: Arc<LinkShared>,
}

impl MemoryLink {
    /// The URL the manager connected to.
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// The transport generation assigned by the manager.
    pub fn generation(&self) -> u64 {
        self.shared.events.generation()
    }

    /// Complete the handshake.
    pub fn open(&self) {
        self.shared.events.opened();
    }

    /// Deliver an inbound text frame.
    pub fn push_text(&self, payload: impl Into<String>) {
        self.shared.events.text(payload);
    }

    /// Deliver an inbound binary frame.
    pub fn push_binary(&self, payload: impl Into<Vec<u8>>) {
        self.shared.events.report(TransportEvent::Binary(payload.into()));
    }

    /// Report a transport error.
    pub fn fail(&self, error: ChatError) {
        self.shared.events.error(error);
    }

    /// Close from the server side (or simulate a dropped connection).
    pub fn close(&self, reason: Option<CloseReason>) {
        let first = {
            let mut state = self.shared.state.lock();
            !std::mem::replace(&mut state.closed, true)
        };
        if first {
            self.shared.events.closed(reason);
        }
    }

    /// Make subsequent sends fail (or succeed again).
    pub fn set_fail_sends(&self, fail: bool) {
        self.shared.state.lock().fail_sends = fail;
    }

    /// Raw frames sent by the manager, in order.
    pub fn sent(&self) -> Vec<String> {
        self.shared.state.lock().sent.clone()
    }

    /// The `query` field of every frame sent by the manager, in order.
    pub fn sent_queries(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|frame| serde_json::from_str::<serde_json::Value>(frame).ok())
            .filter_map(|value| value.get("query")?.as_str().map(str::to_string))
            .collect()
    }

    /// Whether the manager asked this transport to close.
    pub fn is_closed_by_client(&self) -> bool {
        self.shared.state.lock().closed_by_client
    }

    /// Whether this transport has closed, from either side.
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }
}

impl std::fmt::Debug for MemoryLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLink")
            .field("url", &self.shared.url)
            .field("generation", &self.generation())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Client-side handle given to the manager.
struct MemoryTransport {
    link: MemoryLink,
}

impl Transport for MemoryTransport {
    fn send_text(&mut self, frame: String) -> Result<()> {
        let mut state = self.link.shared.state.lock();
        if state.closed {
            return Err(ChatError::Send("transport is closed".into()));
        }
        if state.fail_sends {
            return Err(ChatError::Send("simulated send failure".into()));
        }
        state.sent.push(frame);
        Ok(())
    }

    fn close(&mut self) {
        self.link.shared.state.lock().closed_by_client = true;
        self.link.close(Some(CloseReason::normal()));
    }
}
