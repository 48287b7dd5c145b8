//! Connection manager handle and its event loop.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::oneshot;
use url::Url;

use super::timer::{Timer, TimerKind};
use super::{BackendReadiness, ConnectionConfig, ConnectionState, Lifecycle, ManagerEvent, Status};
use crate::error::{ChatError, Result};
use crate::protocol::{self, InboundFrame};
use crate::transport::{
    CloseReason, Connector, Transport, TransportEvent, TransportEvents, WebSocketConnector,
};
use streamchat_core::logging::{span_names, targets};
use streamchat_core::{ConnectionGuard, ConnectionId, Signal};

/// State shared between the handle and the event loop.
struct Shared {
    url: Url,
    status: Mutex<Status>,
    on_message: Arc<Signal<String>>,
    on_error: Arc<Signal<ChatError>>,
}

/// Handle to a running connection manager.
///
/// Construction spawns the manager's event loop on the current tokio runtime
/// and starts the first connection attempt. Every operation on the handle is
/// queued to the event loop and handled in call order.
///
/// Dropping the handle tears the connection down, as [`disconnect`] does.
///
/// # Signals
///
/// - `on_message`: one content chunk (including the `[EOS]` marker)
/// - `on_error`: transport, timeout, send and backend errors
///
/// Observers run on the manager task, one event at a time. They may call back
/// into the manager; those calls are handled after the current event.
///
/// [`disconnect`]: ConnectionManager::disconnect
pub struct ConnectionManager {
    tx: UnboundedSender<ManagerEvent>,
    shared: Arc<Shared>,
}

impl ConnectionManager {
    /// Create a manager using the WebSocket connector.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_connector(config, Arc::new(WebSocketConnector::new()))
    }

    /// Create a manager using a custom connector.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_connector(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            url: config.url().clone(),
            status: Mutex::new(Status::default()),
            on_message: Arc::new(Signal::new()),
            on_error: Arc::new(Signal::new()),
        });

        let event_loop = EventLoop::new(config, connector, tx.downgrade(), shared.clone());
        tokio::spawn(event_loop.run(rx));

        Self { tx, shared }
    }

    /// Send `text` to the backend, or queue it until the connection is usable.
    ///
    /// Queued messages are transmitted in call order once a transport opens.
    /// Fails only if the manager's event loop is no longer running.
    pub fn send_message(&self, text: impl Into<String>) -> Result<()> {
        self.post(ManagerEvent::Send(text.into()))
    }

    /// Tear the connection down for good.
    ///
    /// Cancels pending timers, closes the transport, discards queued messages
    /// and disables automatic reconnection. Calling it again has no effect.
    pub fn disconnect(&self) {
        let _ = self.post(ManagerEvent::Disconnect);
    }

    /// Snapshot of the manager, taken after every earlier call on this handle
    /// and every transport event already delivered has been handled.
    pub async fn status(&self) -> Result<Status> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.post(ManagerEvent::Status(reply_tx))?;
        reply_rx.await.map_err(|_| ChatError::Stopped)
    }

    /// Register an observer for content chunks.
    pub fn on_message<F>(&self, observer: F) -> ConnectionId
    where
        F: Fn(&String) + Send + Sync + 'static,
    {
        self.shared.on_message.connect(observer)
    }

    /// Register an observer for errors.
    pub fn on_error<F>(&self, observer: F) -> ConnectionId
    where
        F: Fn(&ChatError) + Send + Sync + 'static,
    {
        self.shared.on_error.connect(observer)
    }

    /// Register a content observer that is removed when the guard drops.
    pub fn on_message_scoped<F>(&self, observer: F) -> ConnectionGuard<String>
    where
        F: Fn(&String) + Send + Sync + 'static,
    {
        self.shared.on_message.connect_scoped(observer)
    }

    /// Register an error observer that is removed when the guard drops.
    pub fn on_error_scoped<F>(&self, observer: F) -> ConnectionGuard<ChatError>
    where
        F: Fn(&ChatError) + Send + Sync + 'static,
    {
        self.shared.on_error.connect_scoped(observer)
    }

    /// Remove a content observer. Returns `false` if it was not registered.
    pub fn remove_message_observer(&self, id: ConnectionId) -> bool {
        self.shared.on_message.disconnect(id)
    }

    /// Remove an error observer. Returns `false` if it was not registered.
    pub fn remove_error_observer(&self, id: ConnectionId) -> bool {
        self.shared.on_error.disconnect(id)
    }

    /// The configured endpoint.
    pub fn url(&self) -> &Url {
        &self.shared.url
    }

    /// Transport state as of the last handled event.
    pub fn state(&self) -> ConnectionState {
        self.shared.status.lock().state
    }

    /// Backend readiness as of the last handled event.
    pub fn readiness(&self) -> BackendReadiness {
        self.shared.status.lock().readiness
    }

    /// Whether the transport was open as of the last handled event.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    fn post(&self, event: ManagerEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| ChatError::Stopped)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let _ = self.tx.send(ManagerEvent::Disconnect);
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.shared.url.as_str())
            .field("status", &*self.shared.status.lock())
            .finish()
    }
}

/// Owner of all connection state. Runs as a single task; every input arrives
/// as a [`ManagerEvent`] and is handled to completion before the next.
struct EventLoop {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    tx: WeakUnboundedSender<ManagerEvent>,
    shared: Arc<Shared>,

    state: ConnectionState,
    readiness: BackendReadiness,
    lifecycle: Lifecycle,
    attempts: u32,
    exhausted_reported: bool,
    queue: VecDeque<String>,

    transport: Option<Box<dyn Transport>>,
    generation: u64,

    next_timer_id: u64,
    attempt_timer: Option<Timer>,
    reconnect_timer: Option<Timer>,
}

impl EventLoop {
    fn new(
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
        tx: WeakUnboundedSender<ManagerEvent>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            config,
            connector,
            tx,
            shared,
            state: ConnectionState::Disconnected,
            readiness: BackendReadiness::Unconfirmed,
            lifecycle: Lifecycle::Active,
            attempts: 0,
            exhausted_reported: false,
            queue: VecDeque::new(),
            transport: None,
            generation: 0,
            next_timer_id: 0,
            attempt_timer: None,
            reconnect_timer: None,
        }
    }

    /// Runs until every handle is gone and the channel is drained.
    async fn run(mut self, mut rx: UnboundedReceiver<ManagerEvent>) {
        tracing::info!(target: targets::CONNECTION, url = %self.config.url(), "connection manager started");
        self.connect();
        self.publish();

        while let Some(event) = rx.recv().await {
            let span = tracing::debug_span!(
                target: targets::CONNECTION,
                span_names::MANAGER_EVENT,
                event = event.name()
            );
            span.in_scope(|| {
                self.handle(event);
                self.publish();
            });
        }

        self.teardown();
        tracing::debug!(target: targets::CONNECTION, "connection manager stopped");
    }

    fn handle(&mut self, event: ManagerEvent) {
        match event {
            ManagerEvent::Send(text) => self.send(text),
            ManagerEvent::Disconnect => self.teardown(),
            ManagerEvent::Status(reply) => {
                let _ = reply.send(self.status());
            }
            ManagerEvent::Transport { generation, event } => {
                if generation != self.generation || self.transport.is_none() {
                    tracing::trace!(
                        target: targets::CONNECTION,
                        generation,
                        current = self.generation,
                        "ignoring event from superseded transport"
                    );
                    return;
                }
                if self.lifecycle == Lifecycle::TornDown && !matches!(event, TransportEvent::Closed(_)) {
                    tracing::trace!(target: targets::CONNECTION, "dropping transport event after teardown");
                    return;
                }
                self.on_transport_event(event);
            }
            ManagerEvent::TimerFired { id, kind } => self.on_timer(id, kind),
        }
    }

    fn status(&self) -> Status {
        Status {
            state: self.state,
            readiness: self.readiness,
            lifecycle: self.lifecycle,
            reconnect_attempts: self.attempts,
            queued: self.queue.len(),
        }
    }

    fn publish(&self) {
        *self.shared.status.lock() = self.status();
    }

    fn emit_error(&self, error: ChatError) {
        self.shared.on_error.emit(error);
    }

    fn arm(&mut self, kind: TimerKind, delay: std::time::Duration) -> Timer {
        self.next_timer_id += 1;
        Timer::arm(self.next_timer_id, kind, delay, self.tx.clone())
    }

    fn connect(&mut self) {
        if self.state == ConnectionState::Connecting || self.lifecycle == Lifecycle::TornDown {
            return;
        }

        self.reconnect_timer = None;
        if let Some(mut stale) = self.transport.take() {
            tracing::debug!(target: targets::CONNECTION, generation = self.generation, "closing stale transport");
            stale.close();
        }
        if self.readiness == BackendReadiness::Faulted {
            self.readiness = BackendReadiness::Unconfirmed;
        }

        self.generation += 1;
        tracing::info!(
            target: targets::CONNECTION,
            generation = self.generation,
            attempt = self.attempts,
            url = %self.config.url(),
            "connecting"
        );

        let events = TransportEvents::new(self.generation, self.tx.clone());
        self.transport = Some(self.connector.connect(&self.config, events));
        self.state = ConnectionState::Connecting;
        self.attempt_timer = Some(self.arm(TimerKind::AttemptTimeout, self.config.timeout()));
    }

    /// Start an attempt unless one is in flight or the budget is spent.
    fn connect_if_idle(&mut self) {
        if self.state != ConnectionState::Connecting
            && self.lifecycle == Lifecycle::Active
            && self.attempts < self.config.reconnect().max_attempts
        {
            self.connect();
        }
    }

    fn send(&mut self, text: String) {
        if self.lifecycle == Lifecycle::TornDown {
            tracing::debug!(target: targets::CONNECTION, len = text.len(), "dropping message after teardown");
            return;
        }

        if self.readiness != BackendReadiness::Ready || self.state != ConnectionState::Open {
            tracing::debug!(
                target: targets::CONNECTION,
                state = %self.state,
                readiness = %self.readiness,
                queued = self.queue.len() + 1,
                "queueing message"
            );
            self.queue.push_back(text);
            self.connect_if_idle();
            return;
        }

        let result = protocol::encode_query(&text).and_then(|frame| match self.transport.as_mut() {
            Some(transport) => transport.send_text(frame),
            None => Err(ChatError::Send("no transport".into())),
        });
        match result {
            Ok(()) => {
                tracing::trace!(target: targets::CONNECTION, len = text.len(), "message sent");
            }
            Err(error) => {
                tracing::warn!(target: targets::CONNECTION, %error, "failed to send message");
                self.emit_error(error);
            }
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.on_open(),
            TransportEvent::Text(payload) => self.on_frame(&payload),
            TransportEvent::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(payload) => self.on_frame(&payload),
                Err(_) => {
                    tracing::warn!(target: targets::CONNECTION, "ignoring non-UTF-8 binary frame");
                }
            },
            TransportEvent::Error(error) => {
                tracing::warn!(target: targets::CONNECTION, %error, "transport error");
                self.emit_error(error);
            }
            TransportEvent::Closed(reason) => self.on_closed(reason),
        }
    }

    fn on_open(&mut self) {
        if self.state != ConnectionState::Connecting {
            return;
        }

        self.attempt_timer = None;
        self.attempts = 0;
        self.exhausted_reported = false;
        self.state = ConnectionState::Open;
        self.readiness = BackendReadiness::Ready;
        tracing::info!(
            target: targets::CONNECTION,
            generation = self.generation,
            queued = self.queue.len(),
            "connection open"
        );

        let pending = std::mem::take(&mut self.queue);
        for text in pending {
            self.send(text);
        }
    }

    fn on_frame(&mut self, payload: &str) {
        match protocol::decode_frame(payload) {
            InboundFrame::Chunk(chunk) => {
                tracing::trace!(target: targets::CONNECTION, len = chunk.len(), "chunk received");
                self.shared.on_message.emit(chunk);
            }
            InboundFrame::Error(error) => {
                if error.is_initialization_fault() {
                    tracing::warn!(target: targets::CONNECTION, %error, "backend not initialized, holding messages");
                    self.readiness = BackendReadiness::Faulted;
                } else {
                    tracing::warn!(target: targets::CONNECTION, %error, "backend error");
                }
                self.emit_error(error);
            }
            InboundFrame::Empty => {}
        }
    }

    fn on_closed(&mut self, reason: Option<CloseReason>) {
        let previous = self.state;
        self.transport = None;
        self.attempt_timer = None;
        self.readiness = BackendReadiness::Unconfirmed;
        self.state = ConnectionState::Disconnected;

        if previous == ConnectionState::Closing || self.lifecycle == Lifecycle::TornDown {
            tracing::debug!(target: targets::CONNECTION, "connection closed after teardown");
            return;
        }

        tracing::info!(target: targets::CONNECTION, ?reason, "connection closed");
        if previous == ConnectionState::Open {
            self.emit_error(ChatError::Closed {
                code: reason.as_ref().map(|r| r.code.as_u16()),
                reason: reason.and_then(|r| r.reason),
            });
        }

        let policy = self.config.reconnect();
        if self.attempts < policy.max_attempts {
            self.attempts += 1;
            tracing::info!(
                target: targets::CONNECTION,
                attempt = self.attempts,
                max_attempts = policy.max_attempts,
                delay_ms = policy.delay.as_millis() as u64,
                "scheduling reconnect"
            );
            self.reconnect_timer = Some(self.arm(TimerKind::Reconnect, policy.delay));
        } else {
            self.report_exhausted();
        }
    }

    fn on_timer(&mut self, id: u64, kind: TimerKind) {
        let slot = match kind {
            TimerKind::AttemptTimeout => &mut self.attempt_timer,
            TimerKind::Reconnect => &mut self.reconnect_timer,
        };
        if slot.as_ref().map(Timer::id) != Some(id) {
            tracing::trace!(target: targets::CONNECTION, id, ?kind, "ignoring cancelled timer");
            return;
        }
        *slot = None;

        match kind {
            TimerKind::AttemptTimeout => self.on_attempt_timeout(),
            TimerKind::Reconnect => self.connect(),
        }
    }

    fn on_attempt_timeout(&mut self) {
        if self.state != ConnectionState::Connecting {
            return;
        }

        let timeout = self.config.timeout();
        tracing::warn!(target: targets::CONNECTION, ?timeout, "connection attempt timed out");
        // The closed transport's own close event is ignored from here on.
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.state = ConnectionState::Disconnected;
        self.emit_error(ChatError::Timeout(timeout));

        if self.lifecycle != Lifecycle::Active {
            return;
        }
        if self.attempts < self.config.reconnect().max_attempts {
            self.attempts += 1;
            self.connect();
        } else {
            self.report_exhausted();
        }
    }

    fn report_exhausted(&mut self) {
        if self.exhausted_reported {
            return;
        }
        self.exhausted_reported = true;
        let attempts = self.config.reconnect().max_attempts;
        tracing::warn!(target: targets::CONNECTION, attempts, "reconnect attempts exhausted");
        self.emit_error(ChatError::ReconnectExhausted { attempts });
    }

    fn teardown(&mut self) {
        if self.lifecycle == Lifecycle::TornDown {
            return;
        }

        self.lifecycle = Lifecycle::TornDown;
        self.reconnect_timer = None;
        self.attempt_timer = None;
        match self.transport.as_mut() {
            Some(transport) => {
                transport.close();
                self.state = ConnectionState::Closing;
            }
            None => self.state = ConnectionState::Disconnected,
        }
        self.queue.clear();
        self.readiness = BackendReadiness::Unconfirmed;
        self.attempts = 0;
        tracing::info!(target: targets::CONNECTION, "connection torn down");
    }
}
