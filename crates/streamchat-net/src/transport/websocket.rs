//! WebSocket transport built on tokio-tungstenite.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as TungsteniteCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use super::{CloseCode, CloseReason, Connector, Transport, TransportEvent, TransportEvents};
use crate::connection::ConnectionConfig;
use crate::error::{ChatError, Result};
use streamchat_core::logging::targets;

/// Command sent to a transport's socket task.
enum Command {
    SendText(String),
    Close,
}

/// Connector that opens real WebSocket connections.
///
/// Each transport runs in its own tokio task which owns the socket; the
/// returned handle talks to it over a channel. Requires a tokio runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a new WebSocket connector.
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self, config: &ConnectionConfig, events: TransportEvents) -> Box<dyn Transport> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let request = build_request(config);
        tokio::spawn(run_socket(request, events, command_rx));
        Box::new(WebSocketTransport { command_tx })
    }
}

/// Handle to a socket task.
struct WebSocketTransport {
    command_tx: mpsc::UnboundedSender<Command>,
}

impl Transport for WebSocketTransport {
    fn send_text(&mut self, frame: String) -> Result<()> {
        self.command_tx
            .send(Command::SendText(frame))
            .map_err(|_| ChatError::Send("socket task has stopped".into()))
    }

    fn close(&mut self) {
        let _ = self.command_tx.send(Command::Close);
    }
}

/// Build the WebSocket request with custom headers.
fn build_request(config: &ConnectionConfig) -> Result<Request> {
    let mut request = config
        .url()
        .as_str()
        .into_client_request()
        .map_err(|e| ChatError::InvalidUrl(e.to_string()))?;

    let headers = request.headers_mut();
    for (name, value) in config.headers() {
        let header_name = http::header::HeaderName::try_from(name.as_str())?;
        let header_value = http::header::HeaderValue::try_from(value.as_str())?;
        headers.insert(header_name, header_value);
    }

    Ok(request)
}

/// Socket task: connect, then pump commands and inbound frames until closed.
async fn run_socket(
    request: Result<Request>,
    events: TransportEvents,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
) {
    let generation = events.generation();
    let request = match request {
        Ok(request) => request,
        Err(e) => {
            events.error(e);
            events.closed(None);
            return;
        }
    };

    tracing::debug!(target: targets::TRANSPORT, generation, uri = %request.uri(), "opening websocket");

    let connect = tokio_tungstenite::connect_async(request);
    let ws_stream = tokio::select! {
        result = connect => match result {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => {
                tracing::debug!(target: targets::TRANSPORT, generation, error = %e, "websocket connect failed");
                events.error(ChatError::Connect(e.to_string()));
                events.closed(None);
                return;
            }
        },
        // Closed (or handle dropped) before the handshake finished.
        _ = wait_for_close(&mut command_rx) => {
            events.closed(None);
            return;
        }
    };

    events.opened();
    let (mut write, mut read) = ws_stream.split();
    let mut close_reason = None;

    loop {
        tokio::select! {
            cmd = command_rx.recv() => {
                match cmd {
                    Some(Command::SendText(text)) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            events.error(ChatError::Send(e.to_string()));
                            break;
                        }
                    }
                    Some(Command::Close) | None => {
                        let frame = CloseFrame {
                            code: TungsteniteCloseCode::Normal,
                            reason: String::new().into(),
                        };
                        let _ = write.send(Message::Close(Some(frame))).await;
                        close_reason = Some(CloseReason::normal());
                        break;
                    }
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        events.text(text.as_str());
                    }
                    Some(Ok(Message::Binary(data))) => {
                        events.report(TransportEvent::Binary(data.to_vec()));
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                        // Pong is sent automatically by tungstenite
                    }
                    Some(Ok(Message::Close(frame))) => {
                        close_reason = frame.map(|f| CloseReason {
                            code: CloseCode::from_u16(f.code.into()),
                            reason: Some(f.reason.to_string()).filter(|r| !r.is_empty()),
                        });
                        break;
                    }
                    Some(Err(e)) => {
                        events.error(ChatError::Transport(e.to_string()));
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::debug!(target: targets::TRANSPORT, generation, ?close_reason, "websocket closed");
    events.closed(close_reason);
}

/// Resolves once a close is requested or the handle is dropped.
///
/// Sends issued before the handshake completes are discarded; the manager
/// never sends on a transport that has not reported [`TransportEvent::Opened`].
async fn wait_for_close(command_rx: &mut mpsc::UnboundedReceiver<Command>) {
    while let Some(cmd) = command_rx.recv().await {
        if matches!(cmd, Command::Close) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_build_request_with_headers() {
        let config = ConnectionConfig::new("ws://localhost:8000/ws")
            .unwrap()
            .header("Authorization", "Bearer token");
        let request = build_request(&config).unwrap();

        assert_eq!(request.uri(), "ws://localhost:8000/ws");
        assert_eq!(
            request.headers().get("authorization").unwrap(),
            "Bearer token"
        );
    }

    #[test]
    fn test_build_request_rejects_bad_header() {
        let config = ConnectionConfig::new("ws://localhost:8000/ws")
            .unwrap()
            .header("bad header", "value");
        let err = build_request(&config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_refused_connection_reports_error_then_close() {
        // Bind and drop a listener to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = ConnectionConfig::new(format!("ws://127.0.0.1:{port}/ws")).unwrap();
        let events = TransportEvents::new(1, tx.downgrade());
        let _transport = WebSocketConnector::new().connect(&config, events);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(
            first,
            crate::connection::ManagerEvent::Transport {
                generation: 1,
                event: TransportEvent::Error(ChatError::Connect(_))
            }
        ));
        assert!(matches!(
            second,
            crate::connection::ManagerEvent::Transport {
                generation: 1,
                event: TransportEvent::Closed(None)
            }
        ));
    }
}
