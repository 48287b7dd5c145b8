//! Wire protocol spoken with the chat backend.
//!
//! Outbound, every application message is one text frame carrying
//! `{"query": "<text>"}`. Inbound, the backend streams text frames that are
//! either JSON carrying a `content` chunk or an `error` description, or a raw
//! (non-JSON) text payload that is itself a content chunk. Non-string field
//! values are rendered as JSON text; `null`, `false`, `0` and `""` count as
//! absent.
//!
//! The end of one streamed response is marked by a chunk whose value is
//! exactly [`END_OF_STREAM`]. The connection manager passes it through to
//! observers like any other chunk.

use serde::Serialize;
use serde_json::Value;

use crate::error::{BackendFault, ChatError, Result};
use streamchat_core::logging::targets;

/// Chunk value marking the end of one streamed response.
pub const END_OF_STREAM: &str = "[EOS]";

/// Substrings of backend error text that indicate a data-layer
/// initialization fault (vector store / embedding index not ready).
pub const INITIALIZATION_FAULT_MARKERS: &[&str] = &[
    "index 0 is out of bounds",
    "vector_store",
    "FAISS",
    "embeddings",
];

/// Outbound envelope.
#[derive(Debug, Serialize)]
struct QueryFrame<'a> {
    query: &'a str,
}

/// A decoded inbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundFrame {
    /// A streamed content chunk (possibly [`END_OF_STREAM`]).
    Chunk(String),
    /// An error reported by the backend.
    Error(ChatError),
    /// Nothing to deliver (empty payload, or an envelope with no usable field).
    Empty,
}

/// Serialize an outbound query into its wire form.
pub fn encode_query(text: &str) -> Result<String> {
    serde_json::to_string(&QueryFrame { query: text }).map_err(|e| ChatError::Send(e.to_string()))
}

/// Decode one inbound text frame.
///
/// Only a payload that is not JSON at all falls back to a plain content chunk
/// (trimmed). Decoding never produces an error of its own;
/// [`InboundFrame::Error`] only carries errors the backend reported.
pub fn decode_frame(payload: &str) -> InboundFrame {
    let value = match serde_json::from_str::<Value>(payload) {
        Ok(value) => value,
        Err(_) => {
            let text = payload.trim();
            if text.is_empty() {
                return InboundFrame::Empty;
            }
            tracing::debug!(target: targets::PROTOCOL, len = text.len(), "plain text frame");
            return InboundFrame::Chunk(text.to_string());
        }
    };

    if let Some(error) = value.get("error").and_then(field_text) {
        return InboundFrame::Error(ChatError::backend(error));
    }
    if let Some(content) = value.get("content").and_then(field_text) {
        return InboundFrame::Chunk(content);
    }
    tracing::debug!(target: targets::PROTOCOL, "structured frame without content or error, ignoring");
    InboundFrame::Empty
}

/// Text of an envelope field, or `None` when the value counts as absent.
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

/// Classify backend error text.
pub fn classify_backend_error(message: &str) -> BackendFault {
    if INITIALIZATION_FAULT_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
    {
        BackendFault::Initialization
    } else {
        BackendFault::Generic
    }
}
