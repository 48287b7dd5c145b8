//! Core systems for streamchat.
//!
//! This crate provides the building blocks shared by the networking layer and
//! the conversation layer:
//!
//! - **Signal System**: Type-safe fan-out of events to registered observers
//! - **Logging**: `tracing` targets for filtering by subsystem
//!
//! # Signal Example
//!
//! ```
//! use streamchat_core::Signal;
//!
//! // A signal that carries streamed text chunks
//! let chunk_received = Signal::<String>::new();
//!
//! // Register an observer
//! let id = chunk_received.connect(|chunk| {
//!     println!("chunk: {}", chunk);
//! });
//!
//! chunk_received.emit("Hel".to_string());
//!
//! // Deregister when done
//! chunk_received.disconnect(id);
//! ```

pub mod logging;
pub mod signal;

pub use signal::{ConnectionGuard, ConnectionId, Signal};
