//! Signal system for streamchat.
//!
//! A [`Signal<Args>`] is a fan-out registry of observers. Every registered
//! slot is invoked, in registration order, for every emitted value. There is
//! no de-duplication and no upper bound on the number of slots.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The signal type used to emit notifications
//! - [`ConnectionId`] - Unique identifier returned when connecting a slot
//! - [`ConnectionGuard`] - RAII guard that disconnects when dropped
//!
//! # Re-entrancy
//!
//! Slots are invoked after the registry lock has been released, so a slot may
//! connect or disconnect other slots (or itself) while the signal is being
//! emitted. Such changes take effect from the next emission.
//!
//! # Example
//!
//! ```
//! use streamchat_core::Signal;
//!
//! let text_changed = Signal::<String>::new();
//!
//! let conn_id = text_changed.connect(|text| {
//!     println!("Text changed to: {}", text);
//! });
//!
//! text_changed.emit("Hello, World!".to_string());
//! text_changed.disconnect(conn_id);
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};

use crate::logging::{span_names, targets};

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via [`Signal::disconnect`].
    /// The ID remains valid until the connection is explicitly disconnected or
    /// the signal is dropped.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// Slot storage: the slotmap issues ids, the vector keeps registration order.
struct Registry<Args> {
    ids: SlotMap<ConnectionId, ()>,
    slots: Vec<(ConnectionId, Slot<Args>)>,
}

impl<Args> Registry<Args> {
    fn insert(&mut self, slot: Slot<Args>) -> ConnectionId {
        let id = self.ids.insert(());
        self.slots.push((id, slot));
        id
    }

    fn remove(&mut self, id: ConnectionId) -> bool {
        if self.ids.remove(id).is_none() {
            return false;
        }
        self.slots.retain(|(slot_id, _)| *slot_id != id);
        true
    }
}

/// A type-safe signal that can have multiple connected slots.
///
/// `Signal<Args>` is `Send + Sync` and can be shared between threads,
/// typically behind an `Arc`.
pub struct Signal<Args> {
    connections: Mutex<Registry<Args>>,
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(Registry {
                ids: SlotMap::with_key(),
                slots: Vec::new(),
            }),
        }
    }

    /// Connect a slot (closure) to this signal.
    ///
    /// Returns a `ConnectionId` that can be used to disconnect the slot later.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connections.lock().insert(Arc::new(slot))
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed, `false` otherwise.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id)
    }

    /// Emit the signal, invoking all connected slots in registration order.
    ///
    /// Returns the number of slots that were invoked.
    pub fn emit(&self, args: Args) -> usize {
        // Snapshot the slots so they run without the registry lock held.
        let slots: Vec<Slot<Args>> = self
            .connections
            .lock()
            .slots
            .iter()
            .map(|(_, slot)| slot.clone())
            .collect();
        let span = tracing::trace_span!(
            target: targets::SIGNAL,
            span_names::SIGNAL,
            connection_count = slots.len()
        );
        let _entered = span.enter();

        for slot in &slots {
            slot(&args);
        }
        slots.len()
    }

    /// Connect a slot with automatic disconnection when the guard is dropped.
    ///
    /// The guard only holds a weak reference, so it never keeps the signal
    /// alive and dropping it after the signal is gone is a no-op.
    ///
    /// # Example
    ///
    /// ```
    /// use streamchat_core::Signal;
    /// use std::sync::atomic::{AtomicI32, Ordering};
    /// use std::sync::Arc;
    ///
    /// let signal = Arc::new(Signal::<i32>::new());
    /// let counter = Arc::new(AtomicI32::new(0));
    /// {
    ///     let counter_clone = counter.clone();
    ///     let _guard = signal.connect_scoped(move |&n| {
    ///         counter_clone.fetch_add(n, Ordering::SeqCst);
    ///     });
    ///     signal.emit(42);
    /// }
    /// signal.emit(43);
    /// assert_eq!(counter.load(Ordering::SeqCst), 42);
    /// ```
    pub fn connect_scoped<F>(self: &Arc<Self>, slot: F) -> ConnectionGuard<Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.connect(slot);
        ConnectionGuard {
            signal: Arc::downgrade(self),
            id,
        }
    }
}

impl<Args> std::fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.connections.lock().slots.len())
            .finish()
    }
}

/// A connection guard that automatically disconnects when dropped.
///
/// Created via [`Signal::connect_scoped`].
#[must_use = "dropping the guard disconnects the slot immediately"]
pub struct ConnectionGuard<Args: 'static> {
    signal: Weak<Signal<Args>>,
    id: ConnectionId,
}

impl<Args: 'static> ConnectionGuard<Args> {
    /// The id of the guarded connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<Args: 'static> Drop for ConnectionGuard<Args> {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.upgrade() {
            let _ = signal.disconnect(self.id);
        }
    }
}

impl<Args: 'static> std::fmt::Debug for ConnectionGuard<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_connect_emit() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        signal.emit(42);
        signal.emit(100);

        assert_eq!(*received.lock(), vec![42, 100]);
    }

    #[test]
    fn test_signal_disconnect() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        let id = signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        signal.emit(1);
        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        signal.emit(2);

        assert_eq!(*received.lock(), vec![1]);
    }

    #[test]
    fn test_fan_out_in_registration_order() {
        let signal = Signal::<&'static str>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let received_clone = received.clone();
            signal.connect(move |value| {
                received_clone.lock().push(format!("{name}:{value}"));
            });
        }

        assert_eq!(signal.emit("x"), 3);
        assert_eq!(
            *received.lock(),
            vec!["first:x", "second:x", "third:x"]
        );
    }

    #[test]
    fn test_order_survives_reconnect_of_earlier_slot() {
        let signal = Signal::<()>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let received_clone = received.clone();
            signal.connect(move |()| received_clone.lock().push("first"))
        };
        {
            let received_clone = received.clone();
            signal.connect(move |()| received_clone.lock().push("second"));
        }
        signal.disconnect(first);
        {
            let received_clone = received.clone();
            signal.connect(move |()| received_clone.lock().push("third"));
        }

        signal.emit(());
        assert_eq!(*received.lock(), vec!["second", "third"]);
    }

    #[test]
    fn test_same_closure_registered_twice_runs_twice() {
        let signal = Signal::<()>::new();
        let count = Arc::new(Mutex::new(0));

        for _ in 0..2 {
            let count_clone = count.clone();
            signal.connect(move |()| *count_clone.lock() += 1);
        }
        signal.emit(());

        assert_eq!(*count.lock(), 2);
    }

    #[test]
    fn test_connection_guard() {
        let signal = Arc::new(Signal::<i32>::new());
        let received = Arc::new(Mutex::new(Vec::new()));

        {
            let received_clone = received.clone();
            let _guard = signal.connect_scoped(move |&value| {
                received_clone.lock().push(value);
            });
            assert_eq!(signal.emit(1), 1);
        }

        assert_eq!(signal.emit(2), 0);
        assert_eq!(*received.lock(), vec![1]);
    }

    #[test]
    fn test_guard_outliving_signal() {
        let signal = Arc::new(Signal::<i32>::new());
        let guard = signal.connect_scoped(|_| {});
        drop(signal);
        drop(guard);
    }

    #[test]
    fn test_slot_can_connect_during_emit() {
        let signal = Arc::new(Signal::<i32>::new());
        let signal_clone = signal.clone();
        signal.connect(move |_| {
            signal_clone.connect(|_| {});
        });

        assert_eq!(signal.emit(1), 1);
        assert_eq!(signal.emit(2), 2);
    }

    #[test]
    fn test_signal_shared_across_threads() {
        let signal = Arc::new(Signal::<String>::new());
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        signal.connect(move |s| {
            received_clone.lock().push(s.clone());
        });

        let mut handles = vec![];
        for i in 0..5 {
            let signal_clone = signal.clone();
            handles.push(std::thread::spawn(move || {
                signal_clone.emit(format!("thread-{}", i));
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(received.lock().len(), 5);
    }
}
