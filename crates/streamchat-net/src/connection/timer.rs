//! One-shot timers delivered to the manager's event loop.

use std::time::Duration;

use tokio::sync::mpsc::WeakUnboundedSender;
use tokio::task::JoinHandle;

use super::ManagerEvent;

/// Which of the manager's two timers fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TimerKind {
    /// The current connection attempt has taken too long.
    AttemptTimeout,
    /// A delayed reconnect is due.
    Reconnect,
}

/// An armed timer. Dropping it cancels the timer.
#[derive(Debug)]
pub(crate) struct Timer {
    id: u64,
    handle: JoinHandle<()>,
}

impl Timer {
    /// Arm a timer that reports `TimerFired { id, kind }` after `delay`.
    pub(crate) fn arm(
        id: u64,
        kind: TimerKind,
        delay: Duration,
        tx: WeakUnboundedSender<ManagerEvent>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(ManagerEvent::TimerFired { id, kind });
            }
        });
        Self { id, handle }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timer = Timer::arm(7, TimerKind::Reconnect, Duration::from_secs(2), tx.downgrade());
        assert_eq!(timer.id(), 7);

        match rx.recv().await {
            Some(ManagerEvent::TimerFired { id, kind }) => {
                assert_eq!(id, 7);
                assert_eq!(kind, TimerKind::Reconnect);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timer = Timer::arm(1, TimerKind::AttemptTimeout, Duration::from_secs(1), tx.downgrade());
        drop(timer);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }
}
