//! Cooperative shutdown signal shared by the bridge and its pumps.
//!
//! The flag itself is an `AtomicBool` that pumps check between iterations.
//! A `tokio::sync::Notify` sits next to it so that a pump parked in its idle
//! backoff (or stuck in a slow write) wakes up immediately instead of
//! waiting out the timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct ShutdownSignal {
    triggered: AtomicBool,
    notify: Notify,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown.  Safe to call any number of times.
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Resolves once [`trigger`](Self::trigger) has been called.
    pub async fn triggered(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent trigger cannot
        // slip between the check and the await.
        notified.as_mut().enable();
        if self.is_triggered() {
            return;
        }
        notified.await;
    }
}

/// Cloneable handle that lets another task (e.g. a Ctrl+C listener) stop a
/// running bridge without borrowing it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    signal: Arc<ShutdownSignal>,
}

impl ShutdownHandle {
    pub(crate) fn new(signal: Arc<ShutdownSignal>) -> Self {
        Self { signal }
    }

    pub fn shutdown(&self) {
        self.signal.trigger();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_signal_is_not_triggered() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());
    }

    #[tokio::test]
    async fn test_triggered_returns_immediately_when_already_set() {
        let signal = ShutdownSignal::new();
        signal.trigger();

        tokio::time::timeout(Duration::from_millis(100), signal.triggered())
            .await
            .expect("already-triggered signal must resolve at once");
    }

    #[tokio::test]
    async fn test_trigger_wakes_waiting_task() {
        // Arrange
        let signal = Arc::new(ShutdownSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            tokio::spawn(async move { signal.triggered().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Act
        ShutdownHandle::new(Arc::clone(&signal)).shutdown();

        // Assert
        tokio::time::timeout(Duration::from_millis(500), waiter)
            .await
            .expect("waiter must wake")
            .unwrap();
        assert!(signal.is_triggered());
    }
}
