//! Best-effort sinks that receive a copy of forwarded bytes.
//!
//! The forwarding path talks to an [`Observer`] only through
//! [`Observer::notify`], so a pump has no direct dependency on stdout, files
//! or metrics backends.  Implementations must return quickly (hand the bytes
//! to a queue, bump a counter) because `notify` runs on the pump's task.

use std::sync::Mutex;

use crate::error::ObserverError;
use crate::pump::Direction;

/// Receives a copy of every chunk a pump forwards.
///
/// Errors are logged by the pump and otherwise ignored; an observer can
/// never slow down or stop forwarding by failing.  A panic in `notify` is
/// caught by the pump and costs only that chunk's copy.
#[cfg_attr(test, mockall::automock)]
pub trait Observer: Send + Sync {
    /// Called after `bytes` were written to the destination of `direction`.
    fn notify(&self, direction: Direction, bytes: &[u8]) -> Result<(), ObserverError>;
}

/// An observer that keeps every notification in memory.
///
/// Useful in tests and for embedding the bridge where the caller wants to
/// inspect traffic after the fact.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    chunks: Mutex<Vec<(Direction, Vec<u8>)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded chunks, in notification order.
    pub fn chunks(&self) -> Vec<(Direction, Vec<u8>)> {
        self.chunks
            .lock()
            .map(|chunks| chunks.clone())
            .unwrap_or_default()
    }

    /// Concatenation of every chunk recorded for `direction`.
    pub fn bytes(&self, direction: Direction) -> Vec<u8> {
        self.chunks()
            .into_iter()
            .filter(|(d, _)| *d == direction)
            .flat_map(|(_, bytes)| bytes)
            .collect()
    }
}

impl Observer for RecordingObserver {
    fn notify(&self, direction: Direction, bytes: &[u8]) -> Result<(), ObserverError> {
        let mut chunks = self
            .chunks
            .lock()
            .map_err(|_| ObserverError::Sink("recording lock poisoned".into()))?;
        chunks.push((direction, bytes.to_vec()));
        Ok(())
    }
}
