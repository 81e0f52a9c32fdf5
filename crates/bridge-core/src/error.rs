//! Error taxonomy for the bridge.
//!
//! Errors are split by who has to react to them:
//!
//! | Type                  | Raised by                  | Consequence                          |
//! |-----------------------|----------------------------|--------------------------------------|
//! | [`EndpointOpenError`] | transport setup            | fatal, before any pump starts        |
//! | [`EndpointFault`]     | `Endpoint::read` / `write` | stops the one pump that hit it       |
//! | [`ObserverError`]     | `Observer::notify`         | logged and swallowed by the pump     |
//! | [`BridgeError`]       | `Bridge` lifecycle calls   | returned to the caller, no side effect |

use std::fmt;
use std::io;

use thiserror::Error;

use crate::pump::Direction;

/// The endpoint operation that was in progress when a fault occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
    Close,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Read => "read",
            Operation::Write => "write",
            Operation::Close => "close",
        };
        f.write_str(name)
    }
}

/// What went wrong underneath an [`EndpointFault`].
#[derive(Debug, Error)]
pub enum FaultKind {
    /// The transport reported an I/O error (device unplugged, socket reset, ...).
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// The peer went away: the transport returned end-of-stream.
    #[error("transport disconnected")]
    Disconnected,

    /// The endpoint was closed locally; no transport call was made.
    #[error("endpoint is closed")]
    Closed,
}

/// A transport-level failure during active forwarding.
///
/// Carries the endpoint's logical name and the operation that failed so the
/// log line is enough to tell which device misbehaved.
#[derive(Debug, Error)]
#[error("endpoint '{endpoint}' {operation} failed: {kind}")]
pub struct EndpointFault {
    pub endpoint: String,
    pub operation: Operation,
    #[source]
    pub kind: FaultKind,
}

impl EndpointFault {
    pub fn new(endpoint: impl Into<String>, operation: Operation, kind: FaultKind) -> Self {
        Self {
            endpoint: endpoint.into(),
            operation,
            kind,
        }
    }

    /// Returns `true` if the fault was caused by a local `close()`.
    pub fn is_closed(&self) -> bool {
        matches!(self.kind, FaultKind::Closed)
    }
}

/// A transport could not be opened or configured at startup.
#[derive(Debug, Error)]
#[error("failed to open endpoint '{endpoint}' ({target}): {source}")]
pub struct EndpointOpenError {
    /// Logical endpoint name.
    pub endpoint: String,
    /// Human-readable transport address (device path, `host:port`, ...).
    pub target: String,
    #[source]
    pub source: io::Error,
}

/// Errors returned by an [`Observer`](crate::observer::Observer).
///
/// The pump never propagates these; they exist so observers can say *why*
/// a copy was dropped and the pump can log it.
#[derive(Debug, Error)]
pub enum ObserverError {
    /// The observer's queue is full; the copy of this chunk was dropped.
    #[error("observer backlog full, dropped {dropped} bytes")]
    Backlogged { dropped: usize },

    /// The observer's output sink has gone away.
    #[error("observer sink closed")]
    Closed,

    /// Any other sink failure.
    #[error("observer sink error: {0}")]
    Sink(String),
}

/// Misuse of the [`Bridge`](crate::bridge::Bridge) lifecycle.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bridge is already running")]
    AlreadyRunning,

    /// A stopped bridge cannot be restarted; build a new one.
    #[error("bridge has already stopped and cannot be restarted")]
    AlreadyStopped,

    #[error("bridge is not running")]
    NotRunning,

    #[error("endpoint '{0}' is closed")]
    EndpointClosed(String),

    #[error("both sides of the bridge refer to the same endpoint '{0}'")]
    SameEndpoint(String),

    #[error("no tokio runtime available to spawn pumps")]
    NoRuntime,

    #[error("pump {direction} panicked")]
    PumpPanicked { direction: Direction },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display_names_endpoint_and_operation() {
        let fault = EndpointFault::new("COM8", Operation::Read, FaultKind::Disconnected);

        let text = fault.to_string();

        assert_eq!(text, "endpoint 'COM8' read failed: transport disconnected");
    }

    #[test]
    fn test_fault_io_source_is_preserved() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "cable pulled");
        let fault = EndpointFault::new("COM6", Operation::Write, FaultKind::Io(io_err));

        let source = std::error::Error::source(&fault).expect("fault has a source");

        assert!(source.to_string().contains("cable pulled"));
        assert!(!fault.is_closed());
    }

    #[test]
    fn test_closed_fault_is_reported_as_closed() {
        let fault = EndpointFault::new("a", Operation::Read, FaultKind::Closed);
        assert!(fault.is_closed());
    }

    #[test]
    fn test_open_error_mentions_target() {
        let err = EndpointOpenError {
            endpoint: "A".into(),
            target: "/dev/ttyUSB0".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such device"),
        };

        let text = err.to_string();

        assert!(text.contains("'A'"));
        assert!(text.contains("/dev/ttyUSB0"));
        assert!(text.contains("no such device"));
    }

    #[test]
    fn test_pump_panicked_names_direction() {
        let err = BridgeError::PumpPanicked {
            direction: Direction::BToA,
        };
        assert_eq!(err.to_string(), "pump b->a panicked");
    }
}
