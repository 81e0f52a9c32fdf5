//! One side of the bridge: a named byte-stream transport handle.
//!
//! An [`Endpoint`] wraps any `tokio::io::AsyncRead` half and `AsyncWrite`
//! half (serial port, TCP stream, in-memory duplex pipe) behind three
//! operations:
//!
//! - [`Endpoint::read`]: poll for whatever bytes are available *now*.  An
//!   empty result is the normal "nothing arrived" case, not an error.
//! - [`Endpoint::write`]: deliver all given bytes in order.
//! - [`Endpoint::close`]: release the transport.  Idempotent.
//!
//! # Why two independent locks?
//!
//! Inside a running bridge the read half of an endpoint is used by one pump
//! and the write half by the *other* pump.  Guarding each half with its own
//! `tokio::sync::Mutex` lets both pumps own "their" half without ever
//! waiting on each other; the locks are uncontended in steady state.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{EndpointFault, FaultKind, Operation};

/// Type-erased read half of a transport.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
/// Type-erased write half of a transport.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Default number of bytes requested per read call.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Per-endpoint read behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointOptions {
    /// How long a single `read()` may wait for data before returning empty.
    ///
    /// `Duration::ZERO` (the default) polls the transport exactly once.
    pub read_timeout: Duration,
    /// Upper bound on the number of bytes returned by one `read()`.
    pub read_buffer_size: usize,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            read_timeout: Duration::ZERO,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

/// A named, exclusively owned byte-stream transport.
///
/// Share it between the bridge and its creator with `Arc<Endpoint>`; the
/// bridge never closes it, so the creator can close (or reuse) it after the
/// bridge has stopped.
pub struct Endpoint {
    name: String,
    options: EndpointOptions,
    reader: Mutex<Option<BoxedReader>>,
    writer: Mutex<Option<BoxedWriter>>,
    closed: AtomicBool,
}

impl Endpoint {
    /// Builds an endpoint from separate read and write halves.
    pub fn new<R, W>(name: impl Into<String>, reader: R, writer: W, options: EndpointOptions) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            name: name.into(),
            options,
            reader: Mutex::new(Some(Box::new(reader))),
            writer: Mutex::new(Some(Box::new(writer))),
            closed: AtomicBool::new(false),
        }
    }

    /// Builds an endpoint from a single bidirectional stream.
    ///
    /// The stream is split with [`tokio::io::split`]; prefer [`Endpoint::new`]
    /// with owned halves when the transport offers them (e.g.
    /// `TcpStream::into_split`).
    pub fn from_stream<S>(name: impl Into<String>, stream: S, options: EndpointOptions) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(name, reader, writer, options)
    }

    /// Logical name used in log lines and faults.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns the bytes currently available, possibly none.
    ///
    /// Never waits longer than `options.read_timeout`.
    ///
    /// # Errors
    ///
    /// - [`FaultKind::Closed`] if [`close`](Self::close) was called.
    /// - [`FaultKind::Disconnected`] on end-of-stream.
    /// - [`FaultKind::Io`] for any other transport error.
    pub async fn read(&self) -> Result<Vec<u8>, EndpointFault> {
        if self.is_closed() {
            return Err(self.fault(Operation::Read, FaultKind::Closed));
        }

        let mut guard = self.reader.lock().await;
        let Some(reader) = guard.as_mut() else {
            return Err(self.fault(Operation::Read, FaultKind::Closed));
        };

        let mut buf = vec![0u8; self.options.read_buffer_size.max(1)];
        let result = match timeout(self.options.read_timeout, reader.read(&mut buf)).await {
            Ok(result) => result,
            // Nothing arrived within the poll window.
            Err(_elapsed) => return Ok(Vec::new()),
        };

        match result {
            Ok(0) => Err(self.fault(Operation::Read, FaultKind::Disconnected)),
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if is_no_data(&e) => Ok(Vec::new()),
            Err(e) => Err(self.fault(Operation::Read, FaultKind::Io(e))),
        }
    }

    /// Writes all of `bytes` and flushes.
    ///
    /// Blocks only for as long as the transport's own buffering requires.
    ///
    /// # Errors
    ///
    /// [`FaultKind::Closed`] after `close()`, [`FaultKind::Io`] otherwise.
    pub async fn write(&self, bytes: &[u8]) -> Result<(), EndpointFault> {
        if self.is_closed() {
            return Err(self.fault(Operation::Write, FaultKind::Closed));
        }

        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(self.fault(Operation::Write, FaultKind::Closed));
        };

        writer
            .write_all(bytes)
            .await
            .map_err(|e| self.fault(Operation::Write, FaultKind::Io(e)))?;
        writer
            .flush()
            .await
            .map_err(|e| self.fault(Operation::Write, FaultKind::Io(e)))
    }

    /// Releases the transport.
    ///
    /// The first call shuts down the write half and drops both halves; later
    /// calls return `Ok(())` immediately.  Call this only after the bridge
    /// using the endpoint has stopped.
    ///
    /// # Errors
    ///
    /// Returns a [`Operation::Close`] fault if the write half fails to shut
    /// down cleanly.  The transport is released either way.
    pub async fn close(&self) -> Result<(), EndpointFault> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let writer = self.writer.lock().await.take();
        drop(self.reader.lock().await.take());

        if let Some(mut writer) = writer {
            if let Err(e) = writer.shutdown().await {
                debug!("endpoint '{}': shutdown on close failed: {e}", self.name);
                return Err(self.fault(Operation::Close, FaultKind::Io(e)));
            }
        }

        debug!("endpoint '{}' closed", self.name);
        Ok(())
    }

    fn fault(&self, operation: Operation, kind: FaultKind) -> EndpointFault {
        EndpointFault::new(self.name.clone(), operation, kind)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Error kinds that some transports use to say "no data right now".
///
/// Serial drivers configured with a zero timeout report `TimedOut`; raw
/// non-blocking sockets report `WouldBlock`.
fn is_no_data(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
