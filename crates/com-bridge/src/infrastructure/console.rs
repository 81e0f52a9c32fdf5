//! Console echo of forwarded traffic.
//!
//! [`ConsoleObserver`] is the bridge's [`Observer`]: it copies every
//! forwarded chunk into a bounded queue with `try_send` and returns at once,
//! so a slow terminal can never stall a pump.  A background task
//! ([`ConsoleWriter`]) drains the queue, formats each chunk and writes it to
//! the sink (stdout in production).
//!
//! When the queue is full the copy is dropped and the pump logs it at debug
//! level; forwarding itself is unaffected.
//!
//! # Formats
//!
//! - `text`: chunks are decoded as UTF-8 with invalid bytes dropped.  A
//!   multi-byte character split across two reads is held back and completed
//!   by the next chunk in the same direction.
//! - `hex`: one line per chunk, e.g. `a->b | 70 69 6e 67 0a`.

use std::fmt::Write as _;

use bridge_core::{Direction, Observer, ObserverError};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::EchoMode;

type Chunk = (Direction, Vec<u8>);

/// Non-blocking [`Observer`] that mirrors traffic to a console sink.
pub struct ConsoleObserver {
    tx: mpsc::Sender<Chunk>,
}

/// Handle to the background task that writes the echo.
///
/// The task ends once every [`ConsoleObserver`] clone of the queue sender is
/// dropped and the queue is drained.
pub struct ConsoleWriter {
    handle: JoinHandle<()>,
}

impl ConsoleObserver {
    /// Spawns the writer task over `sink` and returns the observer feeding it.
    ///
    /// Must be called from within a Tokio runtime.  `capacity` is clamped to
    /// at least one chunk.
    pub fn spawn<W>(mode: EchoMode, capacity: usize, sink: W) -> (Self, ConsoleWriter)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(drain(rx, sink, EchoFormatter::new(mode)));
        (Self { tx }, ConsoleWriter { handle })
    }

    /// [`spawn`](Self::spawn) over the process's standard output.
    pub fn stdout(mode: EchoMode, capacity: usize) -> (Self, ConsoleWriter) {
        Self::spawn(mode, capacity, tokio::io::stdout())
    }
}

impl Observer for ConsoleObserver {
    fn notify(&self, direction: Direction, bytes: &[u8]) -> Result<(), ObserverError> {
        self.tx
            .try_send((direction, bytes.to_vec()))
            .map_err(|e| match e {
                TrySendError::Full((_, dropped)) => ObserverError::Backlogged {
                    dropped: dropped.len(),
                },
                TrySendError::Closed(_) => ObserverError::Closed,
            })
    }
}

impl ConsoleWriter {
    /// Waits for the queued echo to be written out.
    ///
    /// Call after the bridge (and with it every observer reference) has been
    /// dropped, otherwise this waits for as long as the bridge lives.
    pub async fn finish(self) {
        if let Err(e) = self.handle.await {
            warn!("console echo task failed: {e}");
        }
    }
}

async fn drain<W>(mut rx: mpsc::Receiver<Chunk>, mut sink: W, mut formatter: EchoFormatter)
where
    W: AsyncWrite + Unpin,
{
    while let Some((direction, bytes)) = rx.recv().await {
        let text = formatter.format(direction, &bytes);
        if text.is_empty() {
            continue;
        }
        let written = async {
            sink.write_all(text.as_bytes()).await?;
            sink.flush().await
        };
        if let Err(e) = written.await {
            // Dropping `rx` makes further notify() calls report Closed.
            warn!("console echo disabled: {e}");
            return;
        }
    }
    debug!("console echo drained");
}

// ── Formatting ────────────────────────────────────────────────────────────────

/// Turns chunks into console text according to an [`EchoMode`].
#[derive(Debug)]
pub(crate) struct EchoFormatter {
    mode: EchoMode,
    /// Incomplete trailing UTF-8 sequence per direction (`a->b`, `b->a`).
    pending: [Vec<u8>; 2],
}

impl EchoFormatter {
    pub(crate) fn new(mode: EchoMode) -> Self {
        Self {
            mode,
            pending: [Vec::new(), Vec::new()],
        }
    }

    pub(crate) fn format(&mut self, direction: Direction, bytes: &[u8]) -> String {
        match self.mode {
            EchoMode::Off => String::new(),
            EchoMode::Hex => hex_line(direction, bytes),
            EchoMode::Text => {
                let slot = match direction {
                    Direction::AToB => 0,
                    Direction::BToA => 1,
                };
                decode_text(&mut self.pending[slot], bytes)
            }
        }
    }
}

fn hex_line(direction: Direction, bytes: &[u8]) -> String {
    let mut line = String::with_capacity(8 + bytes.len() * 3);
    let _ = write!(line, "{direction} |");
    for byte in bytes {
        let _ = write!(line, " {byte:02x}");
    }
    line.push('\n');
    line
}

/// Decodes `pending ++ bytes`, dropping invalid sequences and stashing an
/// incomplete trailing sequence back into `pending`.
fn decode_text(pending: &mut Vec<u8>, bytes: &[u8]) -> String {
    let mut input = std::mem::take(pending);
    input.extend_from_slice(bytes);

    let mut out = String::with_capacity(input.len());
    let mut rest = input.as_slice();
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                out.push_str(&String::from_utf8_lossy(valid));
                match e.error_len() {
                    Some(invalid) => rest = &after[invalid..],
                    None => {
                        pending.extend_from_slice(after);
                        break;
                    }
                }
            }
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
