//! The unidirectional forwarding loop.
//!
//! A pump binds a source endpoint to a destination endpoint and repeats:
//!
//! ```text
//! loop {
//!     stop requested?            → exit (Shutdown)
//!     chunk = source.read()      → fault? exit (Fault); shutdown mid-read? exit
//!     chunk empty?               → idle backoff (wakes on shutdown), continue
//!     destination.write(chunk)   → fault? exit (Fault); shutdown mid-write? grace, exit
//!     observer.notify(chunk)     → errors and panics logged, ignored
//!     yield to the scheduler
//! }
//! ```
//!
//! Bytes are written in exactly the order they were read, so each direction
//! is a FIFO.  Every await in the loop is raced against the shutdown signal,
//! so a stop is seen within one poll interval whatever the endpoint's read
//! timeout.  A write caught mid-flight gets one poll interval to finish
//! before it is abandoned.  The two pumps of a bridge share nothing but the shutdown
//! signal, the optional observer and the live-pump counter.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::endpoint::Endpoint;
use crate::error::EndpointFault;
use crate::observer::Observer;
use crate::shutdown::ShutdownSignal;

/// Default idle backoff after an empty read.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Which way a pump moves bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Endpoint A → endpoint B.
    AToB,
    /// Endpoint B → endpoint A.
    BToA,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::AToB => "a->b",
            Direction::BToA => "b->a",
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::AToB => Direction::BToA,
            Direction::BToA => Direction::AToB,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Timing knobs shared by both pumps of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpSettings {
    /// How long a pump sleeps after a read returned nothing.
    ///
    /// Also the grace period a write caught mid-flight by a stop request
    /// gets before it is abandoned.
    pub poll_interval: Duration,
}

impl Default for PumpSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Why a pump stopped.
#[derive(Debug)]
pub enum PumpExit {
    /// The bridge asked it to stop.
    Shutdown,
    /// The source or destination endpoint failed.
    Fault(EndpointFault),
}

impl PumpExit {
    pub fn is_fault(&self) -> bool {
        matches!(self, PumpExit::Fault(_))
    }
}

/// Summary of one pump's lifetime.
#[derive(Debug)]
pub struct PumpReport {
    pub direction: Direction,
    pub bytes_forwarded: u64,
    pub chunks_forwarded: u64,
    pub exit: PumpExit,
}

/// Everything a pump task needs.  Built by the bridge at `start()`.
pub(crate) struct Pump {
    pub direction: Direction,
    pub source: Arc<Endpoint>,
    pub destination: Arc<Endpoint>,
    pub observer: Option<Arc<dyn Observer>>,
    pub shutdown: Arc<ShutdownSignal>,
    pub settings: PumpSettings,
    /// Number of pumps of this bridge still running.
    pub live: Arc<AtomicUsize>,
}

impl Pump {
    /// Runs the forwarding loop until shutdown or a fault.
    pub(crate) async fn run(self) -> PumpReport {
        let direction = self.direction;
        debug!(
            "pump {direction}: forwarding '{}' → '{}'",
            self.source.name(),
            self.destination.name()
        );

        let mut bytes_forwarded = 0u64;
        let mut chunks_forwarded = 0u64;

        let exit = loop {
            if self.shutdown.is_triggered() {
                break PumpExit::Shutdown;
            }

            // Endpoint reads are cancel-safe: nothing is consumed until the
            // read completes.
            let read = tokio::select! {
                biased;
                _ = self.shutdown.triggered() => None,
                result = self.source.read() => Some(result),
            };
            let chunk = match read {
                None => break PumpExit::Shutdown,
                Some(Ok(chunk)) => chunk,
                Some(Err(fault)) => break PumpExit::Fault(fault),
            };

            if chunk.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.poll_interval) => {}
                    _ = self.shutdown.triggered() => {}
                }
                continue;
            }

            let write = self.destination.write(&chunk);
            tokio::pin!(write);
            let (written, stopping) = tokio::select! {
                biased;
                result = &mut write => (Some(result), false),
                _ = self.shutdown.triggered() => {
                    let grace = tokio::time::timeout(self.settings.poll_interval, &mut write);
                    (grace.await.ok(), true)
                }
            };

            match written {
                None => {
                    debug!("pump {direction}: abandoned in-flight write of {} bytes", chunk.len());
                    break PumpExit::Shutdown;
                }
                Some(Err(fault)) => break PumpExit::Fault(fault),
                Some(Ok(())) => {
                    bytes_forwarded += chunk.len() as u64;
                    chunks_forwarded += 1;
                }
            }

            self.notify_observer(&chunk);

            if stopping {
                break PumpExit::Shutdown;
            }

            tokio::task::yield_now().await;
        };

        self.finish(&exit, bytes_forwarded);

        PumpReport {
            direction,
            bytes_forwarded,
            chunks_forwarded,
            exit,
        }
    }

    /// Hands a copy to the observer.  A failing or panicking observer costs
    /// the copy, never the pump.
    fn notify_observer(&self, chunk: &[u8]) {
        let Some(observer) = &self.observer else {
            return;
        };
        let direction = self.direction;
        match panic::catch_unwind(AssertUnwindSafe(|| observer.notify(direction, chunk))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("pump {direction}: observer dropped chunk: {e}"),
            Err(_) => warn!("pump {direction}: observer panicked; chunk not observed"),
        }
    }

    fn finish(&self, exit: &PumpExit, bytes_forwarded: u64) {
        let direction = self.direction;
        match exit {
            PumpExit::Shutdown => {
                debug!("pump {direction}: stopped after {bytes_forwarded} bytes");
            }
            PumpExit::Fault(fault) => {
                warn!("pump {direction}: stopped by fault after {bytes_forwarded} bytes: {fault}");
            }
        }

        let remaining = self.live.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        match remaining {
            0 => info!("bridge: all pumps stopped"),
            _ if exit.is_fault() => {
                warn!(
                    "bridge degraded: only {} still forwarding",
                    direction.reversed()
                );
            }
            _ => {}
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
