//! The bridge: two endpoints, two pumps, one lifecycle.
//!
//! ```text
//!            ┌──────── pump a->b ────────┐
//! Endpoint A ┤                           ├ Endpoint B
//!            └──────── pump b->a ────────┘
//!                        │
//!                   Observer (optional copy of every chunk)
//! ```
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start()──▶ Running ──one pump faults──▶ Degraded ──other pump exits──▶ Stopped
//!                      │                                                          ▲
//!                      └──────────────── stop() / ShutdownHandle ─────────────────┘
//! ```
//!
//! - `start()` spawns both pumps or neither.
//! - `wait()` returns once *both* pumps have exited, whether because of a
//!   stop request or because each one hit a fault.  A single faulted pump
//!   leaves the other direction forwarding.
//! - A stopped bridge cannot be restarted.
//! - The bridge never closes its endpoints; that is the caller's job.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use crate::endpoint::Endpoint;
use crate::error::BridgeError;
use crate::observer::Observer;
use crate::pump::{Direction, Pump, PumpReport, PumpSettings};
use crate::shutdown::{ShutdownHandle, ShutdownSignal};

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStatus {
    /// Constructed, not yet started.
    Idle,
    /// Both pumps forwarding.
    Running,
    /// One pump has exited; the other is still forwarding.
    Degraded,
    /// No pump is running.
    Stopped,
}

/// Outcome of a bridge run, one report per direction.
#[derive(Debug)]
pub struct BridgeReport {
    pub a_to_b: PumpReport,
    pub b_to_a: PumpReport,
}

impl BridgeReport {
    /// `true` when neither pump stopped because of a fault.
    pub fn is_clean(&self) -> bool {
        !self.a_to_b.exit.is_fault() && !self.b_to_a.exit.is_fault()
    }

    pub fn total_bytes(&self) -> u64 {
        self.a_to_b.bytes_forwarded + self.b_to_a.bytes_forwarded
    }
}

/// A spawned pump plus its result once joined.
///
/// The result is stored as soon as the join completes so that a cancelled
/// `wait()` never polls a finished `JoinHandle` a second time.
struct PumpTask {
    handle: JoinHandle<PumpReport>,
    outcome: Option<Result<PumpReport, JoinError>>,
}

impl PumpTask {
    fn new(handle: JoinHandle<PumpReport>) -> Self {
        Self {
            handle,
            outcome: None,
        }
    }

    async fn settle(&mut self) {
        if self.outcome.is_none() {
            self.outcome = Some((&mut self.handle).await);
        }
    }
}

struct RunningPumps {
    a_to_b: PumpTask,
    b_to_a: PumpTask,
}

enum State {
    Idle,
    Running(RunningPumps),
    Stopped,
}

/// Joins two endpoints and forwards bytes between them in both directions.
pub struct Bridge {
    endpoint_a: Arc<Endpoint>,
    endpoint_b: Arc<Endpoint>,
    observer: Option<Arc<dyn Observer>>,
    settings: PumpSettings,
    shutdown: Arc<ShutdownSignal>,
    live: Arc<AtomicUsize>,
    state: State,
}

impl Bridge {
    pub fn new(endpoint_a: Arc<Endpoint>, endpoint_b: Arc<Endpoint>, settings: PumpSettings) -> Self {
        Self {
            endpoint_a,
            endpoint_b,
            observer: None,
            settings,
            shutdown: Arc::new(ShutdownSignal::new()),
            live: Arc::new(AtomicUsize::new(0)),
            state: State::Idle,
        }
    }

    /// Attaches an observer that receives a copy of every forwarded chunk.
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn endpoint_a(&self) -> &Arc<Endpoint> {
        &self.endpoint_a
    }

    pub fn endpoint_b(&self) -> &Arc<Endpoint> {
        &self.endpoint_b
    }

    pub fn status(&self) -> BridgeStatus {
        match self.state {
            State::Idle => BridgeStatus::Idle,
            State::Stopped => BridgeStatus::Stopped,
            State::Running(_) => match self.live.load(Ordering::Acquire) {
                0 => BridgeStatus::Stopped,
                1 => BridgeStatus::Degraded,
                _ => BridgeStatus::Running,
            },
        }
    }

    /// Returns a handle that stops this bridge from another task.
    ///
    /// Triggering it before `start()` makes the pumps exit on their first
    /// iteration.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(Arc::clone(&self.shutdown))
    }

    /// Spawns both pumps on the current tokio runtime.
    ///
    /// All preconditions are checked before anything is spawned, so on error
    /// the bridge is left exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::AlreadyRunning`] / [`BridgeError::AlreadyStopped`]
    /// - [`BridgeError::EndpointClosed`] if either endpoint is closed
    /// - [`BridgeError::SameEndpoint`] if A and B are the same endpoint
    /// - [`BridgeError::NoRuntime`] when called outside a tokio runtime
    pub fn start(&mut self) -> Result<(), BridgeError> {
        match self.state {
            State::Idle => {}
            State::Running(_) => return Err(BridgeError::AlreadyRunning),
            State::Stopped => return Err(BridgeError::AlreadyStopped),
        }
        if Arc::ptr_eq(&self.endpoint_a, &self.endpoint_b) {
            return Err(BridgeError::SameEndpoint(self.endpoint_a.name().to_string()));
        }
        for endpoint in [&self.endpoint_a, &self.endpoint_b] {
            if endpoint.is_closed() {
                return Err(BridgeError::EndpointClosed(endpoint.name().to_string()));
            }
        }
        let runtime = Handle::try_current().map_err(|_| BridgeError::NoRuntime)?;

        self.live.store(2, Ordering::Release);
        let a_to_b = runtime.spawn(self.pump(Direction::AToB).run());
        let b_to_a = runtime.spawn(self.pump(Direction::BToA).run());
        self.state = State::Running(RunningPumps {
            a_to_b: PumpTask::new(a_to_b),
            b_to_a: PumpTask::new(b_to_a),
        });

        info!(
            "bridge started: '{}' <-> '{}'",
            self.endpoint_a.name(),
            self.endpoint_b.name()
        );
        Ok(())
    }

    /// Waits until both pumps have exited and returns their reports.
    ///
    /// Cancel-safe: dropping the returned future leaves the bridge running
    /// and `wait()` can be called again.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotRunning`] if the bridge was never started or has
    /// already been waited on; [`BridgeError::PumpPanicked`] if a pump task
    /// panicked.
    pub async fn wait(&mut self) -> Result<BridgeReport, BridgeError> {
        let State::Running(pumps) = &mut self.state else {
            return Err(BridgeError::NotRunning);
        };

        tokio::join!(pumps.a_to_b.settle(), pumps.b_to_a.settle());
        let a_to_b = pumps.a_to_b.outcome.take();
        let b_to_a = pumps.b_to_a.outcome.take();
        self.state = State::Stopped;
        // Everything is down; make the handle reflect that too.
        self.shutdown.trigger();

        let report = BridgeReport {
            a_to_b: joined(Direction::AToB, a_to_b)?,
            b_to_a: joined(Direction::BToA, b_to_a)?,
        };

        if report.is_clean() {
            info!(
                "bridge stopped: {} bytes a->b, {} bytes b->a",
                report.a_to_b.bytes_forwarded, report.b_to_a.bytes_forwarded
            );
        } else {
            warn!(
                "bridge stopped after endpoint faults: {} bytes a->b, {} bytes b->a",
                report.a_to_b.bytes_forwarded, report.b_to_a.bytes_forwarded
            );
        }
        Ok(report)
    }

    /// Signals both pumps to stop and waits for them to unwind.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotRunning`] if the bridge is idle or already stopped.
    pub async fn stop(&mut self) -> Result<BridgeReport, BridgeError> {
        if !matches!(self.state, State::Running(_)) {
            return Err(BridgeError::NotRunning);
        }
        info!("bridge: stop requested");
        self.shutdown.trigger();
        self.wait().await
    }

    fn pump(&self, direction: Direction) -> Pump {
        let (source, destination) = match direction {
            Direction::AToB => (&self.endpoint_a, &self.endpoint_b),
            Direction::BToA => (&self.endpoint_b, &self.endpoint_a),
        };
        Pump {
            direction,
            source: Arc::clone(source),
            destination: Arc::clone(destination),
            observer: self.observer.clone(),
            shutdown: Arc::clone(&self.shutdown),
            settings: self.settings,
            live: Arc::clone(&self.live),
        }
    }
}

impl Drop for Bridge {
    /// Pumps hold only `Arc`s, so a dropped bridge would otherwise leave them
    /// forwarding in the background.
    fn drop(&mut self) {
        if matches!(self.state, State::Running(_)) {
            self.shutdown.trigger();
        }
    }
}

fn joined(
    direction: Direction,
    outcome: Option<Result<PumpReport, JoinError>>,
) -> Result<PumpReport, BridgeError> {
    match outcome {
        Some(Ok(report)) => Ok(report),
        _ => Err(BridgeError::PumpPanicked { direction }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
