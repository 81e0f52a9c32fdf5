//! # bridge-core
//!
//! Joins two independent byte-stream endpoints and forwards data between
//! them in both directions until told to stop.
//!
//! The crate knows nothing about serial ports, sockets or consoles.  It deals
//! in `tokio::io::AsyncRead` / `AsyncWrite` halves, so any transport tokio can
//! drive (serial line, TCP stream, Unix pipe, in-memory duplex) can sit on
//! either side.
//!
//! # Building blocks
//!
//! - **`endpoint`** – [`Endpoint`]: a named transport handle offering a
//!   non-blocking `read`, an ordered `write` and an idempotent `close`.
//! - **`pump`** – the forwarding loop for one direction.
//! - **`bridge`** – [`Bridge`]: owns the pair of pumps and their lifecycle
//!   (`start`, `wait`, `stop`).
//! - **`observer`** – [`Observer`]: a best-effort sink that sees a copy of
//!   every forwarded chunk.
//! - **`shutdown`** – the cooperative stop signal shared by the pumps.
//! - **`error`** – the fault and misuse taxonomy.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bridge_core::{Bridge, Endpoint, EndpointOptions, PumpSettings};
//!
//! # async fn example(
//! #     a: tokio::net::TcpStream,
//! #     b: tokio::net::TcpStream,
//! # ) -> Result<(), bridge_core::BridgeError> {
//! let a = Arc::new(Endpoint::from_stream("A", a, EndpointOptions::default()));
//! let b = Arc::new(Endpoint::from_stream("B", b, EndpointOptions::default()));
//!
//! let mut bridge = Bridge::new(a, b, PumpSettings::default());
//! bridge.start()?;
//! let report = bridge.wait().await?;
//! println!("forwarded {} bytes", report.total_bytes());
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod endpoint;
pub mod error;
pub mod observer;
pub mod pump;
pub mod shutdown;

pub use bridge::{Bridge, BridgeReport, BridgeStatus};
pub use endpoint::{Endpoint, EndpointOptions};
pub use error::{
    BridgeError, EndpointFault, EndpointOpenError, FaultKind, ObserverError, Operation,
};
pub use observer::{Observer, RecordingObserver};
pub use pump::{Direction, PumpExit, PumpReport, PumpSettings};
pub use shutdown::ShutdownHandle;
