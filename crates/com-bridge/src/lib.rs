//! com-bridge library crate.
//!
//! Wires two concrete transports (serial lines, TCP sockets) into a
//! [`bridge_core::Bridge`] and mirrors the forwarded traffic to the console.
//!
//! # Architecture
//!
//! ```text
//! device A ⇄ [transport] ⇄ Endpoint A ─┐             ┌─ Endpoint B ⇄ [transport] ⇄ device B
//!                                      └─ bridge-core ┘
//!                                              │ copies
//!                                              ▼
//!                                       ConsoleObserver → stdout
//! ```
//!
//! - `domain/`          configuration types, endpoint descriptor parsing
//! - `application/`     the run lifecycle: open, start, wait, close
//! - `infrastructure/`  serial/TCP transports, console echo, config file I/O
//!
//! # Layer rules
//!
//! - `domain` does no I/O.
//! - `application` depends on `domain`, `infrastructure` and `bridge-core`.
//! - `infrastructure` owns everything that touches the OS.

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: bridge run lifecycle.
pub mod application;

/// Infrastructure layer: transports, console echo and config loading.
pub mod infrastructure;
