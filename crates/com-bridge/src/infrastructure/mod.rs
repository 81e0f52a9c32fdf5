//! Infrastructure layer for com-bridge.
//!
//! # Responsibilities
//!
//! - Opening serial ports and TCP connections as [`bridge_core::Endpoint`]s
//! - Writing the console echo without ever blocking a pump
//! - Reading the TOML configuration file
//!
//! Configuration *rules* live in the domain layer; merging CLI arguments
//! happens in `main.rs`.

pub mod config_file;
pub mod console;
pub mod transport;

pub use config_file::{load_config, parse_config, ConfigError};
pub use console::{ConsoleObserver, ConsoleWriter};
pub use transport::open_endpoint;
