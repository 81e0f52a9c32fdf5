//! Domain layer for com-bridge.
//!
//! Pure configuration types.  Nothing here opens a port, reads a file or
//! spawns a task, so every rule about what a valid bridge looks like can be
//! tested without hardware.

pub mod config;

pub use config::{
    BridgeConfig, BridgeSection, EchoMode, EndpointConfig, InvalidConfig, TransportConfig,
    DEFAULT_BAUD_RATE,
};
