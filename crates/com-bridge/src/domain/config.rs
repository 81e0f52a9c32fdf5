//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for runtime settings.  It is
//! deserialized from a TOML file and/or assembled from CLI arguments; the
//! infrastructure layer does the reading, this module only describes the
//! shape and validates it.
//!
//! # File format
//!
//! ```toml
//! [bridge]
//! poll_interval_ms = 5      # idle backoff after an empty read
//! read_timeout_ms = 0       # 0 = poll, never wait for data
//! read_buffer_size = 1024   # max bytes per read
//! echo = "text"             # text | hex | off
//!
//! [endpoint_a]
//! name = "device-a"
//! transport = "serial"
//! path = "/dev/ttyUSB0"
//! baud_rate = 115200
//!
//! [endpoint_b]
//! transport = "tcp"
//! address = "127.0.0.1:7000"
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bridge_core::{EndpointOptions, PumpSettings};
use serde::Deserialize;
use thiserror::Error;

/// Baud rate used when a serial endpoint does not specify one.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// A configuration value that parsed but makes no sense.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration: {0}")]
pub struct InvalidConfig(pub String);

// ── Echo mode ─────────────────────────────────────────────────────────────────

/// How forwarded bytes are mirrored to the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EchoMode {
    /// Best-effort UTF-8 text, invalid bytes dropped.
    #[default]
    Text,
    /// One line of hex bytes per forwarded chunk.
    Hex,
    /// No echo; no observer is attached.
    Off,
}

impl FromStr for EchoMode {
    type Err = InvalidConfig;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(EchoMode::Text),
            "hex" => Ok(EchoMode::Hex),
            "off" | "none" => Ok(EchoMode::Off),
            other => Err(InvalidConfig(format!(
                "unknown echo mode '{other}' (expected text, hex or off)"
            ))),
        }
    }
}

// ── Transports ────────────────────────────────────────────────────────────────

/// Where an endpoint's bytes come from and go to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum TransportConfig {
    /// A serial line (`COM8`, `/dev/ttyUSB0`), 8N1, no flow control.
    Serial {
        path: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
    /// Outbound TCP connection to `host:port`.
    Tcp { address: String },
    /// Listen on `addr:port` and bridge the first peer that connects.
    Listen { bind: String },
}

impl TransportConfig {
    /// Parses an endpoint descriptor as accepted on the command line.
    ///
    /// | Descriptor                | Result                               |
    /// |--------------------------|--------------------------------------|
    /// | `serial:PATH[@BAUD]`     | serial line                          |
    /// | `tcp:HOST:PORT`          | TCP connect                          |
    /// | `listen:ADDR:PORT`       | TCP listen, single peer              |
    /// | `PATH[@BAUD]`            | serial line (shorthand)              |
    ///
    /// `default_baud` applies when a serial descriptor has no `@BAUD` suffix.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfig`] for empty descriptors, empty addresses and
    /// non-numeric or zero baud rates.
    pub fn parse_descriptor(descriptor: &str, default_baud: u32) -> Result<Self, InvalidConfig> {
        let descriptor = descriptor.trim();
        if descriptor.is_empty() {
            return Err(InvalidConfig("empty endpoint descriptor".into()));
        }

        if let Some(address) = descriptor.strip_prefix("tcp:") {
            return Ok(TransportConfig::Tcp {
                address: non_empty(address, "tcp address")?,
            });
        }
        if let Some(bind) = descriptor.strip_prefix("listen:") {
            return Ok(TransportConfig::Listen {
                bind: non_empty(bind, "listen address")?,
            });
        }

        let serial = descriptor.strip_prefix("serial:").unwrap_or(descriptor);
        let (path, baud_rate) = match serial.rsplit_once('@') {
            Some((path, baud)) => {
                let baud_rate = baud
                    .parse::<u32>()
                    .map_err(|_| InvalidConfig(format!("invalid baud rate '{baud}'")))?;
                (path, baud_rate)
            }
            None => (serial, default_baud),
        };
        if baud_rate == 0 {
            return Err(InvalidConfig("baud rate must be greater than zero".into()));
        }

        Ok(TransportConfig::Serial {
            path: non_empty(path, "serial path")?,
            baud_rate,
        })
    }

    /// True if both transports would claim the same device or bind address.
    ///
    /// Two outbound TCP connections to one address are distinct streams and
    /// do not conflict.
    pub fn conflicts_with(&self, other: &TransportConfig) -> bool {
        match (self, other) {
            (TransportConfig::Serial { path: a, .. }, TransportConfig::Serial { path: b, .. }) => {
                a == b
            }
            (TransportConfig::Listen { bind: a }, TransportConfig::Listen { bind: b }) => a == b,
            _ => false,
        }
    }

    /// Human-readable address: device path, `host:port` or bind address.
    pub fn target(&self) -> &str {
        match self {
            TransportConfig::Serial { path, .. } => path,
            TransportConfig::Tcp { address } => address,
            TransportConfig::Listen { bind } => bind,
        }
    }
}

impl FromStr for TransportConfig {
    type Err = InvalidConfig;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_descriptor(s, DEFAULT_BAUD_RATE)
    }
}

impl fmt::Display for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportConfig::Serial { path, baud_rate } => write!(f, "serial {path} @ {baud_rate}"),
            TransportConfig::Tcp { address } => write!(f, "tcp {address}"),
            TransportConfig::Listen { bind } => write!(f, "listen {bind}"),
        }
    }
}

fn non_empty(value: &str, what: &str) -> Result<String, InvalidConfig> {
    let value = value.trim();
    if value.is_empty() {
        Err(InvalidConfig(format!("{what} must not be empty")))
    } else {
        Ok(value.to_string())
    }
}

// ── Endpoints ─────────────────────────────────────────────────────────────────

/// One side of the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointConfig {
    /// Logical name for logs.  Defaults to the transport target.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub transport: TransportConfig,
}

impl EndpointConfig {
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            name: None,
            transport,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.transport.target())
    }
}

// ── Bridge settings ───────────────────────────────────────────────────────────

/// Forwarding and echo settings (the `[bridge]` table).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BridgeSection {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub read_timeout_ms: u64,
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    #[serde(default)]
    pub echo: EchoMode,
    /// Chunks the console echo may hold before it starts dropping copies.
    #[serde(default = "default_echo_queue")]
    pub echo_queue: usize,
}

impl BridgeSection {
    pub fn endpoint_options(&self) -> EndpointOptions {
        EndpointOptions {
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            read_buffer_size: self.read_buffer_size,
        }
    }

    pub fn pump_settings(&self) -> PumpSettings {
        PumpSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            read_timeout_ms: 0,
            read_buffer_size: default_read_buffer_size(),
            echo: EchoMode::default(),
            echo_queue: default_echo_queue(),
        }
    }
}

/// All runtime configuration for one bridge process.
///
/// The endpoints are optional here because the file and the command line
/// may each provide some of them; [`validate`](Self::validate) insists that
/// both are present in the end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub endpoint_a: Option<EndpointConfig>,
    #[serde(default)]
    pub endpoint_b: Option<EndpointConfig>,
}

impl BridgeConfig {
    /// Returns both endpoint configurations.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfig`] naming the first missing endpoint.
    pub fn endpoints(&self) -> Result<(&EndpointConfig, &EndpointConfig), InvalidConfig> {
        let a = self
            .endpoint_a
            .as_ref()
            .ok_or_else(|| InvalidConfig("endpoint A is not configured".into()))?;
        let b = self
            .endpoint_b
            .as_ref()
            .ok_or_else(|| InvalidConfig("endpoint B is not configured".into()))?;
        Ok((a, b))
    }

    /// Checks that the configuration can actually run.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfig`] for missing endpoints, a zero poll interval,
    /// a zero read buffer, a zero echo queue, a zero baud rate, or two
    /// endpoints on the same serial device or listen address.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        let (a, b) = self.endpoints()?;

        if self.bridge.poll_interval_ms == 0 {
            return Err(InvalidConfig("poll_interval_ms must be greater than zero".into()));
        }
        if self.bridge.read_buffer_size == 0 {
            return Err(InvalidConfig("read_buffer_size must be greater than zero".into()));
        }
        if self.bridge.echo != EchoMode::Off && self.bridge.echo_queue == 0 {
            return Err(InvalidConfig("echo_queue must be greater than zero".into()));
        }
        for endpoint in [a, b] {
            if let TransportConfig::Serial { baud_rate: 0, .. } = endpoint.transport {
                return Err(InvalidConfig(format!(
                    "endpoint '{}': baud rate must be greater than zero",
                    endpoint.display_name()
                )));
            }
        }
        if a.transport.conflicts_with(&b.transport) {
            return Err(InvalidConfig(format!(
                "both endpoints use the same {}",
                a.transport.target()
            )));
        }
        Ok(())
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}
fn default_poll_interval_ms() -> u64 {
    5
}
fn default_read_buffer_size() -> usize {
    bridge_core::endpoint::DEFAULT_READ_BUFFER_SIZE
}
fn default_echo_queue() -> usize {
    256
}

// ── Tests ─────────────────────────────────────────────────────────────────────
