//! com-bridge: forwards bytes between two serial ports (or sockets) in both
//! directions and echoes the traffic to the console.
//!
//! # Usage
//!
//! ```text
//! com-bridge [OPTIONS]
//!
//! Options:
//!   -c, --config <PATH>             TOML configuration file
//!   -a, --endpoint-a <DESC>         Endpoint A
//!   -b, --endpoint-b <DESC>         Endpoint B
//!       --baud <BAUD>               Baud rate for serial endpoints without @BAUD
//!       --echo <MODE>               text | hex | off
//!       --poll-interval-ms <MS>     Idle backoff after an empty read
//! ```
//!
//! Endpoint descriptors: `serial:PATH[@BAUD]`, `tcp:HOST:PORT`, `listen:ADDR:PORT`,
//! or a bare serial path such as `COM8` or `/dev/ttyUSB0`.
//!
//! # Environment variable overrides
//!
//! | Variable              | Flag                 |
//! |-----------------------|----------------------|
//! | `COM_BRIDGE_CONFIG`   | `--config`           |
//! | `COM_BRIDGE_A`        | `--endpoint-a`       |
//! | `COM_BRIDGE_B`        | `--endpoint-b`       |
//! | `COM_BRIDGE_BAUD`     | `--baud`             |
//! | `COM_BRIDGE_ECHO`     | `--echo`             |
//! | `COM_BRIDGE_POLL_MS`  | `--poll-interval-ms` |
//!
//! Command-line values override the config file.  Log verbosity follows
//! `RUST_LOG` (default `info`); logs go to stderr so the echo on stdout stays
//! clean.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use com_bridge::application::{run, RunOutcome};
use com_bridge::domain::{
    BridgeConfig, EchoMode, EndpointConfig, TransportConfig, DEFAULT_BAUD_RATE,
};
use com_bridge::infrastructure::load_config;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Bidirectional serial/TCP byte bridge.
#[derive(Debug, Parser)]
#[command(
    name = "com-bridge",
    about = "Forwards bytes between two serial ports or sockets in both directions",
    version
)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "COM_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Endpoint A descriptor (`serial:PATH[@BAUD]`, `tcp:HOST:PORT`, `listen:ADDR:PORT` or a serial path).
    #[arg(short = 'a', long = "endpoint-a", env = "COM_BRIDGE_A")]
    endpoint_a: Option<String>,

    /// Endpoint B, same syntax as endpoint A.
    #[arg(short = 'b', long = "endpoint-b", env = "COM_BRIDGE_B")]
    endpoint_b: Option<String>,

    /// Baud rate for serial endpoints given on the command line without `@BAUD`.
    #[arg(long, env = "COM_BRIDGE_BAUD")]
    baud: Option<u32>,

    /// Console echo of forwarded traffic: text, hex or off.
    #[arg(long, env = "COM_BRIDGE_ECHO")]
    echo: Option<EchoMode>,

    /// Milliseconds a pump sleeps after a read returned no data.
    #[arg(long, env = "COM_BRIDGE_POLL_MS")]
    poll_interval_ms: Option<u64>,
}

impl Cli {
    /// Builds the effective [`BridgeConfig`]: the config file (if any) with
    /// command-line values layered on top, then validated.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded, an endpoint descriptor
    /// does not parse, or the merged configuration is invalid.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config '{}'", path.display()))?,
            None => BridgeConfig::default(),
        };

        let baud = self.baud.unwrap_or(DEFAULT_BAUD_RATE);
        if let Some(descriptor) = &self.endpoint_a {
            config.endpoint_a = Some(endpoint_from_descriptor(descriptor, baud, "A")?);
        }
        if let Some(descriptor) = &self.endpoint_b {
            config.endpoint_b = Some(endpoint_from_descriptor(descriptor, baud, "B")?);
        }
        if let Some(echo) = self.echo {
            config.bridge.echo = echo;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.bridge.poll_interval_ms = ms;
        }

        config.validate()?;
        Ok(config)
    }
}

fn endpoint_from_descriptor(
    descriptor: &str,
    baud: u32,
    side: &str,
) -> anyhow::Result<EndpointConfig> {
    let transport = TransportConfig::parse_descriptor(descriptor, baud)
        .with_context(|| format!("invalid descriptor for endpoint {side}: '{descriptor}'"))?;
    Ok(EndpointConfig::new(transport))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Cli::parse().into_bridge_config()?;

    // Resolves on Ctrl+C.  If the handler cannot be installed the bridge
    // keeps running until both sides fail.
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, stopping bridge"),
            Err(e) => {
                error!("failed to listen for Ctrl+C signal: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    match run(&config, ctrl_c).await? {
        RunOutcome::Completed(report) => info!(
            "com-bridge stopped ({} bytes forwarded)",
            report.total_bytes()
        ),
        RunOutcome::Interrupted => info!("com-bridge stopped before the bridge started"),
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["com-bridge"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_cli_defaults_are_empty() {
        let cli = Cli {
            config: None,
            endpoint_a: None,
            endpoint_b: None,
            baud: None,
            echo: None,
            poll_interval_ms: None,
        };

        // Without endpoints the merged config must be rejected.
        assert!(cli.into_bridge_config().is_err());
    }

    #[test]
    fn test_cli_short_endpoint_flags() {
        let cli = cli(&["-a", "COM8", "-b", "COM6"]);
        assert_eq!(cli.endpoint_a.as_deref(), Some("COM8"));
        assert_eq!(cli.endpoint_b.as_deref(), Some("COM6"));
    }

    #[test]
    fn test_cli_echo_parses_mode() {
        let cli = cli(&["--echo", "hex"]);
        assert_eq!(cli.echo, Some(EchoMode::Hex));
    }

    #[test]
    fn test_into_bridge_config_serial_pair_with_defaults() {
        let config = cli(&["-a", "COM8", "-b", "COM6"])
            .into_bridge_config()
            .unwrap();

        assert_eq!(
            config.endpoint_a.unwrap().transport,
            TransportConfig::Serial {
                path: "COM8".into(),
                baud_rate: 115_200
            }
        );
        assert_eq!(config.bridge.poll_interval_ms, 5);
        assert_eq!(config.bridge.echo, EchoMode::Text);
    }

    #[test]
    fn test_into_bridge_config_baud_applies_to_descriptors_without_suffix() {
        let config = cli(&["-a", "COM8", "-b", "COM6@9600", "--baud", "57600"])
            .into_bridge_config()
            .unwrap();

        assert!(matches!(
            config.endpoint_a.unwrap().transport,
            TransportConfig::Serial { baud_rate: 57_600, .. }
        ));
        assert!(matches!(
            config.endpoint_b.unwrap().transport,
            TransportConfig::Serial { baud_rate: 9600, .. }
        ));
    }

    #[test]
    fn test_into_bridge_config_mixed_transports() {
        let config = cli(&["-a", "serial:/dev/ttyUSB0", "-b", "tcp:127.0.0.1:7000"])
            .into_bridge_config()
            .unwrap();

        assert_eq!(
            config.endpoint_b.unwrap().transport,
            TransportConfig::Tcp {
                address: "127.0.0.1:7000".into()
            }
        );
    }

    #[test]
    fn test_into_bridge_config_poll_interval_override() {
        let config = cli(&["-a", "COM8", "-b", "COM6", "--poll-interval-ms", "20"])
            .into_bridge_config()
            .unwrap();
        assert_eq!(config.bridge.poll_interval_ms, 20);
    }

    #[test]
    fn test_into_bridge_config_zero_poll_interval_is_error() {
        let result = cli(&["-a", "COM8", "-b", "COM6", "--poll-interval-ms", "0"])
            .into_bridge_config();
        assert!(result.is_err());
    }

    #[test]
    fn test_into_bridge_config_bad_descriptor_is_error() {
        let result = cli(&["-a", "COM8@fast", "-b", "COM6"]).into_bridge_config();
        assert!(result.is_err());
    }

    #[test]
    fn test_into_bridge_config_cli_overrides_file() {
        // Arrange: a file that sets both endpoints and hex echo
        let path = std::env::temp_dir().join(format!("com-bridge-cli-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
            [bridge]
            echo = "hex"

            [endpoint_a]
            transport = "serial"
            path = "COM1"

            [endpoint_b]
            transport = "serial"
            path = "COM2"
            "#,
        )
        .unwrap();
        let path_arg = path.to_string_lossy().into_owned();

        // Act: override B and the echo mode on the command line
        let result = cli(&["--config", &path_arg, "-b", "tcp:127.0.0.1:7000", "--echo", "off"])
            .into_bridge_config();
        let _ = std::fs::remove_file(&path);
        let config = result.unwrap();

        // Assert
        assert_eq!(config.endpoint_a.unwrap().transport.target(), "COM1");
        assert_eq!(config.endpoint_b.unwrap().transport.target(), "127.0.0.1:7000");
        assert_eq!(config.bridge.echo, EchoMode::Off);
    }

    #[test]
    fn test_into_bridge_config_missing_file_is_error() {
        let result = cli(&["--config", "/nonexistent/com-bridge.toml"]).into_bridge_config();
        assert!(result.is_err());
    }
}
