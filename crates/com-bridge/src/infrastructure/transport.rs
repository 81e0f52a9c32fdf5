//! Concrete transports behind [`Endpoint`].
//!
//! Each transport is opened once, split into read/write halves and handed to
//! [`Endpoint::new`].  From there on the bridge core neither knows nor cares
//! whether the bytes travel over a serial line or a socket.
//!
//! | Transport | Opens by                                   |
//! |-----------|--------------------------------------------|
//! | serial    | `tokio-serial`, 8N1, no flow control       |
//! | tcp       | `TcpStream::connect`                       |
//! | listen    | `TcpListener::bind`, then one `accept`     |

use std::io;

use bridge_core::{Endpoint, EndpointOpenError, EndpointOptions};
use tokio::net::{TcpListener, TcpStream};
use tracing::info;

use crate::domain::{EndpointConfig, TransportConfig};

/// Opens the transport described by `config` and wraps it as an [`Endpoint`].
///
/// A `listen` endpoint does not return until a peer has connected.
///
/// # Errors
///
/// Returns [`EndpointOpenError`] carrying the endpoint name, the transport
/// target and the underlying I/O error (device missing, access denied,
/// connection refused, address in use, ...).
pub async fn open_endpoint(
    config: &EndpointConfig,
    options: EndpointOptions,
) -> Result<Endpoint, EndpointOpenError> {
    let name = config.display_name().to_string();
    let target = config.transport.target().to_string();
    let open_error = |source: io::Error| EndpointOpenError {
        endpoint: name.clone(),
        target: target.clone(),
        source,
    };

    match &config.transport {
        TransportConfig::Serial { path, baud_rate } => {
            open_serial(&name, path, *baud_rate, options).map_err(open_error)
        }
        TransportConfig::Tcp { address } => {
            let stream = TcpStream::connect(address.as_str())
                .await
                .map_err(open_error)?;
            stream.set_nodelay(true).map_err(open_error)?;
            info!("endpoint '{name}': connected to {address}");
            Ok(tcp_endpoint(&name, stream, options))
        }
        TransportConfig::Listen { bind } => {
            let listener = TcpListener::bind(bind.as_str()).await.map_err(open_error)?;
            accept_single(&name, listener, options)
                .await
                .map_err(open_error)
        }
    }
}

/// Waits for exactly one peer on `listener`, then stops listening.
pub(crate) async fn accept_single(
    name: &str,
    listener: TcpListener,
    options: EndpointOptions,
) -> io::Result<Endpoint> {
    info!(
        "endpoint '{name}': waiting for a peer on {}",
        listener.local_addr()?
    );
    let (stream, peer) = listener.accept().await?;
    stream.set_nodelay(true)?;
    info!("endpoint '{name}': accepted {peer}");
    Ok(tcp_endpoint(name, stream, options))
}

fn tcp_endpoint(name: &str, stream: TcpStream, options: EndpointOptions) -> Endpoint {
    let (reader, writer) = stream.into_split();
    Endpoint::new(name, reader, writer, options)
}

#[cfg(feature = "serial")]
fn open_serial(
    name: &str,
    path: &str,
    baud_rate: u32,
    options: EndpointOptions,
) -> io::Result<Endpoint> {
    use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};

    let port = tokio_serial::new(path, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(io::Error::from)?;
    info!("endpoint '{name}': opened {path} at {baud_rate} baud");
    Ok(Endpoint::from_stream(name, port, options))
}

#[cfg(not(feature = "serial"))]
fn open_serial(
    _name: &str,
    _path: &str,
    _baud_rate: u32,
    _options: EndpointOptions,
) -> io::Result<Endpoint> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "serial support not compiled in (enable the `serial` feature)",
    ))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
