//! The bridge run lifecycle.
//!
//! ```text
//! validate config
//!   → open A → open B (on failure: close A, abort)
//!   → attach console echo → start
//!   → wait until both pumps die or `shutdown` resolves
//!   → flush echo → close A and B
//! ```
//!
//! The caller owns the shutdown trigger (Ctrl+C in the binary, a channel in
//! tests) and passes it in as a future.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bridge_core::{Bridge, BridgeReport, Endpoint, EndpointOptions, Observer, PumpExit};
use tracing::{info, warn};

use crate::domain::{BridgeConfig, EchoMode};
use crate::infrastructure::{open_endpoint, ConsoleObserver};

/// Upper bound on how long queued echo output may delay process exit.
const ECHO_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The bridge ran and has stopped; per-direction statistics attached.
    Completed(BridgeReport),
    /// `shutdown` resolved while endpoints were still being opened.
    Interrupted,
}

/// Runs one bridge described by `config` until `shutdown` resolves or both
/// directions have failed.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, if either endpoint
/// cannot be opened, or if the bridge cannot be started.  Endpoint faults
/// while running are not errors; they show up in the returned report.
pub async fn run<F>(config: &BridgeConfig, shutdown: F) -> anyhow::Result<RunOutcome>
where
    F: Future<Output = ()>,
{
    config.validate()?;
    tokio::pin!(shutdown);

    let options = config.bridge.endpoint_options();
    let (a, b) = tokio::select! {
        opened = open_pair(config, options) => opened?,
        _ = &mut shutdown => {
            info!("interrupted while opening endpoints");
            return Ok(RunOutcome::Interrupted);
        }
    };

    let echo = match config.bridge.echo {
        EchoMode::Off => None,
        mode => Some(ConsoleObserver::stdout(mode, config.bridge.echo_queue)),
    };

    let mut bridge = Bridge::new(
        Arc::clone(&a),
        Arc::clone(&b),
        config.bridge.pump_settings(),
    );
    let writer = match echo {
        Some((observer, writer)) => {
            let observer: Arc<dyn Observer> = Arc::new(observer);
            bridge = bridge.with_observer(observer);
            Some(writer)
        }
        None => None,
    };

    if let Err(e) = bridge.start() {
        close_quietly(&a).await;
        close_quietly(&b).await;
        return Err(e).context("failed to start bridge");
    }
    info!(
        "bridge running between {} <-> {}",
        bridge.endpoint_a().name(),
        bridge.endpoint_b().name()
    );
    info!("press Ctrl+C to stop");

    let result = tokio::select! {
        report = bridge.wait() => report,
        _ = &mut shutdown => bridge.stop().await,
    };

    // The bridge holds the last observer reference; dropping it lets the
    // echo task drain and exit.
    drop(bridge);
    if let Some(writer) = writer {
        if tokio::time::timeout(ECHO_FLUSH_TIMEOUT, writer.finish())
            .await
            .is_err()
        {
            warn!("console echo did not drain within {ECHO_FLUSH_TIMEOUT:?}");
        }
    }

    close_quietly(&a).await;
    close_quietly(&b).await;

    let report = result.context("bridge terminated abnormally")?;
    for pump in [&report.a_to_b, &report.b_to_a] {
        if let PumpExit::Fault(fault) = &pump.exit {
            warn!("{} stopped: {fault}", pump.direction);
        }
    }
    info!("ports closed");
    Ok(RunOutcome::Completed(report))
}

/// Opens A, then B.  If B fails, A is closed again before returning.
async fn open_pair(
    config: &BridgeConfig,
    options: EndpointOptions,
) -> anyhow::Result<(Arc<Endpoint>, Arc<Endpoint>)> {
    let (a_config, b_config) = config.endpoints()?;

    let a = open_endpoint(a_config, options)
        .await
        .context("failed to open endpoint A")?;
    let b = match open_endpoint(b_config, options).await {
        Ok(b) => b,
        Err(e) => {
            close_quietly(&a).await;
            return Err(e).context("failed to open endpoint B");
        }
    };
    Ok((Arc::new(a), Arc::new(b)))
}

async fn close_quietly(endpoint: &Endpoint) {
    if let Err(e) = endpoint.close().await {
        warn!("{e}");
    }
}
