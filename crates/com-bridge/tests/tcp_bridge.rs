//! End-to-end runs of the bridge lifecycle over real TCP sockets.
//!
//! Each "device" is a local `TcpListener`; the bridge connects out to both
//! with `tcp:` endpoints, so the full open → start → wait → close path runs
//! without serial hardware.

use std::time::Duration;

use com_bridge::application::{run, RunOutcome};
use com_bridge::domain::{BridgeConfig, BridgeSection, EchoMode, EndpointConfig, TransportConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

async fn device() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

fn tcp(name: &str, address: &str) -> EndpointConfig {
    EndpointConfig {
        name: Some(name.into()),
        transport: TransportConfig::Tcp {
            address: address.into(),
        },
    }
}

fn config(a: EndpointConfig, b: EndpointConfig) -> BridgeConfig {
    BridgeConfig {
        bridge: BridgeSection {
            poll_interval_ms: 1,
            echo: EchoMode::Off,
            ..BridgeSection::default()
        },
        endpoint_a: Some(a),
        endpoint_b: Some(b),
    }
}

async fn receive(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    tokio::time::timeout(Duration::from_secs(5), stream.read_exact(&mut buf))
        .await
        .expect("bytes must arrive in time")
        .expect("device read");
    buf
}

#[tokio::test]
async fn test_tcp_bridge_forwards_both_ways_until_shutdown() {
    // Arrange
    let (a_listener, a_addr) = device().await;
    let (b_listener, b_addr) = device().await;
    let config = config(tcp("A", &a_addr), tcp("B", &b_addr));
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let bridge = tokio::spawn(async move {
        run(&config, async {
            let _ = stop_rx.await;
        })
        .await
    });
    let (mut a_device, _) = a_listener.accept().await.unwrap();
    let (mut b_device, _) = b_listener.accept().await.unwrap();

    // Act
    a_device.write_all(b"ping\n").await.unwrap();
    assert_eq!(receive(&mut b_device, 5).await, b"ping\n");
    b_device.write_all(b"pong\n").await.unwrap();
    assert_eq!(receive(&mut a_device, 5).await, b"pong\n");

    stop_tx.send(()).unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(5), bridge)
        .await
        .expect("run must return after shutdown")
        .unwrap()
        .unwrap();

    // Assert: statistics, and both devices see their connection closed.
    match outcome {
        RunOutcome::Completed(report) => {
            assert!(report.is_clean());
            assert_eq!(report.a_to_b.bytes_forwarded, 5);
            assert_eq!(report.b_to_a.bytes_forwarded, 5);
        }
        RunOutcome::Interrupted => panic!("bridge should have run"),
    }
    let mut buf = [0u8; 8];
    assert_eq!(a_device.read(&mut buf).await.unwrap(), 0);
    assert_eq!(b_device.read(&mut buf).await.unwrap(), 0);
}

#[tokio::test]
async fn test_both_devices_hanging_up_ends_run() {
    let (a_listener, a_addr) = device().await;
    let (b_listener, b_addr) = device().await;
    let config = config(tcp("A", &a_addr), tcp("B", &b_addr));

    let bridge = tokio::spawn(async move { run(&config, std::future::pending()).await });
    let (a_device, _) = a_listener.accept().await.unwrap();
    let (b_device, _) = b_listener.accept().await.unwrap();
    drop(a_device);
    drop(b_device);

    let outcome = tokio::time::timeout(Duration::from_secs(5), bridge)
        .await
        .expect("total loss must end the run")
        .unwrap()
        .unwrap();

    match outcome {
        RunOutcome::Completed(report) => {
            assert!(report.a_to_b.exit.is_fault());
            assert!(report.b_to_a.exit.is_fault());
        }
        RunOutcome::Interrupted => panic!("bridge should have run"),
    }
}

#[tokio::test]
async fn test_failure_to_open_b_closes_a() {
    // Arrange: A is a live device, B's port has nothing listening.
    let (a_listener, a_addr) = device().await;
    let dead_addr = {
        let (listener, addr) = device().await;
        drop(listener);
        addr
    };
    let config = config(tcp("A", &a_addr), tcp("B", &dead_addr));

    // Act
    let bridge = tokio::spawn(async move { run(&config, std::future::pending()).await });
    let (mut a_device, _) = a_listener.accept().await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), bridge)
        .await
        .unwrap()
        .unwrap();

    // Assert
    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("endpoint B"), "{err:#}");
    let mut buf = [0u8; 1];
    assert_eq!(a_device.read(&mut buf).await.unwrap(), 0, "A must be closed");
}

#[tokio::test]
async fn test_shutdown_while_waiting_for_listen_peer_interrupts() {
    let a = EndpointConfig::new(TransportConfig::Listen {
        bind: "127.0.0.1:0".into(),
    });
    let b = tcp("B", "127.0.0.1:9");
    let config = config(a, b);

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        run(&config, std::future::ready(())),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(matches!(outcome, RunOutcome::Interrupted));
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_opening_anything() {
    let mut config = config(tcp("A", "127.0.0.1:1"), tcp("B", "127.0.0.1:2"));
    config.endpoint_b = None;

    let result = run(&config, std::future::pending()).await;

    assert!(result.is_err());
}
