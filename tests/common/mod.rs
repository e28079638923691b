//! Shared utilities for integration testing.
//!
//! Mock backends are raw TCP servers on ephemeral ports; the balancer under
//! test listens on an ephemeral port as well.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use tcp_balancer::config::ConfigSnapshot;
use tcp_balancer::lifecycle::Shutdown;
use tcp_balancer::load_balancer::BackendEndpoint;
use tcp_balancer::net::Listener;
use tcp_balancer::BalancerServer;

/// Start a backend that writes `response` to every client and closes.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_counting_backend(response, Arc::new(AtomicUsize::new(0))).await
}

/// Like [`start_mock_backend`], counting accepted connections.
pub async fn start_counting_backend(response: &'static str, accepted: Arc<AtomicUsize>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            accepted.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Start a backend that echoes everything it reads.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// Start a backend that reads the whole request, then answers `got <len>`.
pub async fn start_counting_reply_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                if socket.read_to_end(&mut request).await.is_ok() {
                    let _ = socket.write_all(format!("got {}", request.len()).as_bytes()).await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Start a backend that streams `payload` to every client and closes.
pub async fn start_payload_backend(payload: Arc<Vec<u8>>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let payload = Arc::clone(&payload);
            tokio::spawn(async move {
                let _ = socket.write_all(&payload).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Deterministic test payload.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Snapshot listening on an ephemeral port with active health checks off.
pub fn snapshot(backends: &[SocketAddr]) -> ConfigSnapshot {
    let mut snapshot = ConfigSnapshot::new(
        "127.0.0.1:0".parse().unwrap(),
        backends.iter().copied().map(BackendEndpoint::new).collect(),
    );
    snapshot.health.enabled = false;
    snapshot.connect_timeout = Duration::from_millis(500);
    snapshot.drain_window = Duration::from_millis(200);
    snapshot
}

pub struct TestBalancer {
    pub addr: SocketAddr,
    pub server: BalancerServer,
    pub shutdown: Shutdown,
    pub updates: mpsc::UnboundedSender<ConfigSnapshot>,
}

/// Bind and run a balancer for `snapshot`.
pub async fn start_balancer(snapshot: ConfigSnapshot) -> TestBalancer {
    let listener = Listener::bind(&snapshot).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = BalancerServer::new(&snapshot);
    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();

    tokio::spawn(server.clone().run(listener, config_updates, shutdown.subscribe()));

    TestBalancer {
        addr,
        server,
        shutdown,
        updates,
    }
}

/// Connect through the balancer and read until it closes the connection.
///
/// A reset counts as an empty response.
pub async fn fetch(addr: SocketAddr) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut buf = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
        .await
        .expect("balancer did not close the connection");
    match read {
        Ok(_) => buf,
        Err(_) => Vec::new(),
    }
}

/// Poll `condition` every 20ms for up to 5s.
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..250 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
