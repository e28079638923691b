//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound every outbound TCP connect (sessions and health probes)
//! - Cancel operations cleanly on timeout or shutdown
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("connect to {addr} timed out after {timeout:?}")]
    Timeout { addr: SocketAddr, timeout: Duration },

    #[error("connect to {addr} cancelled")]
    Cancelled { addr: SocketAddr },

    #[error("connect to {addr} failed: {source}")]
    Io {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

impl ConnectError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectError::Timeout { .. } => "timeout",
            ConnectError::Cancelled { .. } => "cancelled",
            ConnectError::Io { source, .. } if source.kind() == std::io::ErrorKind::ConnectionRefused => "refused",
            ConnectError::Io { .. } => "io",
        }
    }
}

/// Open a TCP connection bounded by `timeout` and by `cancel`.
pub async fn connect_with_timeout(
    addr: SocketAddr,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<TcpStream, ConnectError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(ConnectError::Cancelled { addr }),
        res = tokio::time::timeout(timeout, TcpStream::connect(addr)) => match res {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(ConnectError::Io { addr, source }),
            Err(_) => Err(ConnectError::Timeout { addr, timeout }),
        },
    }
}
