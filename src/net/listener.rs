//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address with backlog and `SO_REUSEADDR`
//! - Accept incoming TCP connections until shutdown
//! - Enforce max_connections limit via semaphore
//! - Back off on accept errors instead of spinning
//! - Hand each connection to the dispatcher on its own task

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::Semaphore;
use tracing::Instrument;

use crate::config::ConfigSnapshot;
use crate::lifecycle::ShutdownSignal;
use crate::net::connection::ConnectionTracker;
use crate::observability::{metrics, tracing::connection_span};
use crate::proxy::{ConnectionDispatcher, DispatchOutcome};
use crate::resilience::backoff::calculate_backoff;

const ACCEPT_BACKOFF_BASE_MS: u64 = 100;
const ACCEPT_BACKOFF_MAX_MS: u64 = 2_000;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept: {0}")]
    Accept(#[source] std::io::Error),
}

/// A bounded TCP listener that limits concurrent connections.
///
/// When `max_connections` permits are held the loop stops accepting and
/// leaves new clients in the kernel backlog.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    /// Bind the snapshot's listen address.
    ///
    /// With `dual_stack`, an IPv4 wildcard is first tried as `[::]`; if the
    /// host has no IPv6 the literal address is bound instead.
    pub async fn bind(snapshot: &ConfigSnapshot) -> Result<Self, ListenerError> {
        let addr = snapshot.listen_addr;
        let inner = if snapshot.dual_stack && addr.ip() == IpAddr::V4(Ipv4Addr::UNSPECIFIED) {
            let v6 = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), addr.port());
            match bind_socket(v6, snapshot.backlog) {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::debug!(error = %e, "IPv6 wildcard unavailable, binding IPv4");
                    bind_socket(addr, snapshot.backlog)?
                }
            }
        } else {
            bind_socket(addr, snapshot.backlog)?
        };

        Ok(Self::from_listener(inner, snapshot.max_connections))
    }

    pub fn from_listener(inner: TcpListener, max_connections: usize) -> Self {
        Self {
            inner,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Accept loop. Returns once draining starts.
    ///
    /// Dispatch tasks already spawned are not cancelled here; they end on
    /// their own or when the shutdown signal terminates sessions.
    pub async fn serve(
        self,
        dispatcher: Arc<ConnectionDispatcher>,
        tracker: ConnectionTracker,
        shutdown: ShutdownSignal,
    ) {
        let local = self.local_addr().ok();
        tracing::info!(
            address = ?local,
            max_connections = self.max_connections,
            "Listener started"
        );
        metrics::record_listener_up(true);

        let mut consecutive_errors = 0u32;
        loop {
            let permit = tokio::select! {
                biased;
                _ = shutdown.draining() => break,
                permit = Arc::clone(&self.connection_limit).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let (stream, peer) = tokio::select! {
                biased;
                _ = shutdown.draining() => break,
                res = self.inner.accept() => match res {
                    Ok(conn) => {
                        consecutive_errors = 0;
                        conn
                    }
                    Err(e) => {
                        consecutive_errors = consecutive_errors.saturating_add(1);
                        let delay = calculate_backoff(consecutive_errors, ACCEPT_BACKOFF_BASE_MS, ACCEPT_BACKOFF_MAX_MS);
                        tracing::warn!(
                            error = %ListenerError::Accept(e),
                            attempt = consecutive_errors,
                            delay = ?delay,
                            "Accept failed, backing off"
                        );
                        tokio::select! {
                            _ = shutdown.draining() => break,
                            _ = tokio::time::sleep(delay) => continue,
                        }
                    }
                },
            };

            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
            }
            metrics::record_connection_accepted();

            let guard = tracker.track();
            let span = connection_span(guard.id(), peer);
            tracing::debug!(
                parent: &span,
                available_permits = self.connection_limit.available_permits(),
                "Connection accepted"
            );

            let dispatcher = Arc::clone(&dispatcher);
            let cancel = shutdown.session_token();
            tokio::spawn(
                async move {
                    match dispatcher.dispatch(stream, peer, cancel).await {
                        DispatchOutcome::Failed => tracing::warn!("Dispatch failed"),
                        outcome => tracing::debug!(?outcome, "Dispatch finished"),
                    }
                    drop(guard);
                    drop(permit);
                }
                .instrument(span),
            );
        }

        metrics::record_listener_up(false);
        tracing::info!(address = ?local, "Listener stopped");
    }
}

fn bind_socket(addr: SocketAddr, backlog: u32) -> Result<TcpListener, ListenerError> {
    let bind_err = |source| ListenerError::Bind { addr, source };
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_err)?;

    socket.set_reuseaddr(true).map_err(bind_err)?;
    socket.bind(addr).map_err(bind_err)?;
    socket.listen(backlog).map_err(bind_err)
}
