//! Proxy session: one client ↔ backend relay.
//!
//! # Lifecycle
//! ```text
//! connect (bounded) ──fail──▶ ConnectFailed (registry untouched)
//!     │ ok
//!     ▼
//! active_connections += 1 (guard)
//!     ▼
//! client→backend pump ┐
//! backend→client pump ┼─ shared idle clock, session token
//! idle watcher        ┘
//!     ▼ first pump done: its destination is half-closed
//! drain: remaining pump vs quiet drain window, bounded by the idle timeout
//!     ▼
//! guard dropped: active_connections -= 1
//! ```

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ConfigSnapshot;
use crate::load_balancer::{BackendEndpoint, BackendRegistry};
use crate::observability::metrics;
use crate::proxy::idle::IdleTimer;
use crate::proxy::observed::{ObservedStream, Transfer};
use crate::proxy::pump::{pipe, PumpOutcome};
use crate::resilience::timeouts::connect_with_timeout;

/// Timeouts applied to new sessions. Swapped on config reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    pub connect: Duration,
    pub idle: Duration,
    pub drain: Duration,
}

impl From<&ConfigSnapshot> for SessionTimeouts {
    fn from(snapshot: &ConfigSnapshot) -> Self {
        Self {
            connect: snapshot.connect_timeout,
            idle: snapshot.idle_timeout,
            drain: snapshot.drain_window,
        }
    }
}

/// Bytes moved in each direction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub to_backend: u64,
    pub from_backend: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Backend connect failed or timed out; nothing was relayed.
    ConnectFailed,
    /// Both directions ended (EOF, error, or drain window).
    Completed(SessionStats),
    /// No traffic for the idle timeout.
    IdleTimeout(SessionStats),
    /// Process shutdown cancelled the session.
    Cancelled(SessionStats),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ClientToBackend,
    BackendToClient,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::ClientToBackend => "client_to_backend",
            Direction::BackendToClient => "backend_to_client",
        }
    }
}

/// Result of one pump task: bytes moved and whether it was cut short.
#[derive(Debug, Clone, Copy)]
struct PumpReport {
    bytes: u64,
    cancelled: bool,
}

pub struct ProxySession {
    registry: Arc<BackendRegistry>,
    timeouts: ArcSwap<SessionTimeouts>,
}

impl ProxySession {
    pub fn new(registry: Arc<BackendRegistry>, timeouts: SessionTimeouts) -> Self {
        Self {
            registry,
            timeouts: ArcSwap::from_pointee(timeouts),
        }
    }

    pub fn timeouts(&self) -> SessionTimeouts {
        **self.timeouts.load()
    }

    /// Applies to sessions started after the call.
    pub fn update_timeouts(&self, timeouts: SessionTimeouts) {
        self.timeouts.store(Arc::new(timeouts));
    }

    /// Relay `client` to `backend` until both directions end.
    pub async fn run(
        &self,
        client: TcpStream,
        backend: BackendEndpoint,
        cancel: CancellationToken,
    ) -> SessionOutcome {
        let timeouts = self.timeouts();

        let upstream = match connect_with_timeout(backend.addr(), timeouts.connect, &cancel).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(backend = %backend, error = %e, "Backend connect failed");
                metrics::record_connect_failure(&backend, e.kind());
                return SessionOutcome::ConnectFailed;
            }
        };
        tracing::debug!(backend = %backend, "Connected to backend");

        let _guard = self.registry.track_connection(backend);
        if let Err(e) = upstream.set_nodelay(true) {
            tracing::debug!(error = %e, "Failed to set TCP_NODELAY on backend socket");
        }

        let session_cancel = cancel.child_token();
        let idle = Arc::new(IdleTimer::new());

        let (client_read, client_write) = client.into_split();
        let (backend_read, backend_write) = upstream.into_split();

        let mut to_backend = spawn_pump(
            Direction::ClientToBackend,
            observe(client_read, &idle),
            observe(backend_write, &idle),
            session_cancel.clone(),
        );
        let mut to_client = spawn_pump(
            Direction::BackendToClient,
            observe(backend_read, &idle),
            observe(client_write, &idle),
            session_cancel.clone(),
        );

        let (first, remaining) = tokio::select! {
            report = &mut to_backend => ((Direction::ClientToBackend, join_report(report)), to_client),
            report = &mut to_client => ((Direction::BackendToClient, join_report(report)), to_backend),
            _ = idle.quiet_for(timeouts.idle) => {
                tracing::info!(backend = %backend, idle = ?timeouts.idle, "Idle timeout elapsed, closing session");
                metrics::record_idle_timeout();
                session_cancel.cancel();
                let stats = SessionStats {
                    to_backend: join_report(to_backend.await).bytes,
                    from_backend: join_report(to_client.await).bytes,
                };
                record_stats(&stats);
                return SessionOutcome::IdleTimeout(stats);
            }
        };
        tracing::debug!(direction = first.0.label(), bytes = first.1.bytes, "Direction finished first");

        // The drain window opens at the half-close and slides while the
        // lagging direction still moves bytes, never past the idle bound.
        idle.touch();
        let bound = timeouts.idle.max(timeouts.drain);
        let deadline = tokio::time::sleep(bound);
        let mut remaining = remaining;
        let second = tokio::select! {
            report = &mut remaining => join_report(report),
            _ = idle.quiet_for(timeouts.drain) => {
                tracing::debug!(backend = %backend, drain = ?timeouts.drain, "Drain window elapsed");
                session_cancel.cancel();
                join_report(remaining.await)
            }
            _ = deadline => {
                tracing::debug!(backend = %backend, bound = ?bound, "Drain bound reached");
                session_cancel.cancel();
                join_report(remaining.await)
            }
        };

        let stats = match first.0 {
            Direction::ClientToBackend => SessionStats {
                to_backend: first.1.bytes,
                from_backend: second.bytes,
            },
            Direction::BackendToClient => SessionStats {
                to_backend: second.bytes,
                from_backend: first.1.bytes,
            },
        };
        record_stats(&stats);

        if cancel.is_cancelled() && (first.1.cancelled || second.cancelled) {
            SessionOutcome::Cancelled(stats)
        } else {
            SessionOutcome::Completed(stats)
        }
    }
}

fn observe<S>(stream: S, idle: &Arc<IdleTimer>) -> ObservedStream<S, impl Fn(Transfer) + Send + Sync + Unpin + 'static> {
    let idle = Arc::clone(idle);
    ObservedStream::new(stream, move |transfer: Transfer| {
        idle.touch();
        tracing::trace!(?transfer, "Session traffic");
    })
}

/// Run one direction; on EOF or error, half-close the destination.
fn spawn_pump<R, W>(
    direction: Direction,
    mut source: R,
    mut destination: W,
    cancel: CancellationToken,
) -> JoinHandle<PumpReport>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let report = match pipe(&mut source, &mut destination, &cancel).await {
            Ok(PumpOutcome::Cancelled { bytes }) => {
                return PumpReport { bytes, cancelled: true };
            }
            Ok(PumpOutcome::Eof { bytes }) => PumpReport { bytes, cancelled: false },
            Err(e) => {
                tracing::debug!(direction = direction.label(), error = %e.source, bytes = e.bytes, "Pump ended with I/O error");
                PumpReport { bytes: e.bytes, cancelled: false }
            }
        };

        if let Err(e) = destination.shutdown().await {
            tracing::debug!(direction = direction.label(), error = %e, "Half-close failed");
        }
        report
    })
}

fn join_report(result: Result<PumpReport, tokio::task::JoinError>) -> PumpReport {
    result.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Pump task failed");
        PumpReport { bytes: 0, cancelled: false }
    })
}

fn record_stats(stats: &SessionStats) {
    metrics::record_bytes(Direction::ClientToBackend.label(), stats.to_backend);
    metrics::record_bytes(Direction::BackendToClient.label(), stats.from_backend);
    tracing::debug!(
        to_backend = stats.to_backend,
        from_backend = stats.from_backend,
        "Session closed"
    );
}
