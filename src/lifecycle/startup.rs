//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize metrics, bind the listener, start the config watcher
//! - Run the balancer until a shutdown signal arrives
//! - Drain in-flight sessions (bounded) before returning
//!
//! # Design Decisions
//! - Fail fast: a bind error is fatal
//! - A watcher error only disables file-based hot reload; SIGHUP still works
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::config::watcher::ConfigWatcher;
use crate::config::ConfigSnapshot;
use crate::lifecycle::{signals, Shutdown};
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;
use crate::server::BalancerServer;

/// How long in-flight sessions may keep running after a shutdown signal.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn run(snapshot: ConfigSnapshot, config_path: &Path) -> Result<(), ListenerError> {
    if snapshot.observability.metrics_enabled {
        match snapshot.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::warn!(
                address = %snapshot.observability.metrics_address,
                error = %e,
                "Invalid metrics address, metrics disabled"
            ),
        }
    }

    let listener = Listener::bind(&snapshot).await?;

    let (watcher, config_updates) = ConfigWatcher::new(config_path);
    let reloader = watcher.clone();
    let _file_watch = match watcher.run() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Config file watching unavailable, reload with SIGHUP");
            None
        }
    };
    let hangup_task = tokio::spawn(signals::on_hangup(move || reloader.reload_now()));

    let server = BalancerServer::new(&snapshot);
    let sessions = server.sessions();
    let shutdown = Shutdown::new();
    let server_task = tokio::spawn(server.run(listener, config_updates, shutdown.subscribe()));

    signals::shutdown_signal().await;
    shutdown.trigger();

    if let Err(e) = server_task.await {
        tracing::error!(error = %e, "Server task failed");
    }
    hangup_task.abort();

    tracing::info!(
        in_flight = sessions.active_count(),
        timeout = ?DRAIN_TIMEOUT,
        "Waiting for in-flight sessions to drain"
    );
    if !sessions.wait_idle(DRAIN_TIMEOUT).await {
        tracing::warn!(remaining = sessions.active_count(), "Drain timeout elapsed, closing remaining sessions");
    }
    shutdown.terminate();

    tracing::info!("Shutdown complete");
    Ok(())
}
