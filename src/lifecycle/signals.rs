//! OS signal handling.
//!
//! # Responsibilities
//! - Resolve on SIGTERM/SIGINT so the caller can start graceful shutdown
//! - Turn SIGHUP into configuration reload requests
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers config reload, not shutdown

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}

/// Invoke `on_reload` on every SIGHUP. Runs until the process exits.
#[cfg(unix)]
pub async fn on_hangup<F>(on_reload: F)
where
    F: Fn(),
{
    let mut hangup = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
        Ok(signal) => signal,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGHUP handler");
            return;
        }
    };

    while hangup.recv().await.is_some() {
        tracing::info!("Received SIGHUP, reloading configuration");
        on_reload();
    }
}

#[cfg(not(unix))]
pub async fn on_hangup<F>(_on_reload: F)
where
    F: Fn(),
{
    std::future::pending::<()>().await;
}
