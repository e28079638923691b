//! Shutdown coordination for the balancer.
//!
//! Shutdown runs in two phases:
//! 1. `trigger()`: drain. The accept loop and the health monitor stop;
//!    sessions in flight keep relaying.
//! 2. `terminate()`: every remaining session is cancelled.
//!
//! The drain token is a child of the terminate token, so terminating also
//! drains.

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Coordinator for graceful shutdown.
#[derive(Debug)]
pub struct Shutdown {
    terminate: CancellationToken,
    drain: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        let terminate = CancellationToken::new();
        let drain = terminate.child_token();
        Self { terminate, drain }
    }

    /// Handle for long-running tasks.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            drain: self.drain.clone(),
            terminate: self.terminate.clone(),
        }
    }

    /// Stop accepting and probing; let sessions finish.
    pub fn trigger(&self) {
        self.drain.cancel();
    }

    /// Cancel every session still running.
    pub fn terminate(&self) {
        self.terminate.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.drain.is_cancelled()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    drain: CancellationToken,
    terminate: CancellationToken,
}

impl ShutdownSignal {
    /// Resolves once draining has started.
    pub fn draining(&self) -> WaitForCancellationFuture<'_> {
        self.drain.cancelled()
    }

    /// Token for background loops that stop with the drain phase.
    pub fn drain_token(&self) -> CancellationToken {
        self.drain.child_token()
    }

    /// Token for one session; cancelled only on terminate.
    pub fn session_token(&self) -> CancellationToken {
        self.terminate.child_token()
    }
}
