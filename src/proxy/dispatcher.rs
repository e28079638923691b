//! Connection dispatcher.
//!
//! Takes one accepted client, asks the policy for a backend from the
//! current healthy set and hands both to a proxy session. A client that
//! finds no routable backend is closed immediately.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::load_balancer::{BackendRegistry, ConnectionContext, LoadBalancer};
use crate::observability::metrics;
use crate::proxy::session::{ProxySession, SessionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No healthy backend; the client was closed without being proxied.
    Rejected,
    Proxied(SessionOutcome),
    /// The session task panicked.
    Failed,
}

pub struct ConnectionDispatcher {
    registry: Arc<BackendRegistry>,
    policy: Arc<dyn LoadBalancer>,
    session: Arc<ProxySession>,
}

impl ConnectionDispatcher {
    pub fn new(
        registry: Arc<BackendRegistry>,
        policy: Arc<dyn LoadBalancer>,
        session: Arc<ProxySession>,
    ) -> Self {
        Self {
            registry,
            policy,
            session,
        }
    }

    pub async fn dispatch(
        &self,
        mut client: TcpStream,
        peer: SocketAddr,
        cancel: CancellationToken,
    ) -> DispatchOutcome {
        let healthy = self.registry.healthy_endpoints();
        let ctx = ConnectionContext::from(peer);

        let Some(backend) = self.policy.choose(&healthy, &ctx) else {
            tracing::warn!(
                peer = %peer,
                configured = self.registry.len(),
                "No healthy backend available, rejecting connection"
            );
            metrics::record_dispatch_rejected();
            let _ = client.shutdown().await;
            return DispatchOutcome::Rejected;
        };
        tracing::debug!(peer = %peer, backend = %backend, "Backend selected");

        let session = Arc::clone(&self.session);
        let handle = tokio::spawn(async move { session.run(client, backend, cancel).await });

        match handle.await {
            Ok(outcome) => DispatchOutcome::Proxied(outcome),
            Err(e) => {
                tracing::error!(peer = %peer, backend = %backend, error = %e, "Session task failed");
                DispatchOutcome::Failed
            }
        }
    }
}
