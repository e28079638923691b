//! Balancer wiring.
//!
//! `BalancerServer` owns the shared pieces built from one configuration
//! snapshot (registry, policy, session settings, health settings) and runs
//! the accept loop, the health monitor and the config-update consumer until
//! shutdown drains.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::mpsc;

use crate::config::{ConfigSnapshot, HealthSettings, PolicyKind};
use crate::health::HealthMonitor;
use crate::lifecycle::ShutdownSignal;
use crate::load_balancer::{build_policy, BackendRegistry};
use crate::net::{ConnectionTracker, Listener};
use crate::proxy::{ConnectionDispatcher, ProxySession, SessionTimeouts};

#[derive(Clone)]
pub struct BalancerServer {
    registry: Arc<BackendRegistry>,
    session: Arc<ProxySession>,
    dispatcher: Arc<ConnectionDispatcher>,
    health: Arc<ArcSwap<HealthSettings>>,
    tracker: ConnectionTracker,
    policy: PolicyKind,
    listen_addr: std::net::SocketAddr,
}

impl BalancerServer {
    pub fn new(snapshot: &ConfigSnapshot) -> Self {
        let registry = Arc::new(BackendRegistry::new(&snapshot.backends));
        let policy = build_policy(snapshot.policy, Arc::clone(&registry));
        let session = Arc::new(ProxySession::new(Arc::clone(&registry), SessionTimeouts::from(snapshot)));
        let dispatcher = Arc::new(ConnectionDispatcher::new(
            Arc::clone(&registry),
            policy,
            Arc::clone(&session),
        ));

        tracing::info!(
            backends = snapshot.backends.len(),
            policy = %snapshot.policy,
            "Balancer initialized"
        );

        Self {
            registry,
            session,
            dispatcher,
            health: Arc::new(ArcSwap::from_pointee(snapshot.health.clone())),
            tracker: ConnectionTracker::new(),
            policy: snapshot.policy,
            listen_addr: snapshot.listen_addr,
        }
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// Client connections currently being dispatched or proxied.
    pub fn sessions(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Apply a reloaded snapshot to the running balancer.
    ///
    /// Backends, timeouts and health settings change in place. The listen
    /// address and policy are fixed for the life of the process.
    pub fn apply_config(&self, snapshot: &ConfigSnapshot) {
        let summary = self.registry.reload(&snapshot.backends, "reload");
        self.session.update_timeouts(SessionTimeouts::from(snapshot));
        self.health.store(Arc::new(snapshot.health.clone()));

        if snapshot.policy != self.policy {
            tracing::warn!(
                current = %self.policy,
                requested = %snapshot.policy,
                "Policy change requires a restart, keeping current policy"
            );
        }
        if snapshot.listen_addr != self.listen_addr {
            tracing::warn!(
                current = %self.listen_addr,
                requested = %snapshot.listen_addr,
                "Listen address change requires a restart"
            );
        }

        tracing::info!(
            added = summary.added.len(),
            removed = summary.removed.len(),
            retained = summary.retained.len(),
            "Configuration applied"
        );
    }

    /// Serve until `shutdown` starts draining.
    pub async fn run(
        self,
        listener: Listener,
        mut config_updates: mpsc::UnboundedReceiver<ConfigSnapshot>,
        shutdown: ShutdownSignal,
    ) {
        let monitor = HealthMonitor::new(Arc::clone(&self.registry), Arc::clone(&self.health));
        let health_task = tokio::spawn(monitor.run(shutdown.drain_token()));

        let updates_task = {
            let this = self.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.draining() => break,
                        update = config_updates.recv() => match update {
                            Some(snapshot) => this.apply_config(&snapshot),
                            None => break,
                        },
                    }
                }
            })
        };

        listener
            .serve(Arc::clone(&self.dispatcher), self.tracker.clone(), shutdown)
            .await;

        if let Err(e) = health_task.await {
            tracing::error!(error = %e, "Health monitor task failed");
        }
        updates_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::load_balancer::{BackendEndpoint, HealthState};

    fn ep(port: u16) -> BackendEndpoint {
        BackendEndpoint::new(format!("127.0.0.1:{port}").parse().unwrap())
    }

    #[test]
    fn apply_config_reloads_backends_and_settings() {
        let snapshot = ConfigSnapshot::new("127.0.0.1:8080".parse().unwrap(), vec![ep(9001), ep(9002)]);
        let server = BalancerServer::new(&snapshot);

        let mut next = snapshot.clone();
        next.backends = vec![ep(9002), ep(9003)];
        next.idle_timeout = Duration::from_secs(5);
        next.health.fails_to_down = 7;
        server.apply_config(&next);

        assert_eq!(*server.registry().all_endpoints(), vec![ep(9002), ep(9003)]);
        assert_eq!(
            server.registry().get_info(&ep(9003)).unwrap().health(),
            HealthState::Unknown
        );
        assert_eq!(server.session.timeouts().idle, Duration::from_secs(5));
        assert_eq!(server.health.load().fails_to_down, 7);
    }
}
