//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{BackendEndpoint, BackendRegistry, ConnectionContext, LoadBalancer};

/// Least connections selector.
/// Selects the backend with the minimum number of active sessions.
#[derive(Debug)]
pub struct LeastConnections {
    registry: Arc<BackendRegistry>,
}

impl LeastConnections {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self { registry }
    }
}

impl LoadBalancer for LeastConnections {
    fn choose(&self, healthy: &[BackendEndpoint], _ctx: &ConnectionContext) -> Option<BackendEndpoint> {
        // In case of tie, the first one in config order is selected (stability)
        healthy
            .iter()
            .min_by_key(|endpoint| self.registry.active_connections(endpoint))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(port: u16) -> BackendEndpoint {
        BackendEndpoint::new(format!("127.0.0.1:{port}").parse().unwrap())
    }

    #[test]
    fn test_least_conn() {
        let registry = Arc::new(BackendRegistry::new(&[ep(8080), ep(8081)]));
        let lb = LeastConnections::new(Arc::clone(&registry));
        let ctx: ConnectionContext = "10.0.0.1:5000".parse::<std::net::SocketAddr>().unwrap().into();
        let healthy = registry.healthy_endpoints();

        // artificially increase connections on the first backend
        let _g1 = registry.track_connection(ep(8080));
        assert_eq!(lb.choose(&healthy, &ctx), Some(ep(8081)));

        let _g2 = registry.track_connection(ep(8081));
        let _g3 = registry.track_connection(ep(8081));
        assert_eq!(lb.choose(&healthy, &ctx), Some(ep(8080)));
    }

    #[test]
    fn ties_go_to_config_order() {
        let registry = Arc::new(BackendRegistry::new(&[ep(2), ep(1)]));
        let lb = LeastConnections::new(Arc::clone(&registry));
        let ctx: ConnectionContext = "10.0.0.1:5000".parse::<std::net::SocketAddr>().unwrap().into();
        assert_eq!(lb.choose(&registry.healthy_endpoints(), &ctx), Some(ep(2)));
        assert_eq!(lb.choose(&[], &ctx), None);
    }
}
