//! Uniform random load balancing strategy.

use crate::load_balancer::{BackendEndpoint, ConnectionContext, LoadBalancer};

#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for Random {
    fn choose(&self, healthy: &[BackendEndpoint], _ctx: &ConnectionContext) -> Option<BackendEndpoint> {
        if healthy.is_empty() {
            return None;
        }
        Some(healthy[fastrand::usize(..healthy.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_only_from_healthy_set() {
        let backends: Vec<BackendEndpoint> = (1..=3)
            .map(|p| BackendEndpoint::new(format!("127.0.0.1:{p}").parse().unwrap()))
            .collect();
        let ctx: ConnectionContext = "10.0.0.1:5000".parse::<std::net::SocketAddr>().unwrap().into();
        let lb = Random::new();

        for _ in 0..100 {
            assert!(backends.contains(&lb.choose(&backends, &ctx).unwrap()));
        }
        assert_eq!(lb.choose(&[], &ctx), None);
    }
}
