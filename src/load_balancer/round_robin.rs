//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::{BackendEndpoint, ConnectionContext, LoadBalancer};

/// Round-robin selector.
///
/// One shared counter indexes into whatever healthy snapshot the caller
/// passes. When the healthy set changes size between calls the rotation
/// shifts; with a stable set every backend is visited once per cycle.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn choose(&self, healthy: &[BackendEndpoint], _ctx: &ConnectionContext) -> Option<BackendEndpoint> {
        if healthy.is_empty() {
            return None;
        }

        // fetch_add wraps on overflow, so the index never goes negative.
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % healthy.len();
        Some(healthy[index])
    }
}
