//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Connection accepted → ConnectionContext (client ip/port)
//!     → registry.rs (healthy endpoints, config order)
//!     → Apply load balancing policy:
//!         - round_robin.rs (rotate through backends)
//!         - random.rs (uniform pick)
//!         - least_conn.rs (pick backend with fewest sessions)
//!         - hash.rs (source-ip hash, consistent hash)
//!     → Chosen BackendEndpoint or None
//! ```
//!
//! # Design Decisions
//! - Policies only see the healthy snapshot; the registry owns health
//! - Policy state (if any) is atomic, no locks on the hot path
//! - Policy selection per process, from configuration

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::config::PolicyKind;

pub mod backend;
pub mod hash;
pub mod least_conn;
pub mod random;
pub mod registry;
pub mod round_robin;

pub use backend::{BackendEndpoint, BackendInfo, HealthState};
pub use registry::{BackendConnectionGuard, BackendRegistry, RegistryError};

/// Identity of the client behind an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionContext {
    pub client_ip: IpAddr,
    pub client_port: u16,
}

impl From<SocketAddr> for ConnectionContext {
    fn from(addr: SocketAddr) -> Self {
        Self {
            client_ip: addr.ip(),
            client_port: addr.port(),
        }
    }
}

/// Backend selection policy.
///
/// `choose` returns `None` only when `healthy` is empty and must be safe to
/// call from many tasks at once.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    fn choose(&self, healthy: &[BackendEndpoint], ctx: &ConnectionContext) -> Option<BackendEndpoint>;
}

/// Build the configured policy.
pub fn build_policy(kind: PolicyKind, registry: Arc<BackendRegistry>) -> Arc<dyn LoadBalancer> {
    match kind {
        PolicyKind::RoundRobin => Arc::new(round_robin::RoundRobin::new()),
        PolicyKind::Random => Arc::new(random::Random::new()),
        PolicyKind::LeastConnections => Arc::new(least_conn::LeastConnections::new(registry)),
        PolicyKind::SourceIpHash => Arc::new(hash::SourceIpHash::new()),
        PolicyKind::ConsistentHash => Arc::new(hash::ConsistentHash::new()),
    }
}
