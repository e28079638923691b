//! Client-affinity strategies keyed on the source IP.
//!
//! - `SourceIpHash`: hash(client ip) modulo healthy count. Cheap, but any
//!   change in the healthy set reshuffles most clients.
//! - `ConsistentHash`: rendezvous (highest random weight) hashing. Losing
//!   one backend only remaps the clients that were pinned to it.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::load_balancer::{BackendEndpoint, ConnectionContext, LoadBalancer};

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Default)]
pub struct SourceIpHash;

impl SourceIpHash {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for SourceIpHash {
    fn choose(&self, healthy: &[BackendEndpoint], ctx: &ConnectionContext) -> Option<BackendEndpoint> {
        if healthy.is_empty() {
            return None;
        }
        let index = (hash_of(&ctx.client_ip) % healthy.len() as u64) as usize;
        Some(healthy[index])
    }
}

#[derive(Debug, Default)]
pub struct ConsistentHash;

impl ConsistentHash {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for ConsistentHash {
    fn choose(&self, healthy: &[BackendEndpoint], ctx: &ConnectionContext) -> Option<BackendEndpoint> {
        healthy
            .iter()
            .max_by_key(|endpoint| hash_of(&(ctx.client_ip, endpoint.addr())))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(port: u16) -> BackendEndpoint {
        BackendEndpoint::new(format!("127.0.0.1:{port}").parse().unwrap())
    }

    fn client(ip: &str, port: u16) -> ConnectionContext {
        ConnectionContext {
            client_ip: ip.parse().unwrap(),
            client_port: port,
        }
    }

    #[test]
    fn source_hash_is_sticky_per_ip() {
        let lb = SourceIpHash::new();
        let backends = vec![ep(1), ep(2), ep(3)];
        let first = lb.choose(&backends, &client("192.168.1.10", 40000));
        // A different source port from the same host lands on the same backend.
        assert_eq!(lb.choose(&backends, &client("192.168.1.10", 40001)), first);
        assert_eq!(lb.choose(&[], &client("192.168.1.10", 40000)), None);
    }

    #[test]
    fn consistent_hash_only_remaps_lost_backend() {
        let lb = ConsistentHash::new();
        let all = vec![ep(1), ep(2), ep(3), ep(4)];
        let without_two: Vec<_> = all.iter().copied().filter(|e| *e != ep(2)).collect();

        for i in 0..200u32 {
            let ctx = client(&format!("10.0.{}.{}", i / 250, i % 250), 1234);
            let before = lb.choose(&all, &ctx).unwrap();
            let after = lb.choose(&without_two, &ctx).unwrap();
            if before != ep(2) {
                assert_eq!(before, after);
            }
        }
    }
}
