//! Active health checking through a running balancer.

use std::sync::Arc;
use std::time::Duration;

use tcp_balancer::load_balancer::{BackendEndpoint, HealthState};

mod common;

fn probing(backends: &[std::net::SocketAddr]) -> tcp_balancer::ConfigSnapshot {
    let mut snapshot = common::snapshot(backends);
    snapshot.health.enabled = true;
    snapshot.health.interval = Duration::from_millis(50);
    snapshot.health.probe_timeout = Duration::from_millis(200);
    snapshot.health.fails_to_down = 2;
    snapshot.health.passes_to_up = 1;
    snapshot
}

#[tokio::test]
async fn dead_backend_is_evicted_from_rotation() {
    let live = common::start_mock_backend("ok").await;
    let dead = common::dead_address().await;
    let lb = common::start_balancer(probing(&[live, dead])).await;

    let registry = Arc::clone(lb.server.registry());
    let dead_ep = BackendEndpoint::new(dead);
    assert!(common::eventually(|| registry.get_info(&dead_ep).unwrap().health() == HealthState::Down).await);

    let info = registry.get_info(&dead_ep).unwrap();
    assert_eq!(info.last_reason(), "Health probe failed (2x)");
    assert_eq!(registry.healthy_endpoints(), vec![BackendEndpoint::new(live)]);

    for _ in 0..6 {
        assert_eq!(common::fetch(lb.addr).await, b"ok");
    }
}

#[tokio::test]
async fn recovered_backend_rejoins_rotation() {
    let live = common::start_mock_backend("A").await;
    let lb = common::start_balancer(probing(&[live])).await;
    let registry = Arc::clone(lb.server.registry());
    let ep = BackendEndpoint::new(live);

    assert!(common::eventually(|| registry.get_info(&ep).unwrap().health() == HealthState::Up).await);

    assert!(registry.mark_down(&ep, "operator", chrono::Utc::now()));

    // The next successful probe brings it back.
    assert!(common::eventually(|| registry.get_info(&ep).unwrap().health() == HealthState::Up).await);
    assert_eq!(common::fetch(lb.addr).await, b"A");
}
