//! Active health checking.
//!
//! # Responsibilities
//! - Periodically TCP-probe every registered backend, in config order
//! - Keep per-backend consecutive pass/fail counters
//! - Flip registry health once a threshold is crossed

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::Utc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::HealthSettings;
use crate::health::state::{evaluate, ProbeCounters, Verdict};
use crate::load_balancer::{BackendEndpoint, BackendRegistry};
use crate::resilience::backoff::random_jitter;
use crate::resilience::timeouts::{connect_with_timeout, ConnectError};

pub struct HealthMonitor {
    registry: Arc<BackendRegistry>,
    settings: Arc<ArcSwap<HealthSettings>>,
    counters: HashMap<BackendEndpoint, ProbeCounters>,
}

impl HealthMonitor {
    /// `settings` is shared with the config reload path and re-read every sweep.
    pub fn new(registry: Arc<BackendRegistry>, settings: Arc<ArcSwap<HealthSettings>>) -> Self {
        Self {
            registry,
            settings,
            counters: HashMap::new(),
        }
    }

    pub fn counters(&self, endpoint: &BackendEndpoint) -> ProbeCounters {
        self.counters.get(endpoint).copied().unwrap_or_default()
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let initial = self.settings.load_full();
        tracing::info!(
            enabled = initial.enabled,
            interval = ?initial.interval,
            timeout = ?initial.probe_timeout,
            fails_to_down = initial.fails_to_down,
            passes_to_up = initial.passes_to_up,
            "Health monitor starting"
        );

        let mut period = initial.interval;
        let mut ticker = new_ticker(period);
        let mut was_enabled = initial.enabled;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.cancelled() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }

            let settings = self.settings.load_full();
            if settings.enabled != was_enabled {
                tracing::info!(enabled = settings.enabled, "Active health checks toggled");
                was_enabled = settings.enabled;
            }
            if settings.enabled {
                self.sweep(&settings, &cancel).await;
            }

            if settings.interval != period {
                period = settings.interval;
                ticker = new_ticker(period);
                ticker.tick().await;
            }
        }
    }

    /// Probe every registered backend once.
    pub async fn sweep(&mut self, settings: &HealthSettings, cancel: &CancellationToken) {
        let endpoints = self.registry.all_endpoints();
        self.counters.retain(|endpoint, _| endpoints.contains(endpoint));

        for endpoint in endpoints.iter() {
            let jitter = random_jitter(settings.jitter);
            if !jitter.is_zero() {
                tokio::select! {
                    _ = time::sleep(jitter) => {}
                    _ = cancel.cancelled() => return,
                }
            }

            let success = match connect_with_timeout(endpoint.addr(), settings.probe_timeout, cancel).await {
                Ok(_stream) => true,
                Err(ConnectError::Cancelled { .. }) => return,
                Err(e) => {
                    tracing::debug!(backend = %endpoint, error = %e, "Health probe failed");
                    false
                }
            };

            self.apply(endpoint, success, settings);
        }
    }

    fn apply(&mut self, endpoint: &BackendEndpoint, success: bool, settings: &HealthSettings) {
        let counters = self.counters.entry(*endpoint).or_default();
        counters.record(success);
        let counters = *counters;

        // Removed by a concurrent reload; the next sweep prunes the counters.
        let Ok(info) = self.registry.get_info(endpoint) else {
            return;
        };

        let now = Utc::now();
        match evaluate(info.health(), &counters, settings) {
            Some(Verdict::MarkUp) => {
                let reason = format!("Health probe succeeded ({}x)", counters.successes);
                self.registry.mark_up(endpoint, &reason, now);
            }
            Some(Verdict::MarkDown) => {
                let reason = format!("Health probe failed ({}x)", counters.failures);
                self.registry.mark_down(endpoint, &reason, now);
            }
            None => {}
        }
    }
}

fn new_ticker(period: Duration) -> time::Interval {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    use crate::load_balancer::HealthState;

    fn settings(fails: u32, passes: u32) -> HealthSettings {
        HealthSettings {
            enabled: true,
            interval: Duration::from_millis(50),
            probe_timeout: Duration::from_millis(200),
            jitter: Duration::ZERO,
            fails_to_down: fails,
            passes_to_up: passes,
        }
    }

    async fn closed_endpoint() -> BackendEndpoint {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        BackendEndpoint::new(listener.local_addr().unwrap())
    }

    fn monitor(registry: &Arc<BackendRegistry>, settings: HealthSettings) -> HealthMonitor {
        HealthMonitor::new(Arc::clone(registry), Arc::new(ArcSwap::from_pointee(settings)))
    }

    #[tokio::test]
    async fn marks_down_only_at_threshold() {
        let dead = closed_endpoint().await;
        let registry = Arc::new(BackendRegistry::new(&[dead]));
        let s = settings(3, 2);
        let mut monitor = monitor(&registry, s.clone());
        let cancel = CancellationToken::new();

        monitor.sweep(&s, &cancel).await;
        monitor.sweep(&s, &cancel).await;
        assert_eq!(registry.get_info(&dead).unwrap().health(), HealthState::Unknown);
        assert_eq!(monitor.counters(&dead).failures, 2);

        monitor.sweep(&s, &cancel).await;
        let info = registry.get_info(&dead).unwrap();
        assert_eq!(info.health(), HealthState::Down);
        assert_eq!(info.last_reason(), "Health probe failed (3x)");
    }

    #[tokio::test]
    async fn live_backend_goes_up() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let live = BackendEndpoint::new(listener.local_addr().unwrap());
        let registry = Arc::new(BackendRegistry::new(&[live]));
        let s = settings(3, 2);
        let mut monitor = monitor(&registry, s.clone());
        let cancel = CancellationToken::new();

        monitor.sweep(&s, &cancel).await;
        assert_eq!(registry.get_info(&live).unwrap().health(), HealthState::Unknown);
        monitor.sweep(&s, &cancel).await;
        assert_eq!(registry.get_info(&live).unwrap().health(), HealthState::Up);
    }

    #[tokio::test]
    async fn prunes_counters_of_removed_backends() {
        let dead = closed_endpoint().await;
        let other = closed_endpoint().await;
        let registry = Arc::new(BackendRegistry::new(&[dead, other]));
        let s = settings(3, 2);
        let mut monitor = monitor(&registry, s.clone());
        let cancel = CancellationToken::new();

        monitor.sweep(&s, &cancel).await;
        assert_eq!(monitor.counters(&dead).failures, 1);

        registry.reload(&[other], "reload");
        monitor.sweep(&s, &cancel).await;
        assert_eq!(monitor.counters(&dead), ProbeCounters::default());
        assert_eq!(monitor.counters(&other).failures, 2);
    }

    #[tokio::test]
    async fn background_loop_tracks_backend_outage_and_recovery() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let backend = BackendEndpoint::new(addr);
        let registry = Arc::new(BackendRegistry::new(&[backend]));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(monitor(&registry, settings(2, 2)).run(cancel.clone()));

        let wait_for = |target: HealthState| {
            let registry = Arc::clone(&registry);
            async move {
                for _ in 0..100 {
                    if registry.get_info(&backend).unwrap().health() == target {
                        return true;
                    }
                    time::sleep(Duration::from_millis(20)).await;
                }
                false
            }
        };

        assert!(wait_for(HealthState::Up).await);

        drop(listener);
        assert!(wait_for(HealthState::Down).await);

        let _listener = TcpListener::bind(addr).await.unwrap();
        assert!(wait_for(HealthState::Up).await);

        cancel.cancel();
        handle.await.unwrap();
    }
}
