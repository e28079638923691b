//! Backend registry.
//!
//! # Responsibilities
//! - Own the authoritative, ordered set of configured backends
//! - Answer "which backends are routable right now" once per connection
//! - Apply health transitions through an idempotent guard
//! - Absorb configuration reloads (add / remove / refresh)
//!
//! # Design Decisions
//! - Entries live in a `DashMap`, the config order in an `ArcSwap<Vec<_>>`;
//!   readers never wait on a reload
//! - Operations on endpoints removed by a concurrent reload are no-ops
//! - Only actual transitions are logged and recorded as metrics

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;

use crate::load_balancer::backend::{BackendEndpoint, BackendInfo, HealthState};
use crate::observability::metrics;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("backend {0} is not registered")]
    NotFound(BackendEndpoint),
}

/// What a reload changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReloadSummary {
    pub added: Vec<BackendEndpoint>,
    pub removed: Vec<BackendEndpoint>,
    pub retained: Vec<BackendEndpoint>,
}

/// Shared registry of backends, their health and connection counts.
#[derive(Debug)]
pub struct BackendRegistry {
    entries: DashMap<BackendEndpoint, Arc<BackendInfo>>,
    order: ArcSwap<Vec<BackendEndpoint>>,
}

impl BackendRegistry {
    /// Build the registry from the initial configuration.
    pub fn new(endpoints: &[BackendEndpoint]) -> Self {
        let registry = Self {
            entries: DashMap::new(),
            order: ArcSwap::from_pointee(Vec::new()),
        };
        registry.reload(endpoints, "initial load");
        registry
    }

    /// All configured endpoints in config order.
    pub fn all_endpoints(&self) -> Arc<Vec<BackendEndpoint>> {
        self.order.load_full()
    }

    /// Configured endpoints whose health is Up or Unknown, in config order.
    pub fn healthy_endpoints(&self) -> Vec<BackendEndpoint> {
        let order = self.order.load();
        let mut healthy = Vec::with_capacity(order.len());
        for endpoint in order.iter() {
            if let Some(info) = self.entries.get(endpoint) {
                if info.health().is_routable() {
                    healthy.push(*endpoint);
                }
            }
        }
        healthy
    }

    pub fn get_info(&self, endpoint: &BackendEndpoint) -> Result<Arc<BackendInfo>, RegistryError> {
        self.entries
            .get(endpoint)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(RegistryError::NotFound(*endpoint))
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Active connection count, or zero if the endpoint is unknown.
    pub fn active_connections(&self, endpoint: &BackendEndpoint) -> usize {
        self.entries
            .get(endpoint)
            .map(|info| info.active_connections())
            .unwrap_or(0)
    }

    pub fn increment_connection(&self, endpoint: &BackendEndpoint) {
        if let Some(info) = self.entries.get(endpoint) {
            let active = info.inc_connections();
            metrics::record_backend_connections(endpoint, active);
        }
    }

    pub fn decrement_connection(&self, endpoint: &BackendEndpoint) {
        if let Some(info) = self.entries.get(endpoint) {
            let active = info.dec_connections();
            metrics::record_backend_connections(endpoint, active);
        }
    }

    /// Increment now and decrement when the returned guard is dropped.
    pub fn track_connection(self: &Arc<Self>, endpoint: BackendEndpoint) -> BackendConnectionGuard {
        self.increment_connection(&endpoint);
        BackendConnectionGuard {
            registry: Arc::clone(self),
            endpoint,
        }
    }

    /// Returns true when the backend actually transitioned.
    pub fn mark_up(&self, endpoint: &BackendEndpoint, reason: &str, at: DateTime<Utc>) -> bool {
        self.mark(endpoint, HealthState::Up, reason, at)
    }

    /// Returns true when the backend actually transitioned.
    pub fn mark_down(&self, endpoint: &BackendEndpoint, reason: &str, at: DateTime<Utc>) -> bool {
        self.mark(endpoint, HealthState::Down, reason, at)
    }

    fn mark(&self, endpoint: &BackendEndpoint, target: HealthState, reason: &str, at: DateTime<Utc>) -> bool {
        let Some(info) = self.entries.get(endpoint).map(|e| Arc::clone(e.value())) else {
            return false;
        };

        match info.transition(target, reason, at) {
            Some(previous) => {
                tracing::info!(
                    backend = %endpoint,
                    from = %previous,
                    to = %target,
                    reason = %reason,
                    at = %at.to_rfc3339(),
                    "Backend health changed"
                );
                metrics::record_backend_health(endpoint, target);
                true
            }
            None => false,
        }
    }

    /// Diff the registry against a new endpoint list.
    ///
    /// New endpoints start Unknown, missing ones are dropped with their
    /// counters, and retained ones keep health but get a fresh reason.
    pub fn reload(&self, endpoints: &[BackendEndpoint], reason: &str) -> ReloadSummary {
        let now = Utc::now();
        let configured: HashSet<BackendEndpoint> = endpoints.iter().copied().collect();
        let reason = format!("configured ({reason})");
        let mut summary = ReloadSummary::default();

        let mut ordered = Vec::with_capacity(configured.len());
        for endpoint in endpoints {
            if ordered.contains(endpoint) {
                continue;
            }
            ordered.push(*endpoint);

            match self.entries.get(endpoint) {
                Some(info) => {
                    info.refresh(&reason, now);
                    summary.retained.push(*endpoint);
                }
                None => {
                    self.entries
                        .insert(*endpoint, Arc::new(BackendInfo::new(*endpoint, reason.as_str(), now)));
                    tracing::info!(backend = %endpoint, "Backend added");
                    metrics::record_backend_added(endpoint);
                    summary.added.push(*endpoint);
                }
            }
        }

        self.order.store(Arc::new(ordered));

        let stale: Vec<BackendEndpoint> = self
            .entries
            .iter()
            .map(|entry| *entry.key())
            .filter(|endpoint| !configured.contains(endpoint))
            .collect();
        for endpoint in stale {
            if self.entries.remove(&endpoint).is_some() {
                tracing::info!(backend = %endpoint, "Backend removed");
                metrics::record_backend_removed(&endpoint);
                summary.removed.push(endpoint);
            }
        }

        summary
    }
}

/// A RAII guard that keeps a backend's active connection count raised.
#[derive(Debug)]
pub struct BackendConnectionGuard {
    registry: Arc<BackendRegistry>,
    endpoint: BackendEndpoint,
}

impl Drop for BackendConnectionGuard {
    fn drop(&mut self) {
        self.registry.decrement_connection(&self.endpoint);
    }
}
