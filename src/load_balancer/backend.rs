//! Backend abstraction.
//!
//! # Responsibilities
//! - Identify a backend by value (`BackendEndpoint`)
//! - Track active connections (for Least Connections LB)
//! - Track health state (Unknown/Up/Down) with an idempotent transition guard
//! - Remember when and why the last transition happened

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};

/// Immutable backend identity. Equality and hashing are by address value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendEndpoint(SocketAddr);

impl BackendEndpoint {
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for BackendEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl std::fmt::Display for BackendEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Health State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Unknown = 0,
    Up = 1,
    Down = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Up,
            2 => HealthState::Down,
            _ => HealthState::Unknown,
        }
    }
}

impl HealthState {
    /// Up and Unknown backends receive traffic.
    pub fn is_routable(self) -> bool {
        self != HealthState::Down
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HealthState::Unknown => "UNKNOWN",
            HealthState::Up => "UP",
            HealthState::Down => "DOWN",
        };
        f.write_str(name)
    }
}

/// When and why a backend's health (or registration) last changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub at: DateTime<Utc>,
    pub reason: String,
}

/// A single registered backend.
#[derive(Debug)]
pub struct BackendInfo {
    endpoint: BackendEndpoint,
    /// Current health state (0=Unknown, 1=Up, 2=Down).
    state: AtomicU8,
    /// Number of currently active proxy sessions.
    active_connections: AtomicUsize,
    last_change: ArcSwap<ChangeRecord>,
}

impl BackendInfo {
    /// Create a new backend in the Unknown state.
    pub fn new(endpoint: BackendEndpoint, reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            endpoint,
            state: AtomicU8::new(HealthState::Unknown as u8),
            active_connections: AtomicUsize::new(0),
            last_change: ArcSwap::from_pointee(ChangeRecord {
                at,
                reason: reason.into(),
            }),
        }
    }

    pub fn endpoint(&self) -> BackendEndpoint {
        self.endpoint
    }

    pub fn health(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Acquire))
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn last_change(&self) -> Arc<ChangeRecord> {
        self.last_change.load_full()
    }

    pub fn last_reason(&self) -> String {
        self.last_change.load().reason.clone()
    }

    /// Increment active connection count.
    pub(crate) fn inc_connections(&self) -> usize {
        self.active_connections.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrement active connection count, clamped at zero.
    pub(crate) fn dec_connections(&self) -> usize {
        let prev = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        prev.saturating_sub(1)
    }

    /// Move to `target` unless already there.
    ///
    /// Returns the previous state when a transition actually happened; the
    /// change record is only touched in that case.
    pub(crate) fn transition(
        &self,
        target: HealthState,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Option<HealthState> {
        let prev = self.state.swap(target as u8, Ordering::AcqRel);
        if prev == target as u8 {
            return None;
        }
        self.last_change.store(Arc::new(ChangeRecord {
            at,
            reason: reason.to_string(),
        }));
        Some(HealthState::from(prev))
    }

    /// Refresh the change record without altering health (config reload).
    pub(crate) fn refresh(&self, reason: &str, at: DateTime<Utc>) {
        self.last_change.store(Arc::new(ChangeRecord {
            at,
            reason: reason.to_string(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> BackendInfo {
        BackendInfo::new(
            BackendEndpoint::new("127.0.0.1:8080".parse().unwrap()),
            "configured",
            Utc::now(),
        )
    }

    #[test]
    fn starts_unknown_and_routable() {
        let b = info();
        assert_eq!(b.health(), HealthState::Unknown);
        assert!(b.health().is_routable());
        assert_eq!(b.active_connections(), 0);
    }

    #[test]
    fn decrement_is_clamped() {
        let b = info();
        assert_eq!(b.dec_connections(), 0);
        assert_eq!(b.inc_connections(), 1);
        assert_eq!(b.dec_connections(), 0);
        assert_eq!(b.dec_connections(), 0);
        assert_eq!(b.active_connections(), 0);
    }

    #[test]
    fn same_state_transition_is_noop() {
        let b = info();
        let first = Utc::now();
        assert_eq!(b.transition(HealthState::Down, "probe failed", first), Some(HealthState::Unknown));

        let later = first + chrono::Duration::seconds(5);
        assert_eq!(b.transition(HealthState::Down, "probe failed again", later), None);

        let change = b.last_change();
        assert_eq!(change.at, first);
        assert_eq!(change.reason, "probe failed");
    }

    #[test]
    fn endpoints_compare_by_value() {
        let a = BackendEndpoint::new("10.0.0.1:80".parse().unwrap());
        let b: BackendEndpoint = "10.0.0.1:80".parse::<SocketAddr>().unwrap().into();
        assert_eq!(a, b);
    }
}
