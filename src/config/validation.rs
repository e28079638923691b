//! Configuration validation.
//!
//! # Responsibilities
//! - Resolve listen and backend endpoints (IP literals first, then DNS)
//! - Validate value ranges (timeouts > 0, limits > 0, thresholds > 0)
//! - Reject duplicate backends and hairpin routing back to the listener
//! - Produce the immutable `ConfigSnapshot` the core consumes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure apart from DNS resolution of hostnames
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;

use crate::config::schema::{BalancerConfig, ObservabilityConfig, PolicyKind};
use crate::load_balancer::backend::BackendEndpoint;

/// Lower bound for probe interval and probe timeout.
const MIN_HEALTH_MS: u64 = 50;

/// Lower bound for the half-close drain window.
const MIN_DRAIN_MS: u64 = 50;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address must be specified")]
    MissingListenAddress,

    #[error("backends must contain at least one endpoint")]
    NoBackends,

    #[error("backends contains an empty value")]
    EmptyEndpoint,

    #[error("invalid endpoint format '{0}', expected 'ip:port' or 'host:port'")]
    InvalidEndpoint(String),

    #[error("unable to resolve hostname '{host}': {reason}")]
    Unresolvable { host: String, reason: String },

    #[error("{field} must be greater than 0")]
    NotPositive { field: &'static str },

    #[error("backends contain duplicate endpoint {0}")]
    DuplicateBackend(SocketAddr),

    #[error("listen endpoint {0} must not appear in backends")]
    Hairpin(SocketAddr),
}

/// Health checker settings after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSettings {
    pub enabled: bool,
    pub interval: Duration,
    pub probe_timeout: Duration,
    /// Zero disables jitter.
    pub jitter: Duration,
    pub fails_to_down: u32,
    pub passes_to_up: u32,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_millis(2_000),
            probe_timeout: Duration::from_millis(500),
            jitter: Duration::ZERO,
            fails_to_down: 3,
            passes_to_up: 2,
        }
    }
}

/// Validated configuration snapshot.
///
/// Everything the listener, registry, sessions and health checker need,
/// with endpoints resolved and durations typed. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub listen_addr: SocketAddr,
    pub dual_stack: bool,
    pub backlog: u32,
    pub max_connections: usize,
    pub backends: Vec<BackendEndpoint>,
    pub policy: PolicyKind,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub drain_window: Duration,
    pub health: HealthSettings,
    pub observability: ObservabilityConfig,
}

impl ConfigSnapshot {
    /// Snapshot with default limits and timeouts for the given endpoints.
    pub fn new(listen_addr: SocketAddr, backends: Vec<BackendEndpoint>) -> Self {
        Self {
            listen_addr,
            dual_stack: false,
            backlog: 512,
            max_connections: 10_000,
            backends,
            policy: PolicyKind::RoundRobin,
            connect_timeout: Duration::from_millis(2_000),
            idle_timeout: Duration::from_millis(60_000),
            drain_window: Duration::from_millis(500),
            health: HealthSettings::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Validate a raw configuration and build the snapshot.
pub fn validate_config(config: &BalancerConfig) -> Result<ConfigSnapshot, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listen_addr = if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::MissingListenAddress);
        None
    } else {
        parse_endpoint(&config.listener.bind_address)
            .map_err(|e| errors.push(e))
            .ok()
    };

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut backends = Vec::with_capacity(config.backends.len());
    let mut seen = HashSet::new();
    for raw in &config.backends {
        match parse_endpoint(raw) {
            Ok(addr) => {
                if !seen.insert(addr) {
                    errors.push(ValidationError::DuplicateBackend(addr));
                    continue;
                }
                if Some(addr) == listen_addr {
                    errors.push(ValidationError::Hairpin(addr));
                }
                backends.push(BackendEndpoint::new(addr));
            }
            Err(e) => errors.push(e),
        }
    }

    let timeouts = &config.timeouts;
    if timeouts.connect_ms <= 0 {
        errors.push(ValidationError::NotPositive { field: "timeouts.connect_ms" });
    }
    if timeouts.idle_ms <= 0 {
        errors.push(ValidationError::NotPositive { field: "timeouts.idle_ms" });
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::NotPositive { field: "listener.max_connections" });
    }
    if config.listener.backlog == 0 {
        errors.push(ValidationError::NotPositive { field: "listener.backlog" });
    }

    let health = &config.health_check;
    if health.fails_to_down == 0 {
        errors.push(ValidationError::NotPositive { field: "health_check.fails_to_down" });
    }
    if health.passes_to_up == 0 {
        errors.push(ValidationError::NotPositive { field: "health_check.passes_to_up" });
    }

    let listen_addr = match listen_addr {
        Some(addr) if errors.is_empty() => addr,
        _ => return Err(errors),
    };

    Ok(ConfigSnapshot {
        listen_addr,
        dual_stack: config.listener.dual_stack,
        backlog: config.listener.backlog,
        max_connections: config.listener.max_connections,
        backends,
        policy: config.policy,
        connect_timeout: Duration::from_millis(timeouts.connect_ms as u64),
        idle_timeout: Duration::from_millis(timeouts.idle_ms as u64),
        drain_window: Duration::from_millis(timeouts.drain_ms.max(MIN_DRAIN_MS)),
        health: HealthSettings {
            enabled: health.enabled,
            interval: Duration::from_millis(health.interval_ms.max(MIN_HEALTH_MS)),
            probe_timeout: Duration::from_millis(health.timeout_ms.max(MIN_HEALTH_MS)),
            jitter: Duration::from_millis(health.jitter_ms),
            fails_to_down: health.fails_to_down,
            passes_to_up: health.passes_to_up,
        },
        observability: config.observability.clone(),
    })
}

/// Parse `ip:port` directly, otherwise resolve `host:port`, preferring IPv4.
pub fn parse_endpoint(value: &str) -> Result<SocketAddr, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::EmptyEndpoint);
    }

    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(addr);
    }

    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| ValidationError::InvalidEndpoint(value.to_string()))?;
    let port: u16 = port
        .parse()
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| ValidationError::InvalidEndpoint(value.to_string()))?;
    if host.is_empty() || host.contains(':') {
        return Err(ValidationError::InvalidEndpoint(value.to_string()));
    }

    let resolved: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| ValidationError::Unresolvable {
            host: host.to_string(),
            reason: e.to_string(),
        })?
        .collect();

    resolved
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| resolved.first())
        .copied()
        .ok_or_else(|| ValidationError::Unresolvable {
            host: host.to_string(),
            reason: "no addresses returned".to_string(),
        })
}
