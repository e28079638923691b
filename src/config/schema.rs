//! Configuration schema definitions.
//!
//! This module defines the on-disk configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.
//! Values here are unvalidated; see `validation.rs` for the snapshot the
//! core actually consumes.

use serde::{Deserialize, Serialize};

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Listener configuration (bind address, backlog, limits).
    pub listener: ListenerConfig,

    /// Backend endpoints as `ip:port` or `host:port`, in routing order.
    pub backends: Vec<String>,

    /// Load balancing policy.
    pub policy: PolicyKind,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum number of pending connections in the kernel accept queue.
    pub backlog: u32,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Upgrade an IPv4 wildcard bind address to the IPv6 wildcard.
    pub dual_stack: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            backlog: 512,
            max_connections: 10_000,
            dual_stack: true,
        }
    }
}

/// Backend selection algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    RoundRobin,
    Random,
    LeastConnections,
    SourceIpHash,
    ConsistentHash,
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PolicyKind::RoundRobin => "round_robin",
            PolicyKind::Random => "random",
            PolicyKind::LeastConnections => "least_connections",
            PolicyKind::SourceIpHash => "source_ip_hash",
            PolicyKind::ConsistentHash => "consistent_hash",
        };
        f.write_str(name)
    }
}

/// Timeout configuration for proxy sessions.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in milliseconds.
    pub connect_ms: i64,

    /// Session idle timeout in milliseconds.
    pub idle_ms: i64,

    /// Drain window after the first direction of a session finishes.
    pub drain_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 2_000,
            idle_ms: 60_000,
            drain_ms: 500,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Interval between probe sweeps in milliseconds.
    pub interval_ms: u64,

    /// Per-probe connect timeout in milliseconds.
    pub timeout_ms: u64,

    /// Upper bound of the random delay before each probe (0 disables).
    pub jitter_ms: u64,

    /// Number of consecutive failures before marking a backend down.
    pub fails_to_down: u32,

    /// Number of consecutive successes before marking a backend up.
    pub passes_to_up: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 2_000,
            timeout_ms: 500,
            jitter_ms: 0,
            fails_to_down: 3,
            passes_to_up: 2,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let config: BalancerConfig = toml::from_str(
            r#"
            backends = ["127.0.0.1:9001"]

            [listener]
            bind_address = "127.0.0.1:8080"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.backlog, 512);
        assert_eq!(config.listener.max_connections, 10_000);
        assert_eq!(config.policy, PolicyKind::RoundRobin);
        assert_eq!(config.timeouts.connect_ms, 2_000);
        assert_eq!(config.timeouts.idle_ms, 60_000);
        assert_eq!(config.health_check.fails_to_down, 3);
        assert_eq!(config.health_check.passes_to_up, 2);
    }

    #[test]
    fn policy_names_are_snake_case() {
        let config: BalancerConfig = toml::from_str(r#"policy = "least_connections""#).unwrap();
        assert_eq!(config.policy, PolicyKind::LeastConnections);
        assert_eq!(PolicyKind::SourceIpHash.to_string(), "source_ip_hash");
    }
}
