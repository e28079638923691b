//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (resolve endpoints, semantic checks)
//!     → ConfigSnapshot (validated, immutable)
//!     → handed to the server at startup
//!
//! On change:
//!     watcher.rs detects modification
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → snapshot sent over an mpsc channel
//!     → registry reload + health thresholds swap
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable; changes arrive as whole new snapshots
//! - All fields have defaults to allow minimal configs
//! - Invalid reloads are logged and dropped, the running config stays

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{BalancerConfig, HealthCheckConfig, ListenerConfig, ObservabilityConfig, PolicyKind};
pub use validation::{ConfigSnapshot, HealthSettings, ValidationError};
