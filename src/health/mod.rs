//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Optional jitter, bounded TCP connect per backend
//!     → Update local counters (state.rs)
//!     → registry mark_up / mark_down on threshold
//!
//! State machine (state.rs):
//!     Unknown → Up ←→ Down
//!     With thresholds to prevent flapping
//! ```
//!
//! # Design Decisions
//! - State transitions require consecutive successes/failures
//! - Counters live in the monitor, health lives in the registry
//! - Health state is per-backend; the request path never waits on probes

pub mod active;
pub mod state;

pub use active::HealthMonitor;
pub use state::{evaluate, ProbeCounters, Verdict};
