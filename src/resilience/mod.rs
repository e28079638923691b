//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound connect (session or health probe):
//!     → timeouts.rs (bounded connect, cancellable)
//!
//! Listener accept errors / probe scheduling:
//!     → backoff.rs (exponential backoff, random jitter)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every outbound connect has a deadline
//! - No retries inside a session; the next connection may pick another backend

pub mod backoff;
pub mod timeouts;
