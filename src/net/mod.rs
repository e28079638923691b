//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits, accept backoff)
//!     → connection.rs (id + in-flight tracking)
//!     → Hand off to the proxy dispatcher on its own task
//! ```
//!
//! # Design Decisions
//! - Bounded accept: a semaphore permit is held for each connection's lifetime
//! - Each connection tracked for graceful shutdown
//! - Stopping the accept loop never cancels dispatched sessions

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{Listener, ListenerError};
