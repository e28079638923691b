//! TCP proxying subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted client socket
//!     → dispatcher.rs (healthy set → policy → backend, or reject)
//!     → session.rs (bounded connect, connection accounting)
//!     → pump.rs ×2 (client→backend, backend→client)
//!         wrapped by observed.rs, feeding idle.rs
//!     → half-close, drain, close
//! ```
//!
//! # Design Decisions
//! - One fixed buffer per direction; a slow peer throttles the other side
//! - A single idle clock per session, touched by traffic in either direction
//! - Sessions never retry another backend after a failed connect

pub mod dispatcher;
pub mod idle;
pub mod observed;
pub mod pump;
pub mod session;

pub use dispatcher::{ConnectionDispatcher, DispatchOutcome};
pub use session::{ProxySession, SessionOutcome, SessionStats, SessionTimeouts};
