//! Layer-4 TCP load balancer library.

pub mod config;
pub mod net;
pub mod proxy;
pub mod server;

pub mod health;
pub mod load_balancer;

pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ConfigSnapshot;
pub use lifecycle::Shutdown;
pub use server::BalancerServer;
