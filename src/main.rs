//! TCP load balancer (v1)
//!
//! Accepts TCP connections, picks a healthy backend with the configured
//! policy and relays bytes in both directions.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────────┐
//!                        │                  TCP BALANCER                     │
//!                        │                                                   │
//!     Client  ───────────┼─▶ net::listener ──▶ proxy::dispatcher             │
//!                        │        │                  │                       │
//!                        │        │          load_balancer (policy over      │
//!                        │        │          registry's healthy set)         │
//!                        │        │                  │                       │
//!     Client  ◀──────────┼── proxy::session ◀────────┘ ──── pumps ◀─────────┼──── Backend
//!                        │                                                   │
//!                        │  ┌─────────────────────────────────────────────┐  │
//!                        │  │ health (TCP probes) → registry              │  │
//!                        │  │ config (TOML, watcher) → registry / timeouts│  │
//!                        │  │ lifecycle (signals, drain) observability    │  │
//!                        │  └─────────────────────────────────────────────┘  │
//!                        └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use tcp_balancer::config::load_config;
use tcp_balancer::lifecycle::startup;
use tcp_balancer::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "tcp-balancer")]
#[command(about = "Layer-4 TCP load balancer", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut snapshot = load_config(&cli.config)?;
    if let Some(level) = cli.log_level {
        snapshot.observability.log_level = level;
    }

    if cli.check {
        println!(
            "configuration OK: listen {} → {} backend(s), policy {}",
            snapshot.listen_addr,
            snapshot.backends.len(),
            snapshot.policy
        );
        return Ok(());
    }

    init_logging(&snapshot.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        listen = %snapshot.listen_addr,
        backends = snapshot.backends.len(),
        policy = %snapshot.policy,
        "tcp-balancer starting"
    );

    startup::run(snapshot, &cli.config).await?;
    Ok(())
}
