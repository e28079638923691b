//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::validation::ConfigSnapshot;

/// A watcher that monitors the configuration file for changes.
#[derive(Debug, Clone)]
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ConfigSnapshot>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for validated snapshots.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ConfigSnapshot>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Reload the file once and publish it if valid.
    pub fn reload_now(&self) {
        reload(&self.path, &self.update_tx);
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for events to keep flowing.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, reloading");
                        reload(&path, &tx);
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn reload(path: &Path, tx: &mpsc::UnboundedSender<ConfigSnapshot>) {
    match load_config(path) {
        Ok(snapshot) => {
            tracing::info!(backends = snapshot.backends.len(), "Configuration reloaded");
            let _ = tx.send(snapshot);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
        }
    }
}
