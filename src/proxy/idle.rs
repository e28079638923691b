//! Activity clock for idle and drain deadlines.
//!
//! Every observed transfer calls `touch()`, a single atomic store. Waiters
//! sleep until `last activity + window` and re-arm if activity happened in
//! the meantime, so the deadline slides without a timer reset per byte.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct IdleTimer {
    origin: Instant,
    /// Milliseconds since `origin` at the last touch.
    last_activity_ms: AtomicU64,
}

impl IdleTimer {
    /// A clock whose last activity is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
        }
    }

    /// Record activity at the current instant.
    pub fn touch(&self) {
        let elapsed = self.origin.elapsed().as_millis() as u64;
        self.last_activity_ms.fetch_max(elapsed, Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> Instant {
        self.origin + Duration::from_millis(self.last_activity_ms.load(Ordering::Relaxed))
    }

    /// Resolves once no activity has been recorded for `window`.
    pub async fn quiet_for(&self, window: Duration) {
        loop {
            let deadline = self.last_activity() + window;
            if Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep_until(deadline).await;
        }
    }
}

impl Default for IdleTimer {
    fn default() -> Self {
        Self::new()
    }
}
