//! Background inactivity sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{info, warn};

use crate::session::SessionStore;

/// Runs [`SessionStore::sweep`] on a fixed interval until shut down.
pub struct SessionSweeper {
    store: Arc<SessionStore>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl SessionSweeper {
    pub fn new(store: Arc<SessionStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Sweep every `interval` until [`shutdown`](Self::shutdown) is called.
    /// A failed sweep is logged and retried on the next tick.
    pub async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "Session sweeper started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.store.sweep() {
                        warn!(error = %e, "Session sweep failed");
                    }
                }
                _ = self.shutdown.notified() => {
                    info!("Session sweeper stopped");
                    return;
                }
            }
        }
    }

    /// Signal the sweeper to stop. Safe to call before `run`.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}
