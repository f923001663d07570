//! Shutdown coordination.
//!
//! The HTTP server and the metrics upkeep task each hold a receiver. Either
//! a termination signal or an explicit [`Shutdown::trigger`] (the test
//! harness does this on drop) stops both. Dropping every `Shutdown` handle
//! closes the channel, which receivers also treat as a stop.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::lifecycle::signals;

#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Stop every subscriber. Calling it again is harmless.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Trigger on the first SIGINT or SIGTERM.
    pub fn trigger_on_signal(&self) -> JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            signals::wait_for_termination().await;
            tracing::info!(
                listeners = shutdown.tx.receiver_count(),
                "Stopping server and background tasks"
            );
            shutdown.trigger();
        })
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
