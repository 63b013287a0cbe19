//! Background expiry sweep.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::SessionRegistry;

/// Handle to the running sweep task. Dropping it without calling
/// [`SweeperHandle::stop`] also ends the task, without waiting for it.
pub struct SweeperHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the task and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            tracing::warn!("Session sweeper task ended abnormally: {}", e);
        }
    }
}

/// Spawn the periodic sweep. The task holds only a weak reference so it
/// never keeps the registry alive on its own.
pub(super) fn spawn(registry: Weak<SessionRegistry>, interval: Duration) -> SweeperHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(interval_secs = interval.as_secs_f64(), "Session sweeper started");

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {
                    let Some(registry) = registry.upgrade() else {
                        break;
                    };
                    let evicted = registry.sweep_expired().await;
                    if evicted > 0 {
                        tracing::info!(count = evicted, "Cleaned up expired sessions");
                    }
                }
            }
        }

        tracing::debug!("Session sweeper stopped");
    });

    SweeperHandle { shutdown_tx, task }
}
