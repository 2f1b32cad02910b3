//! Background eviction of idle sessions.
//!
//! The reaper wakes on a [`SweepScheduler`] and runs one
//! [`SessionRegistry::sweep`](crate::SessionRegistry::sweep) per interval.
//! Each sweep runs as its own task: if it panics, the panic is logged and
//! the next sweep still happens on schedule.

use std::future::Future;

use fleetgate_sweep::{SweepConfig, SweepScheduler};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::{EvictedSession, SharedRegistry};

/// Spawns reaper tasks.
pub struct SessionReaper;

impl SessionReaper {
    /// Starts reaping `registry` every `config.interval`.
    pub fn spawn(registry: SharedRegistry, config: SweepConfig) -> ReaperHandle {
        Self::spawn_with(config, move || {
            let registry = registry.clone();
            async move { registry.lock().await.sweep() }
        })
    }

    /// Starts a reaper that calls `sweep` once per interval.
    pub fn spawn_with<F, Fut>(config: SweepConfig, sweep: F) -> ReaperHandle
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Vec<EvictedSession>> + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let mut scheduler = SweepScheduler::new(config);
        tracing::info!(
            interval_ms = scheduler.interval().as_millis() as u64,
            "session reaper started"
        );
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    // Also fires when the handle is dropped.
                    _ = &mut stop_rx => break,
                    info = scheduler.wait_for_sweep() => {
                        match tokio::spawn(sweep()).await {
                            Ok(evicted) => {
                                for session in &evicted {
                                    tracing::info!(
                                        user = %session.user_name,
                                        token = %session.token,
                                        "idle session evicted"
                                    );
                                }
                                tracing::debug!(
                                    sweep = info.sweep,
                                    evicted = evicted.len(),
                                    "sweep done"
                                );
                            }
                            Err(e) if e.is_panic() => {
                                tracing::error!(
                                    sweep = info.sweep,
                                    "session sweep panicked, reaper continues"
                                );
                            }
                            Err(e) => {
                                tracing::warn!(
                                    sweep = info.sweep,
                                    error = %e,
                                    "session sweep cancelled"
                                );
                            }
                        }
                        scheduler.record_sweep_end();
                    }
                }
            }
            tracing::info!(sweeps = scheduler.sweep_count(), "session reaper stopped");
        });
        ReaperHandle {
            stop_tx: Some(stop_tx),
            task,
        }
    }
}

/// Owner's handle on a running reaper. Dropping it also stops the reaper.
pub struct ReaperHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Stops the reaper and waits for its loop to exit. A sweep already
    /// in progress finishes first.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "session reaper task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
