//! Fan-out of engine events into session buffers.
//!
//! The engine publishes on a `tokio::sync::broadcast` channel. One pump
//! task ([`EventBroadcaster::spawn_pump`]) reads that channel and hands
//! every event to [`EventBroadcaster::publish`], which offers it to each
//! session's buffer under the registry lock. Events reach a given session
//! in the order the engine emitted them.

use fleetgate_protocol::Event;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::SharedRegistry;

/// Delivers events to every open session.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    registry: SharedRegistry,
}

impl EventBroadcaster {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Offers `event` to every session's buffer. Returns how many accepted it.
    pub async fn publish(&self, event: &Event) -> usize {
        let registry = self.registry.lock().await;
        let mut accepted = 0;
        registry.for_each(|session| {
            if session.buffer().deliver(event) {
                accepted += 1;
            }
        });
        tracing::trace!(kind = %event.kind, accepted, "event published");
        accepted
    }

    /// Spawns the task that forwards everything from `events` to
    /// [`publish`](Self::publish).
    ///
    /// The task ends when the engine drops its sender. Abort the returned
    /// handle to unsubscribe earlier.
    pub fn spawn_pump(&self, mut events: broadcast::Receiver<Event>) -> JoinHandle<()> {
        let broadcaster = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        broadcaster.publish(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "event pump fell behind, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("engine event channel closed, event pump stopping");
                        break;
                    }
                }
            }
        })
    }
}
