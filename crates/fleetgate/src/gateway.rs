//! Gateway lifecycle: the router plus its two background tasks.
//!
//! ```text
//! Gateway::new ──→ start() ──→ [running] ──→ terminate() ──→ [stopped]
//!                     │                          │
//!                     ├─ subscribe to engine     ├─ abort event pump (drops receiver)
//!                     └─ spawn session reaper    └─ stop reaper
//! ```
//!
//! Both transitions are idempotent. Calls can be dispatched in either
//! state; while stopped, sessions simply receive no events and are never
//! reaped.

use std::sync::Arc;

use fleetgate_account::AccountStore;
use fleetgate_session::{
    EventBroadcaster, ReaperHandle, SessionReaper, SessionRegistry, SharedRegistry, SweepConfig,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::{Engine, GatewayError, MethodRouter};

struct Running {
    reaper: ReaperHandle,
    pump: JoinHandle<()>,
}

/// The remote-access gateway in front of one engine.
pub struct Gateway<E: Engine> {
    router: MethodRouter<E>,
    engine: Arc<E>,
    registry: SharedRegistry,
    sweep: SweepConfig,
    running: Mutex<Option<Running>>,
}

impl<E: Engine> Gateway<E> {
    pub fn new(engine: Arc<E>, accounts: AccountStore, sweep: SweepConfig) -> Self {
        let registry = SessionRegistry::shared();
        Self {
            router: MethodRouter::new(engine.clone(), accounts, registry.clone()),
            engine,
            registry,
            sweep,
            running: Mutex::new(None),
        }
    }

    /// Subscribes to engine events and starts the reaper. No-op if running.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return;
        }
        let pump = EventBroadcaster::new(self.registry.clone()).spawn_pump(self.engine.subscribe());
        let reaper = SessionReaper::spawn(self.registry.clone(), self.sweep.clone());
        *running = Some(Running { reaper, pump });
        tracing::info!(operations = self.router.table().len(), "gateway started");
    }

    /// Unsubscribes from engine events and stops the reaper. No-op if not
    /// running.
    pub async fn terminate(&self) {
        let Some(Running { reaper, pump }) = self.running.lock().await.take() else {
            return;
        };
        pump.abort();
        let _ = pump.await;
        reaper.stop().await;
        tracing::info!("gateway terminated");
    }

    pub async fn is_initialized(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Shorthand for [`MethodRouter::dispatch`].
    pub async fn dispatch(&self, operation: &str, args: Vec<Value>) -> Result<Value, GatewayError> {
        self.router.dispatch(operation, args).await
    }

    pub fn router(&self) -> &MethodRouter<E> {
        &self.router
    }

    /// The session registry, shared with the router and background tasks.
    pub fn sessions(&self) -> &SharedRegistry {
        &self.registry
    }
}
