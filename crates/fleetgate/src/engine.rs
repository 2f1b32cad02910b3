//! The backend engine seen from the gateway.
//!
//! The gateway knows nothing about vehicles or transport orders. It needs
//! three things from the engine behind it:
//!
//! 1. which operations exist and what each requires ([`Engine::operations`])
//! 2. a way to run one by name ([`Engine::invoke`])
//! 3. a stream of the events it emits ([`Engine::subscribe`])
//!
//! # Example
//!
//! ```rust
//! use fleetgate::{Engine, EngineError, EngineOperation};
//! use fleetgate_protocol::{Event, Permission};
//! use serde_json::{Value, json};
//! use tokio::sync::broadcast;
//!
//! struct Clock {
//!     events: broadcast::Sender<Event>,
//! }
//!
//! impl Engine for Clock {
//!     fn operations(&self) -> Vec<EngineOperation> {
//!         vec![EngineOperation::requires("now", [Permission::ReadData])]
//!     }
//!
//!     async fn invoke(&self, operation: &str, _args: Vec<Value>) -> Result<Value, EngineError> {
//!         match operation {
//!             "now" => Ok(json!(0)),
//!             other => Err(EngineError::UnknownOperation(other.to_string())),
//!         }
//!     }
//!
//!     fn subscribe(&self) -> broadcast::Receiver<Event> {
//!         self.events.subscribe()
//!     }
//! }
//! ```

use std::future::Future;

use fleetgate_protocol::{Event, Permission};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::Requirement;

/// One pass-through operation the engine offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOperation {
    pub name: String,
    pub requirement: Requirement,
}

impl EngineOperation {
    /// An operation callable by sessions holding `permissions`.
    pub fn requires<const N: usize>(name: impl Into<String>, permissions: [Permission; N]) -> Self {
        Self {
            name: name.into(),
            requirement: Requirement::permissions(permissions),
        }
    }

    /// An operation with no declared requirement. It is still routed, with
    /// a warning on every call.
    pub fn undeclared(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requirement: Requirement::Undeclared,
        }
    }
}

/// Failures reported by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine has no operation {0:?}")]
    UnknownOperation(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The operation ran and failed.
    #[error("{0}")]
    Failed(String),
}

/// A stateful backend reachable through the gateway.
///
/// `Send + Sync + 'static` because one engine is shared by every
/// connection task for the lifetime of the server.
pub trait Engine: Send + Sync + 'static {
    /// The pass-through surface. Read once, when the dispatch table is built.
    fn operations(&self) -> Vec<EngineOperation>;

    /// Runs `operation` with `args`. The caller's session token has already
    /// been checked and stripped from `args`.
    fn invoke(
        &self,
        operation: &str,
        args: Vec<Value>,
    ) -> impl Future<Output = Result<Value, EngineError>> + Send;

    /// A fresh receiver for the engine's events.
    fn subscribe(&self) -> broadcast::Receiver<Event>;
}
