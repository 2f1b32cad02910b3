//! # Fleetgate
//!
//! Authenticated, permission-gated remote access to a fleet-control
//! kernel.
//!
//! A backend implements the [`Engine`] trait: it lists the operations it
//! offers and what each requires, runs them by name, and emits events.
//! Fleetgate puts everything a remote client needs in front of it:
//!
//! - user accounts persisted to a JSON file
//!   ([`fleetgate_account`])
//! - login sessions identified by opaque tokens, aged out when idle
//!   ([`fleetgate_session`])
//! - a permission check on every call ([`PermissionGate`])
//! - per-session event buffers with filters and long polling
//! - a WebSocket listener speaking JSON requests ([`GatewayServer`])
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fleetgate::prelude::*;
//!
//! // Implement Engine for your kernel, then:
//! // let server = GatewayServerBuilder::new()
//! //     .config(GatewayConfig::default())
//! //     .build(Arc::new(MyKernel::new()))
//! //     .await?;
//! // server.run().await
//! ```

mod config;
mod dispatch;
mod engine;
mod error;
mod gate;
mod gateway;
mod handler;
mod local;
mod policy;
mod registry;
mod router;
mod server;

pub use config::{GatewayConfig, RegistryAddress};
pub use dispatch::{DispatchTable, Route};
pub use engine::{Engine, EngineError, EngineOperation};
pub use error::GatewayError;
pub use gate::{Caller, PermissionGate};
pub use gateway::Gateway;
pub use local::LocalCall;
pub use policy::{LocalOp, Requirement};
pub use registry::{InMemoryRegistry, REGISTRATION_NAME, Registry, RegistryError};
pub use router::MethodRouter;
pub use server::{GatewayServer, GatewayServerBuilder};

pub use fleetgate_account as account;
pub use fleetgate_protocol as protocol;
pub use fleetgate_session as session;

/// The types most engine implementations and embedders need.
pub mod prelude {
    pub use crate::{
        Engine, EngineError, EngineOperation, Gateway, GatewayConfig, GatewayError, GatewayServer,
        GatewayServerBuilder, InMemoryRegistry, Registry,
    };
    pub use fleetgate_protocol::{Event, EventFilter, Permission, PermissionSet, SessionToken};
    pub use std::sync::Arc;
}
