//! Wire protocol for fleetgate.
//!
//! This crate defines everything that crosses the network boundary between
//! a client and the gateway:
//!
//! - **RPC frames** ([`Request`], [`Response`], [`Outcome`], [`ErrorKind`]):
//!   one request names an operation and carries positional JSON arguments.
//! - **Identity & authorization** ([`SessionToken`], [`Permission`],
//!   [`PermissionSet`]): what a client presents and what it is allowed to do.
//! - **Events** ([`Event`], [`EventFilter`]): what the backend engine emits
//!   and how a session chooses which of them it wants.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames become bytes.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Request/Response) → Gateway (router, sessions)
//! ```
//!
//! The protocol layer has no behavior of its own beyond (de)serialization
//! and a few set operations on permissions.

mod codec;
mod error;
mod event;
mod permission;
mod rpc;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use event::{Event, EventFilter};
pub use permission::{Permission, PermissionSet};
pub use rpc::{ArgReader, ErrorKind, Outcome, Request, Response, SessionToken};
