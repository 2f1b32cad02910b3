//! Transport layer for fleetgate.
//!
//! Accepts client connections and moves opaque frames in both directions.
//! A connection is split into a [`ConnectionReader`] owned by the per-connection
//! task and a cloneable [`ConnectionWriter`] shared by every in-flight request,
//! so a request that blocks (a long poll) never holds up the replies to
//! requests that arrived after it.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    ConnectionReader, ConnectionWriter, IncomingConnection, WebSocketConnection, WebSocketTransport,
};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection, unique per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Send + 'static;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, TransportError>;

    /// The address clients reach this transport on. With port 0 at bind
    /// time this is where the OS-assigned port shows up.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}
