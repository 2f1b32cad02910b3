//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::{ConnectionId, Transport, TransportError};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// A WebSocket [`Transport`] listening on one TCP address.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds to `addr` (`"host:port"`, port 0 for an ephemeral port).
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::BindFailed {
                addr: addr.to_string(),
                source,
            })?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }
}

impl Transport for WebSocketTransport {
    type Connection = IncomingConnection;

    /// Accepts the next TCP connection. The WebSocket handshake is left to
    /// [`IncomingConnection::upgrade`], so a peer that never completes it
    /// only stalls its own task.
    async fn accept(&mut self) -> Result<IncomingConnection, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %peer, "accepted TCP connection");

        Ok(IncomingConnection { id, peer, stream })
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A TCP connection that has not finished the WebSocket handshake yet.
pub struct IncomingConnection {
    id: ConnectionId,
    peer: SocketAddr,
    stream: TcpStream,
}

impl IncomingConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Runs the WebSocket handshake, giving up after `timeout`.
    ///
    /// # Errors
    /// [`TransportError::HandshakeTimedOut`] if the peer is too slow,
    /// [`TransportError::HandshakeFailed`] if the upgrade request is invalid.
    pub async fn upgrade(self, timeout: Duration) -> Result<WebSocketConnection, TransportError> {
        let Self { id, peer, stream } = self;
        let ws = time::timeout(timeout, tokio_tungstenite::accept_async(stream))
            .await
            .map_err(|_| TransportError::HandshakeTimedOut {
                connection: id.to_string(),
                after: timeout,
            })?
            .map_err(|e| TransportError::HandshakeFailed {
                connection: id.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(%id, %peer, "WebSocket handshake complete");
        Ok(WebSocketConnection { id, peer, ws })
    }
}

/// An upgraded WebSocket connection, not yet split.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    ws: WsStream,
}

impl WebSocketConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Splits into a reading half and a shareable writing half.
    pub fn split(self) -> (ConnectionReader, ConnectionWriter) {
        let (sink, stream) = self.ws.split();
        (
            ConnectionReader {
                id: self.id,
                stream,
            },
            ConnectionWriter {
                id: self.id,
                sink: Arc::new(Mutex::new(sink)),
            },
        )
    }
}

/// Receiving half of a [`WebSocketConnection`].
pub struct ConnectionReader {
    id: ConnectionId,
    stream: SplitStream<WsStream>,
}

impl ConnectionReader {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Receives the next data frame (text or binary).
    ///
    /// Returns `Ok(None)` once the peer closes the connection. Ping/pong
    /// frames are skipped; tungstenite answers pings on its own.
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed {
                        connection: self.id.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Sending half of a [`WebSocketConnection`]. Cheap to clone; concurrent
/// senders are serialized by an internal lock, one whole frame at a time.
#[derive(Clone)]
pub struct ConnectionWriter {
    id: ConnectionId,
    sink: Arc<Mutex<SplitSink<WsStream, Message>>>,
}

impl ConnectionWriter {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Sends one frame. Valid UTF-8 goes out as a text frame (what JSON
    /// clients expect), anything else as binary.
    pub async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::text(text.to_owned()),
            Err(_) => Message::binary(data.to_vec()),
        };
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| TransportError::SendFailed {
                connection: self.id.to_string(),
                reason: e.to_string(),
            })
    }

    /// Sends a close frame.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| TransportError::SendFailed {
                connection: self.id.to_string(),
                reason: e.to_string(),
            })
    }
}
