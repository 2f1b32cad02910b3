/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening socket failed.
    #[error("bind to {addr} failed: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Accepting a TCP connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The peer sent an invalid WebSocket upgrade request.
    #[error("handshake failed on {connection}: {reason}")]
    HandshakeFailed { connection: String, reason: String },

    /// The peer did not complete the WebSocket upgrade in time.
    #[error("handshake on {connection} timed out after {after:?}")]
    HandshakeTimedOut {
        connection: String,
        after: std::time::Duration,
    },

    /// Writing a frame failed.
    #[error("send failed on {connection}: {reason}")]
    SendFailed { connection: String, reason: String },

    /// Reading a frame failed.
    #[error("receive failed on {connection}: {reason}")]
    ReceiveFailed { connection: String, reason: String },
}
