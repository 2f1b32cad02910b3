//! Error types for the session layer.

use fleetgate_protocol::SessionToken;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session with this token: never issued, logged out, or evicted.
    /// Displays the masked form of the token.
    #[error("unknown session token {0}")]
    UnknownToken(SessionToken),
}
