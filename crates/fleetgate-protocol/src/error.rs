//! Error types for the protocol layer.

/// Errors that can occur while turning frames into bytes and back, or while
/// reading typed values out of a request's positional arguments.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The bytes are not a valid frame (malformed JSON, missing fields,
    /// wrong types).
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// A positional argument is missing or has the wrong shape.
    ///
    /// `index` counts from 0 and includes the session token, so for
    /// `setPassword(token, name, password)` a bad `name` is index 1.
    #[error("argument {index} ({name}): {reason}")]
    Argument {
        index: usize,
        name: &'static str,
        reason: String,
    },

    /// The frame decoded but breaks a protocol rule.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
