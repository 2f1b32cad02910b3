//! Codec trait and the JSON implementation.
//!
//! The gateway never touches `serde_json` directly when framing messages;
//! it goes through a [`Codec`] so the encoding stays swappable. Only JSON
//! ships today, and there is no negotiation: both ends must agree up front.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Turns frames into bytes and bytes back into frames.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a frame.
    ///
    /// # Errors
    /// [`ProtocolError::Encode`] if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes a frame.
    ///
    /// # Errors
    /// [`ProtocolError::Decode`] if the bytes are malformed or do not match
    /// the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] speaking JSON text.
///
/// ```rust
/// use fleetgate_protocol::{Codec, JsonCodec, Request};
///
/// let codec = JsonCodec;
/// let bytes = br#"{"id":7,"op":"login","args":["guest","guest-password"]}"#;
/// let request: Request = codec.decode(bytes).unwrap();
/// assert_eq!(request.op, "login");
/// assert_eq!(request.args.len(), 2);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
