//! Request/response frames and the session token.
//!
//! Every client call is a [`Request`]: an operation name plus positional
//! arguments. Operations that act on behalf of a logged-in user take the
//! [`SessionToken`] as their first argument. The gateway answers each
//! request with exactly one [`Response`] carrying the same `id`.
//!
//! ```text
//! → {"id":1,"op":"login","args":["guest","guest-password"]}
//! ← {"id":1,"result":{"status":"ok","value":"00000000000000011f…"}}
//! → {"id":2,"op":"pollEvents","args":["00000000000000011f…",5000]}
//! ← {"id":2,"result":{"status":"ok","value":[]}}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// SessionToken
// ---------------------------------------------------------------------------

/// Opaque, unguessable identifier handed out by `login`.
///
/// `Display` only shows the last six characters so tokens can appear in logs without
/// leaking a usable credential. Use [`SessionToken::as_str`] for the full
/// value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = match self.0.char_indices().rev().nth(5) {
            Some((start, _)) => &self.0[start..],
            None => self.0.as_str(),
        };
        write!(f, "tok…{shown}")
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// A client call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Chosen by the client, echoed back in the [`Response`]. Responses on
    /// one connection may arrive out of order, so this is how they match up.
    pub id: u64,
    /// Operation name, e.g. `"setPassword"` or `"withdrawByVehicle"`.
    pub op: String,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

/// The gateway's answer to one [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub result: Outcome,
}

impl Response {
    pub fn ok(id: u64, value: serde_json::Value) -> Self {
        Self {
            id,
            result: Outcome::Ok { value },
        }
    }

    pub fn error(id: u64, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            id,
            result: Outcome::Error {
                kind,
                message: message.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Ok { value: serde_json::Value },
    Error { kind: ErrorKind, message: String },
}

/// Typed failure category reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Bad login, or unknown/expired session token.
    CredentialsInvalid,
    /// Known session lacking a required capability.
    PermissionDenied,
    AccountExists,
    AccountUnknown,
    /// Wrong arity, wrong type, null field, negative timeout.
    IllegalArgument,
    /// Neither the gateway nor the engine provides the operation.
    UnsupportedOperation,
    /// The engine ran the operation and reported a failure.
    EngineFailure,
    /// Anything else (codec failure on the gateway side, etc.).
    Internal,
}

// ---------------------------------------------------------------------------
// Positional argument reader
// ---------------------------------------------------------------------------

/// Reads typed values out of a request's positional arguments, front to back.
///
/// ```rust
/// use fleetgate_protocol::ArgReader;
/// use serde_json::json;
///
/// let mut args = ArgReader::new(vec![json!("alice"), json!(5000)]);
/// let name: String = args.next("userName").unwrap();
/// let timeout: i64 = args.next("timeout").unwrap();
/// args.finish().unwrap();
/// assert_eq!((name.as_str(), timeout), ("alice", 5000));
/// ```
#[derive(Debug)]
pub struct ArgReader {
    args: std::vec::IntoIter<serde_json::Value>,
    index: usize,
}

impl ArgReader {
    pub fn new(args: Vec<serde_json::Value>) -> Self {
        Self {
            args: args.into_iter(),
            index: 0,
        }
    }

    /// Takes the next argument as a `T`.
    ///
    /// # Errors
    /// [`ProtocolError::Argument`] if there is no next argument, or if it
    /// does not deserialize into `T` (this includes `null` for any
    /// non-`Option` type).
    pub fn next<T: DeserializeOwned>(&mut self, name: &'static str) -> Result<T, ProtocolError> {
        let index = self.index;
        self.index += 1;
        let value = self.args.next().ok_or_else(|| ProtocolError::Argument {
            index,
            name,
            reason: "missing".into(),
        })?;
        serde_json::from_value(value).map_err(|e| ProtocolError::Argument {
            index,
            name,
            reason: e.to_string(),
        })
    }

    /// Checks that every argument was consumed.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] if arguments are left over.
    pub fn finish(self) -> Result<(), ProtocolError> {
        let extra = self.args.len();
        if extra > 0 {
            return Err(ProtocolError::InvalidMessage(format!(
                "expected {} argument(s), got {}",
                self.index,
                self.index + extra
            )));
        }
        Ok(())
    }

    /// Returns the arguments not consumed yet.
    pub fn into_rest(self) -> Vec<serde_json::Value> {
        self.args.collect()
    }
}
