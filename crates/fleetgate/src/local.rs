//! Typed arguments for the gateway's own operations.
//!
//! A request arrives as a name plus a list of JSON values. For local
//! operations that list is decoded into a [`LocalCall`] before the
//! permission gate runs, so malformed calls fail with
//! [`GatewayError::IllegalArgument`] no matter who sent them.

use std::time::Duration;

use fleetgate_protocol::{ArgReader, EventFilter, PermissionSet, ProtocolError, SessionToken};
use serde_json::Value;

use crate::{GatewayError, LocalOp};

#[derive(Debug, Clone, PartialEq)]
pub enum LocalCall {
    Login {
        user_name: String,
        password: String,
    },
    Logout {
        token: SessionToken,
    },
    GetPermissions {
        token: SessionToken,
    },
    CreateUser {
        token: SessionToken,
        user_name: String,
        password: String,
        permissions: PermissionSet,
    },
    SetPassword {
        token: SessionToken,
        user_name: String,
        password: String,
    },
    SetPermissions {
        token: SessionToken,
        user_name: String,
        permissions: PermissionSet,
    },
    RemoveUser {
        token: SessionToken,
        user_name: String,
    },
    SetEventFilter {
        token: SessionToken,
        filter: EventFilter,
    },
    PollEvents {
        token: SessionToken,
        timeout: Duration,
    },
}

impl LocalCall {
    /// Decodes `args` for `op`.
    ///
    /// # Errors
    /// [`GatewayError::IllegalArgument`] for a missing, extra, `null` or
    /// mistyped argument, and for a negative `pollEvents` timeout.
    pub fn decode(op: LocalOp, args: Vec<Value>) -> Result<Self, GatewayError> {
        Self::read(op, ArgReader::new(args))
            .map_err(|e| GatewayError::IllegalArgument(format!("{op}: {e}")))
    }

    fn read(op: LocalOp, mut args: ArgReader) -> Result<Self, ProtocolError> {
        let call = match op {
            LocalOp::Login => Self::Login {
                user_name: args.next("userName")?,
                password: args.next("password")?,
            },
            LocalOp::Logout => Self::Logout {
                token: args.next("token")?,
            },
            LocalOp::GetPermissions => Self::GetPermissions {
                token: args.next("token")?,
            },
            LocalOp::CreateUser => Self::CreateUser {
                token: args.next("token")?,
                user_name: args.next("userName")?,
                password: args.next("password")?,
                permissions: args.next("permissions")?,
            },
            LocalOp::SetPassword => Self::SetPassword {
                token: args.next("token")?,
                user_name: args.next("userName")?,
                password: args.next("password")?,
            },
            LocalOp::SetPermissions => Self::SetPermissions {
                token: args.next("token")?,
                user_name: args.next("userName")?,
                permissions: args.next("permissions")?,
            },
            LocalOp::RemoveUser => Self::RemoveUser {
                token: args.next("token")?,
                user_name: args.next("userName")?,
            },
            LocalOp::SetEventFilter => Self::SetEventFilter {
                token: args.next("token")?,
                filter: args.next("filter")?,
            },
            LocalOp::PollEvents => {
                let token = args.next("token")?;
                let timeout_ms: i64 = args.next("timeout")?;
                let timeout_ms = u64::try_from(timeout_ms).map_err(|_| ProtocolError::Argument {
                    index: 1,
                    name: "timeout",
                    reason: format!("must not be negative, got {timeout_ms}"),
                })?;
                Self::PollEvents {
                    token,
                    timeout: Duration::from_millis(timeout_ms),
                }
            }
        };
        args.finish()?;
        Ok(call)
    }

    /// The session token, for operations that take one.
    pub fn token(&self) -> Option<&SessionToken> {
        match self {
            Self::Login { .. } => None,
            Self::Logout { token }
            | Self::GetPermissions { token }
            | Self::CreateUser { token, .. }
            | Self::SetPassword { token, .. }
            | Self::SetPermissions { token, .. }
            | Self::RemoveUser { token, .. }
            | Self::SetEventFilter { token, .. }
            | Self::PollEvents { token, .. } => Some(token),
        }
    }
}
