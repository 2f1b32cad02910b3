//! Unified error type for the gateway.

use fleetgate_account::{AccountError, PersistenceError};
use fleetgate_protocol::{ErrorKind, Permission, ProtocolError};
use fleetgate_session::SessionError;
use fleetgate_transport::TransportError;

use crate::{EngineError, RegistryError};

/// Everything a gateway call or the gateway's startup can fail with.
///
/// The first group is what clients see as typed failures; each maps to
/// one wire [`ErrorKind`] through [`GatewayError::kind`]. The second group
/// wraps the sub-crate errors so `?` works across layers.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Bad login, or a missing, unknown or expired session token.
    #[error("invalid credentials: {0}")]
    CredentialsInvalid(String),

    /// The session is valid but lacks this permission.
    #[error("permission {0} required")]
    PermissionDenied(Permission),

    #[error("user account {0:?} already exists")]
    AccountExists(String),

    #[error("no user account named {0:?}")]
    AccountUnknown(String),

    /// Wrong number or shape of arguments, or a value out of range.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    #[error("unsupported operation {0:?}")]
    UnsupportedOperation(String),

    /// The engine ran the operation and reported a failure.
    #[error("engine failure: {0}")]
    Engine(String),

    // -- Infrastructure ---------------------------------------------------
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl GatewayError {
    /// The failure category sent to the client.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CredentialsInvalid(_) => ErrorKind::CredentialsInvalid,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::AccountExists(_) => ErrorKind::AccountExists,
            Self::AccountUnknown(_) => ErrorKind::AccountUnknown,
            Self::IllegalArgument(_) => ErrorKind::IllegalArgument,
            Self::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            Self::Engine(_) => ErrorKind::EngineFailure,
            Self::Protocol(ProtocolError::Encode(_)) => ErrorKind::Internal,
            Self::Protocol(_) => ErrorKind::IllegalArgument,
            Self::Persistence(_) | Self::Transport(_) | Self::Registry(_) => ErrorKind::Internal,
        }
    }
}

impl From<AccountError> for GatewayError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Exists(name) => Self::AccountExists(name),
            AccountError::Unknown(name) => Self::AccountUnknown(name),
            AccountError::Persistence(e) => Self::Persistence(e),
        }
    }
}

impl From<SessionError> for GatewayError {
    fn from(err: SessionError) -> Self {
        Self::CredentialsInvalid(err.to_string())
    }
}

impl From<EngineError> for GatewayError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UnknownOperation(op) => Self::UnsupportedOperation(op),
            EngineError::InvalidArguments(msg) => Self::IllegalArgument(msg),
            EngineError::Failed(msg) => Self::Engine(msg),
        }
    }
}
