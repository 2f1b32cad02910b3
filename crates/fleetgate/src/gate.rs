//! The permission gate.
//!
//! Every routed call passes through [`PermissionGate::authorize`] before
//! any handler or engine code runs. A call that passes a
//! [`Requirement::Session`] check also refreshes the session's liveness
//! flag, so the reaper only ever sees sessions that stopped calling.

use fleetgate_protocol::{Permission, PermissionSet, SessionToken};
use fleetgate_session::SharedRegistry;

use crate::{GatewayError, Requirement};

/// The session behind an authorized call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_name: String,
    pub permissions: PermissionSet,
}

impl Caller {
    /// Checks one more permission against the caller's login snapshot.
    ///
    /// # Errors
    /// [`GatewayError::PermissionDenied`] if the session lacks `permission`.
    pub fn require(&self, permission: Permission) -> Result<(), GatewayError> {
        if self.permissions.contains(permission) {
            Ok(())
        } else {
            tracing::debug!(user = %self.user_name, missing = %permission, "permission denied");
            Err(GatewayError::PermissionDenied(permission))
        }
    }
}

#[derive(Debug, Clone)]
pub struct PermissionGate {
    registry: SharedRegistry,
}

impl PermissionGate {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Checks `token` against `requirement` for `operation`.
    ///
    /// Returns the caller for [`Requirement::Session`], `None` for the
    /// requirements that do not look at the token.
    ///
    /// # Errors
    /// - [`GatewayError::CredentialsInvalid`] if a session is required and
    ///   the token is missing or unknown
    /// - [`GatewayError::PermissionDenied`] naming the first missing
    ///   permission
    pub async fn authorize(
        &self,
        operation: &str,
        token: Option<&SessionToken>,
        requirement: &Requirement,
    ) -> Result<Option<Caller>, GatewayError> {
        match requirement {
            Requirement::Open => {
                tracing::debug!(operation, "open operation, allowed without a permission check");
                Ok(None)
            }
            Requirement::Undeclared => {
                tracing::warn!(operation, "operation declares no permissions, allowing by default");
                Ok(None)
            }
            Requirement::Session(required) => {
                let token = token.ok_or_else(|| {
                    GatewayError::CredentialsInvalid(format!("{operation} needs a session token"))
                })?;
                let caller = self.check(token, required).await?;
                tracing::debug!(operation, user = %caller.user_name, "call authorized");
                Ok(Some(caller))
            }
        }
    }

    async fn check(
        &self,
        token: &SessionToken,
        required: &PermissionSet,
    ) -> Result<Caller, GatewayError> {
        let mut registry = self.registry.lock().await;
        if !registry.touch(token) {
            return Err(GatewayError::CredentialsInvalid(format!(
                "unknown session token {token}"
            )));
        }
        let session = registry.get(token).ok_or_else(|| {
            GatewayError::CredentialsInvalid(format!("unknown session token {token}"))
        })?;
        if let Some(missing) = session.permissions().first_missing(required) {
            tracing::debug!(user = session.user_name(), %missing, "permission denied");
            return Err(GatewayError::PermissionDenied(missing));
        }
        Ok(Caller {
            user_name: session.user_name().to_string(),
            permissions: session.permissions().clone(),
        })
    }
}
