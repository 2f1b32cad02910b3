//! The method router: one entry point for every client call.
//!
//! ```text
//! dispatch(op, args)
//!   ├─ no route ─────────────────────────────→ UnsupportedOperation
//!   ├─ Local       → decode args → gate → handler
//!   └─ PassThrough → token = args[0] → gate → engine.invoke(op, args[1..])
//! ```
//!
//! The router owns no state of its own. It shares the session registry
//! with the broadcaster and reaper, and keeps the account store behind a
//! second, independent lock. Account mutations hold that lock across
//! their write-back, which is async and never touches the registry lock.

use std::sync::Arc;

use fleetgate_account::AccountStore;
use fleetgate_protocol::{ArgReader, Permission, PermissionSet, SessionToken};
use fleetgate_session::SharedRegistry;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{Caller, DispatchTable, Engine, GatewayError, LocalCall, PermissionGate, Route};

/// Routes calls to local handlers or the engine.
pub struct MethodRouter<E: Engine> {
    table: DispatchTable,
    gate: PermissionGate,
    registry: SharedRegistry,
    accounts: Mutex<AccountStore>,
    engine: Arc<E>,
}

impl<E: Engine> MethodRouter<E> {
    /// Builds the dispatch table from the engine's declared operations.
    pub fn new(engine: Arc<E>, accounts: AccountStore, registry: SharedRegistry) -> Self {
        Self {
            table: DispatchTable::build(engine.operations()),
            gate: PermissionGate::new(registry.clone()),
            registry,
            accounts: Mutex::new(accounts),
            engine,
        }
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Runs one call and returns its JSON result.
    ///
    /// # Errors
    /// Any of the client-facing [`GatewayError`] variants.
    pub async fn dispatch(
        &self,
        operation: &str,
        args: Vec<Value>,
    ) -> Result<Value, GatewayError> {
        let Some(route) = self.table.route(operation) else {
            tracing::debug!(operation, "no route");
            return Err(GatewayError::UnsupportedOperation(operation.to_string()));
        };

        match route {
            Route::Local { call, requirement } => {
                let call = LocalCall::decode(*call, args)?;
                let caller = self
                    .gate
                    .authorize(operation, call.token(), requirement)
                    .await?;
                self.handle(call, caller).await
            }
            Route::PassThrough { requirement } => {
                let mut args = ArgReader::new(args);
                let token: SessionToken = args
                    .next("token")
                    .map_err(|e| GatewayError::IllegalArgument(format!("{operation}: {e}")))?;
                self.gate.authorize(operation, Some(&token), requirement).await?;
                tracing::debug!(operation, "forwarding to engine");
                Ok(self.engine.invoke(operation, args.into_rest()).await?)
            }
        }
    }

    /// `caller` is whatever the gate resolved for the call's token.
    async fn handle(&self, call: LocalCall, caller: Option<Caller>) -> Result<Value, GatewayError> {
        match call {
            LocalCall::Login { user_name, password } => {
                let token = self.login(&user_name, &password).await?;
                Ok(Value::String(token.as_str().to_string()))
            }
            LocalCall::Logout { token } => {
                self.registry.lock().await.remove(&token);
                Ok(Value::Null)
            }
            LocalCall::GetPermissions { token } => {
                let permissions = self.permissions_of(&token).await;
                to_value(&permissions)
            }
            LocalCall::CreateUser {
                user_name,
                password,
                permissions,
                ..
            } => {
                self.accounts
                    .lock()
                    .await
                    .create(&user_name, &password, permissions)
                    .await?;
                Ok(Value::Null)
            }
            LocalCall::SetPassword {
                user_name,
                password,
                ..
            } => {
                self.set_password(caller.as_ref(), &user_name, &password).await?;
                Ok(Value::Null)
            }
            LocalCall::SetPermissions {
                user_name,
                permissions,
                ..
            } => {
                self.accounts
                    .lock()
                    .await
                    .set_permissions(&user_name, permissions)
                    .await?;
                Ok(Value::Null)
            }
            LocalCall::RemoveUser { user_name, .. } => {
                self.accounts.lock().await.remove(&user_name).await?;
                Ok(Value::Null)
            }
            LocalCall::SetEventFilter { token, filter } => {
                self.registry.lock().await.set_filter(&token, filter)?;
                Ok(Value::Null)
            }
            LocalCall::PollEvents { token, timeout } => {
                let buffer = self
                    .registry
                    .lock()
                    .await
                    .buffer(&token)
                    .ok_or_else(|| {
                        GatewayError::CredentialsInvalid(format!("unknown session token {token}"))
                    })?;

                // Registry lock released: the reaper and other calls run
                // while this one waits.
                let events = buffer.retrieve(timeout).await;

                self.registry.lock().await.touch(&token);
                to_value(&events)
            }
        }
    }

    async fn login(&self, user_name: &str, password: &str) -> Result<SessionToken, GatewayError> {
        let permissions = self
            .accounts
            .lock()
            .await
            .verify(user_name, password)
            .ok_or_else(|| {
                tracing::info!(user = user_name, "login rejected");
                GatewayError::CredentialsInvalid(format!(
                    "bad user name or password for {user_name:?}"
                ))
            })?;
        Ok(self.registry.lock().await.create(user_name, permissions))
    }

    /// Never fails: an unknown token has no permissions.
    async fn permissions_of(&self, token: &SessionToken) -> PermissionSet {
        let mut registry = self.registry.lock().await;
        if !registry.touch(token) {
            return PermissionSet::new();
        }
        registry
            .get(token)
            .map(|session| session.permissions().clone())
            .unwrap_or_default()
    }

    /// Anyone may change their own password; changing someone else's
    /// needs [`Permission::ManageUsers`].
    async fn set_password(
        &self,
        caller: Option<&Caller>,
        user_name: &str,
        password: &str,
    ) -> Result<(), GatewayError> {
        let Some(caller) = caller else {
            return Err(GatewayError::CredentialsInvalid(
                "setPassword needs a session token".to_string(),
            ));
        };
        if caller.user_name != user_name {
            tracing::debug!(
                user = %caller.user_name,
                target_user = user_name,
                "changing another user's password"
            );
            caller.require(Permission::ManageUsers)?;
        }
        self.accounts
            .lock()
            .await
            .set_password(user_name, password)
            .await?;
        Ok(())
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, GatewayError> {
    serde_json::to_value(value)
        .map_err(|e| GatewayError::Protocol(fleetgate_protocol::ProtocolError::Encode(e)))
}
