//! The account directory.
//!
//! `AccountStore` is a plain owned map. It is not thread-safe by itself; the
//! gateway keeps it behind its own `tokio::sync::Mutex`, separate from the
//! session registry lock, so account edits never stall event delivery.
//!
//! Every read hands out a copy. Nothing outside the store holds a reference
//! into it, so the lock is only ever held for the length of one call.
//! Mutations await their write-back while that lock is held, so saves land
//! in the order the changes were made.

use std::collections::BTreeMap;
use std::sync::Arc;

use fleetgate_protocol::PermissionSet;

use crate::{AccountError, AccountPersister, UserAccount};

/// Name of the account created when the persister comes back empty.
pub const BOOTSTRAP_USER: &str = "guest";
/// Its password. Change it after first start.
pub const BOOTSTRAP_PASSWORD: &str = "guest-password";

/// In-memory directory of user accounts, backed by an [`AccountPersister`].
pub struct AccountStore {
    accounts: BTreeMap<String, UserAccount>,
    persister: Arc<dyn AccountPersister>,
}

impl AccountStore {
    /// Loads every account from `persister`.
    ///
    /// If nothing was persisted, one bootstrap account
    /// ([`BOOTSTRAP_USER`] / [`BOOTSTRAP_PASSWORD`], every permission) is
    /// created and saved back.
    ///
    /// # Errors
    /// [`AccountError::Persistence`] if loading fails or the bootstrap
    /// account cannot be saved. Either way the gateway must not start.
    pub async fn load(persister: Arc<dyn AccountPersister>) -> Result<Self, AccountError> {
        let loaded = persister.load_accounts().await?;
        let mut store = Self {
            accounts: loaded
                .into_iter()
                .map(|account| (account.user_name.clone(), account))
                .collect(),
            persister,
        };

        if store.accounts.is_empty() {
            tracing::warn!(
                user = BOOTSTRAP_USER,
                "no user accounts found, creating bootstrap account"
            );
            let guest =
                UserAccount::new(BOOTSTRAP_USER, BOOTSTRAP_PASSWORD, PermissionSet::all());
            store.accounts.insert(guest.user_name.clone(), guest);
            store.persister.save_accounts(&store.snapshot()).await?;
        }

        tracing::info!(count = store.accounts.len(), "account store loaded");
        Ok(store)
    }

    /// Returns a copy of the named account.
    pub fn find(&self, user_name: &str) -> Option<UserAccount> {
        self.accounts.get(user_name).cloned()
    }

    /// Checks a name/password pair. Both must match exactly.
    ///
    /// Returns a copy of the account's permissions on success.
    pub fn verify(&self, user_name: &str, password: &str) -> Option<PermissionSet> {
        let account = self.accounts.get(user_name)?;
        safe_equal(&account.password, password).then(|| account.permissions.clone())
    }

    /// # Errors
    /// [`AccountError::Exists`] if `user_name` is taken.
    pub async fn create(
        &mut self,
        user_name: &str,
        password: &str,
        permissions: PermissionSet,
    ) -> Result<(), AccountError> {
        if self.accounts.contains_key(user_name) {
            return Err(AccountError::Exists(user_name.to_string()));
        }
        self.accounts.insert(
            user_name.to_string(),
            UserAccount::new(user_name, password, permissions),
        );
        tracing::info!(user = user_name, "user account created");
        self.save().await;
        Ok(())
    }

    /// # Errors
    /// [`AccountError::Unknown`] if there is no such account.
    pub async fn set_password(
        &mut self,
        user_name: &str,
        password: &str,
    ) -> Result<(), AccountError> {
        self.get_mut(user_name)?.password = password.to_string();
        tracing::info!(user = user_name, "password changed");
        self.save().await;
        Ok(())
    }

    /// Replaces the account's permissions. Open sessions keep the set they
    /// were given at login.
    ///
    /// # Errors
    /// [`AccountError::Unknown`] if there is no such account.
    pub async fn set_permissions(
        &mut self,
        user_name: &str,
        permissions: PermissionSet,
    ) -> Result<(), AccountError> {
        let account = self.get_mut(user_name)?;
        tracing::info!(user = user_name, %permissions, "permissions changed");
        account.permissions = permissions;
        self.save().await;
        Ok(())
    }

    /// # Errors
    /// [`AccountError::Unknown`] if there is no such account.
    pub async fn remove(&mut self, user_name: &str) -> Result<(), AccountError> {
        if self.accounts.remove(user_name).is_none() {
            return Err(AccountError::Unknown(user_name.to_string()));
        }
        tracing::info!(user = user_name, "user account removed");
        self.save().await;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Copies of every account, ordered by name.
    pub fn snapshot(&self) -> Vec<UserAccount> {
        self.accounts.values().cloned().collect()
    }

    fn get_mut(&mut self, user_name: &str) -> Result<&mut UserAccount, AccountError> {
        self.accounts
            .get_mut(user_name)
            .ok_or_else(|| AccountError::Unknown(user_name.to_string()))
    }

    /// Best-effort write-back. The in-memory change stands either way.
    async fn save(&self) {
        if let Err(e) = self.persister.save_accounts(&self.snapshot()).await {
            tracing::warn!(error = %e, "failed to persist user accounts");
        }
    }
}

/// Constant-time string comparison (no early exit on the first differing byte).
fn safe_equal(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
