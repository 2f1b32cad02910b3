//! Where accounts live between runs.
//!
//! The [`AccountStore`](crate::AccountStore) only ever loads the whole set
//! once and writes the whole set back after each change, so a persister is
//! two methods. Two implementations ship here:
//!
//! - [`JsonFileAccountPersister`] keeps a pretty-printed JSON array in
//!   `<home>/data/accounts.json`.
//! - [`MemoryAccountPersister`] keeps it in memory, for tests and embedders
//!   that manage durability themselves.
//!
//! Both methods are async and run on the caller's task, so file I/O goes
//! through `tokio::fs` and never parks a runtime worker.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::fs;

use crate::{PersistenceError, UserAccount};

/// Loads and saves the complete account set.
///
/// `Send + Sync` because the store holding it is shared between connection
/// tasks. Methods return boxed futures so the store can hold an
/// `Arc<dyn AccountPersister>`.
pub trait AccountPersister: Send + Sync {
    /// Returns every persisted account. An absent backing store is an empty
    /// set, not an error.
    fn load_accounts(&self) -> BoxFuture<'_, Result<Vec<UserAccount>, PersistenceError>>;

    /// Replaces the persisted set with `accounts`.
    fn save_accounts<'a>(
        &'a self,
        accounts: &'a [UserAccount],
    ) -> BoxFuture<'a, Result<(), PersistenceError>>;
}

// ---------------------------------------------------------------------------
// JSON file
// ---------------------------------------------------------------------------

/// Persists accounts as a JSON array under a home directory.
#[derive(Debug, Clone)]
pub struct JsonFileAccountPersister {
    path: PathBuf,
}

impl JsonFileAccountPersister {
    pub const DATA_DIR: &'static str = "data";
    pub const FILE_NAME: &'static str = "accounts.json";

    /// Persister for `<home>/data/accounts.json`. Nothing is touched on disk
    /// until the first load or save.
    pub fn new(home: impl AsRef<Path>) -> Self {
        Self {
            path: home.as_ref().join(Self::DATA_DIR).join(Self::FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn format_error(&self, source: serde_json::Error) -> PersistenceError {
        PersistenceError::Format {
            path: self.path.clone(),
            source,
        }
    }

    async fn read_all(&self) -> Result<Vec<UserAccount>, PersistenceError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no account file yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        let accounts: Vec<UserAccount> =
            serde_json::from_slice(&bytes).map_err(|e| self.format_error(e))?;
        tracing::debug!(path = %self.path.display(), count = accounts.len(), "accounts loaded");
        Ok(accounts)
    }

    async fn write_all(&self, accounts: &[UserAccount]) -> Result<(), PersistenceError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).await.map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_vec_pretty(accounts).map_err(|e| self.format_error(e))?;

        // Write beside the target and rename so a crash never leaves half a file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await.map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).await.map_err(|e| self.io_error(e))?;

        tracing::debug!(path = %self.path.display(), count = accounts.len(), "accounts saved");
        Ok(())
    }
}

impl AccountPersister for JsonFileAccountPersister {
    fn load_accounts(&self) -> BoxFuture<'_, Result<Vec<UserAccount>, PersistenceError>> {
        self.read_all().boxed()
    }

    fn save_accounts<'a>(
        &'a self,
        accounts: &'a [UserAccount],
    ) -> BoxFuture<'a, Result<(), PersistenceError>> {
        self.write_all(accounts).boxed()
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

/// Keeps the "persisted" account set in memory.
///
/// Saves can be made to fail on demand with
/// [`set_fail_saves`](Self::set_fail_saves).
#[derive(Debug, Default)]
pub struct MemoryAccountPersister {
    accounts: Mutex<Vec<UserAccount>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryAccountPersister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts out holding `accounts`, as if a previous run had saved them.
    pub fn with_accounts(accounts: Vec<UserAccount>) -> Self {
        Self {
            accounts: Mutex::new(accounts),
            ..Self::default()
        }
    }

    /// What the last successful save wrote.
    pub fn snapshot(&self) -> Vec<UserAccount> {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::Relaxed);
    }
}

impl MemoryAccountPersister {
    fn store(&self, accounts: &[UserAccount]) -> Result<(), PersistenceError> {
        if self.fail_saves.load(Ordering::Relaxed) {
            return Err(PersistenceError::Io {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::other("saves disabled"),
            });
        }
        *self.accounts.lock().unwrap_or_else(PoisonError::into_inner) = accounts.to_vec();
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl AccountPersister for MemoryAccountPersister {
    fn load_accounts(&self) -> BoxFuture<'_, Result<Vec<UserAccount>, PersistenceError>> {
        futures_util::future::ready(Ok(self.snapshot())).boxed()
    }

    fn save_accounts<'a>(
        &'a self,
        accounts: &'a [UserAccount],
    ) -> BoxFuture<'a, Result<(), PersistenceError>> {
        futures_util::future::ready(self.store(accounts)).boxed()
    }
}
