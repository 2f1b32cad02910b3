//! Error types for the account layer.

use std::path::PathBuf;

/// Reading or writing the persisted account set failed.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("account file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but does not hold a valid account list.
    #[error("account file {path} is malformed: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from [`AccountStore`](crate::AccountStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// `create` was asked for a name that is already taken.
    #[error("user account {0:?} already exists")]
    Exists(String),

    /// The named account does not exist.
    #[error("no user account named {0:?}")]
    Unknown(String),

    /// Only returned from [`AccountStore::load`](crate::AccountStore::load);
    /// saves after a mutation are best-effort.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
