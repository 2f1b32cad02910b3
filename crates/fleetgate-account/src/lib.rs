//! User accounts for fleetgate.
//!
//! - [`UserAccount`]: name, password and granted
//!   [`PermissionSet`](fleetgate_protocol::PermissionSet)
//! - [`AccountStore`]: the in-memory directory, with credential checks and
//!   the account-management mutations
//! - [`AccountPersister`]: how the directory survives restarts
//!   ([`JsonFileAccountPersister`], [`MemoryAccountPersister`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Gateway (above)   ← login verifies here, createUser/setPassword/... mutate here
//!     ↕
//! Account Layer (this crate)
//!     ↕
//! Persister (below) ← accounts.json, or memory
//! ```

mod account;
mod error;
mod persist;
mod store;

pub use account::UserAccount;
pub use error::{AccountError, PersistenceError};
pub use persist::{AccountPersister, JsonFileAccountPersister, MemoryAccountPersister};
pub use store::{AccountStore, BOOTSTRAP_PASSWORD, BOOTSTRAP_USER};
