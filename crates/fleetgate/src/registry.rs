//! Name registry the gateway publishes its address in.
//!
//! Clients find a running gateway by looking up [`REGISTRATION_NAME`]. The
//! server binds that name to its listening address once it is accepting
//! connections, and unbinds it on shutdown.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};

/// The name the gateway registers under.
pub const REGISTRATION_NAME: &str = "fleetgate/remote-kernel";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry has no entry named {0:?}")]
    NotBound(String),

    /// The registry could not be reached or refused the request.
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// A name → address directory.
pub trait Registry: Send + Sync + 'static {
    /// Binds `name` to `addr`, replacing any previous binding.
    fn bind(&self, name: &str, addr: SocketAddr) -> Result<(), RegistryError>;

    /// # Errors
    /// [`RegistryError::NotBound`] if nothing is bound under `name`.
    fn unbind(&self, name: &str) -> Result<(), RegistryError>;

    fn lookup(&self, name: &str) -> Option<SocketAddr>;
}

/// A registry living in this process.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    entries: Mutex<HashMap<String, SocketAddr>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Registry for InMemoryRegistry {
    fn bind(&self, name: &str, addr: SocketAddr) -> Result<(), RegistryError> {
        let previous = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), addr);
        if let Some(previous) = previous {
            tracing::debug!(name, %previous, "replacing registry binding");
        }
        tracing::debug!(name, %addr, "registry binding added");
        Ok(())
    }

    fn unbind(&self, name: &str) -> Result<(), RegistryError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotBound(name.to_string()))
    }

    fn lookup(&self, name: &str) -> Option<SocketAddr> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_bind_then_lookup() {
        let reg = InMemoryRegistry::new();
        reg.bind(REGISTRATION_NAME, addr(1099)).unwrap();
        assert_eq!(reg.lookup(REGISTRATION_NAME), Some(addr(1099)));
    }

    #[test]
    fn test_bind_replaces_previous() {
        let reg = InMemoryRegistry::new();
        reg.bind("k", addr(1)).unwrap();
        reg.bind("k", addr(2)).unwrap();
        assert_eq!(reg.lookup("k"), Some(addr(2)));
    }

    #[test]
    fn test_unbind_missing_name_errors() {
        let reg = InMemoryRegistry::new();
        assert!(matches!(reg.unbind("k"), Err(RegistryError::NotBound(_))));
    }

    #[test]
    fn test_unbind_removes_entry() {
        let reg = InMemoryRegistry::new();
        reg.bind("k", addr(1)).unwrap();
        reg.unbind("k").unwrap();
        assert_eq!(reg.lookup("k"), None);
    }
}
