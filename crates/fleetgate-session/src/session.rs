//! The session record.

use std::sync::Arc;

use fleetgate_protocol::{PermissionSet, SessionToken};

use crate::EventBuffer;

/// One logged-in client.
///
/// Created by `login`, destroyed by `logout` or by the reaper. The
/// permission set is a copy taken at login: editing the account afterwards
/// does not change what an open session may do.
#[derive(Debug)]
pub struct Session {
    pub(crate) token: SessionToken,
    pub(crate) user_name: String,
    pub(crate) permissions: PermissionSet,
    pub(crate) buffer: Arc<EventBuffer>,
    /// Set by every authorized call, cleared by the reaper.
    pub(crate) alive: bool,
}

impl Session {
    pub(crate) fn new(token: SessionToken, user_name: String, permissions: PermissionSet) -> Self {
        Self {
            token,
            user_name,
            permissions,
            buffer: Arc::new(EventBuffer::new()),
            alive: true,
        }
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    /// The session's event buffer. Clone the `Arc` to wait on it without
    /// holding the registry lock.
    pub fn buffer(&self) -> &Arc<EventBuffer> {
        &self.buffer
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

/// A session removed by the reaper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictedSession {
    pub token: SessionToken,
    pub user_name: String,
}
