//! The session registry: every open session, keyed by token.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is a plain `HashMap` with no locking of its own. The
//! gateway wraps it in one [`SharedRegistry`] mutex that the request
//! handlers, the broadcaster and the reaper all go through, so a sweep can
//! never interleave with a half-finished call. Each critical section is a
//! lookup or a loop over the map. Long polls clone the session's buffer
//! out and wait after the lock is released.

use std::collections::HashMap;
use std::sync::Arc;

use fleetgate_protocol::{EventFilter, PermissionSet, SessionToken};
use rand::Rng;

use crate::{EventBuffer, EvictedSession, Session, SessionError};

/// The registry behind the lock everyone shares.
pub type SharedRegistry = Arc<tokio::sync::Mutex<SessionRegistry>>;

/// Directory of active sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionToken, Session>,
    /// Tokens issued so far. Part of every token, so no token repeats.
    issued: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new registry already wrapped for sharing.
    pub fn shared() -> SharedRegistry {
        Arc::new(tokio::sync::Mutex::new(Self::new()))
    }

    /// Opens a session for `user_name` with a snapshot of `permissions`.
    ///
    /// The new session is alive and its event buffer refuses everything.
    pub fn create(&mut self, user_name: &str, permissions: PermissionSet) -> SessionToken {
        self.issued += 1;
        let token = generate_token(self.issued);
        self.sessions.insert(
            token.clone(),
            Session::new(token.clone(), user_name.to_string(), permissions),
        );
        tracing::info!(user = user_name, %token, "session created");
        token
    }

    /// Marks the session alive. Returns `false` for an unknown token.
    pub fn touch(&mut self, token: &SessionToken) -> bool {
        match self.sessions.get_mut(token) {
            Some(session) => {
                session.alive = true;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, token: &SessionToken) -> Option<&Session> {
        self.sessions.get(token)
    }

    pub fn contains(&self, token: &SessionToken) -> bool {
        self.sessions.contains_key(token)
    }

    pub fn remove(&mut self, token: &SessionToken) -> Option<Session> {
        let session = self.sessions.remove(token)?;
        tracing::info!(user = %session.user_name, %token, "session closed");
        Some(session)
    }

    /// Calls `f` on every session, in no particular order.
    pub fn for_each(&self, mut f: impl FnMut(&Session)) {
        for session in self.sessions.values() {
            f(session);
        }
    }

    /// Replaces the session's event filter.
    ///
    /// # Errors
    /// [`SessionError::UnknownToken`] if there is no such session.
    pub fn set_filter(
        &self,
        token: &SessionToken,
        filter: EventFilter,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get(token)
            .ok_or_else(|| SessionError::UnknownToken(token.clone()))?;
        tracing::debug!(user = %session.user_name, %token, ?filter, "event filter replaced");
        session.buffer.set_filter(filter);
        Ok(())
    }

    /// The session's event buffer, for waiting on outside the lock.
    pub fn buffer(&self, token: &SessionToken) -> Option<Arc<EventBuffer>> {
        self.sessions.get(token).map(|s| s.buffer.clone())
    }

    /// One aging pass over every session.
    ///
    /// - a session with a blocked `pollEvents` is left untouched
    /// - a live session has its flag cleared
    /// - a session whose flag was already clear is removed
    ///
    /// So an idle session goes on the second consecutive sweep.
    pub fn sweep(&mut self) -> Vec<EvictedSession> {
        let mut evicted = Vec::new();
        self.sessions.retain(|token, session| {
            if session.buffer.has_waiting_consumer() {
                return true;
            }
            if session.alive {
                session.alive = false;
                return true;
            }
            evicted.push(EvictedSession {
                token: token.clone(),
                user_name: session.user_name.clone(),
            });
            false
        });
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Issue counter (16 hex digits) followed by 128 random bits (32 hex digits).
///
/// The counter alone makes tokens unique; the random part makes them
/// unguessable.
fn generate_token(issue: u64) -> SessionToken {
    let bytes: [u8; 16] = rand::rng().random();
    let random: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    SessionToken::new(format!("{issue:016x}{random}"))
}

// =========================================================================
// Tests
// =========================================================================
