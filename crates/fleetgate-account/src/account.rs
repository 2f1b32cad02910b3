//! The user account record.

use std::fmt;

use fleetgate_protocol::PermissionSet;
use serde::{Deserialize, Serialize};

/// One user: a unique name, an opaque password and the permissions granted.
///
/// This is also the persisted shape, one JSON object per account:
///
/// ```text
/// {"user_name":"guest","password":"guest-password","permissions":["READ_DATA", ...]}
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_name: String,
    pub password: String,
    #[serde(default)]
    pub permissions: PermissionSet,
}

impl UserAccount {
    pub fn new(
        user_name: impl Into<String>,
        password: impl Into<String>,
        permissions: PermissionSet,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            password: password.into(),
            permissions,
        }
    }
}

// Hand-written so passwords never reach a log line through `{:?}`.
impl fmt::Debug for UserAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserAccount")
            .field("user_name", &self.user_name)
            .field("password", &"<redacted>")
            .field("permissions", &self.permissions)
            .finish()
    }
}
