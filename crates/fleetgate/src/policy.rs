//! Permission requirements as data.
//!
//! Every routable operation carries a [`Requirement`]. The gateway's own
//! operations get theirs from [`LocalOp::requirement`]; engine operations
//! declare theirs in [`Engine::operations`](crate::Engine::operations).

use std::fmt;

use fleetgate_protocol::{Permission, PermissionSet};

/// What a caller must present to run an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Anyone may call, with or without a valid session.
    Open,
    /// The operation declared nothing. Allowed, but logged as a warning so
    /// the gap gets noticed.
    Undeclared,
    /// A valid session whose permissions cover the set. An empty set means
    /// "any logged-in session".
    Session(PermissionSet),
}

impl Requirement {
    /// Any valid session.
    pub fn session() -> Self {
        Self::Session(PermissionSet::new())
    }

    /// A valid session holding every permission in `permissions`.
    pub fn permissions<const N: usize>(permissions: [Permission; N]) -> Self {
        Self::Session(PermissionSet::from(permissions))
    }
}

/// The operations the gateway implements itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalOp {
    Login,
    Logout,
    GetPermissions,
    CreateUser,
    SetPassword,
    SetPermissions,
    RemoveUser,
    SetEventFilter,
    PollEvents,
}

impl LocalOp {
    pub const ALL: [LocalOp; 9] = [
        LocalOp::Login,
        LocalOp::Logout,
        LocalOp::GetPermissions,
        LocalOp::CreateUser,
        LocalOp::SetPassword,
        LocalOp::SetPermissions,
        LocalOp::RemoveUser,
        LocalOp::SetEventFilter,
        LocalOp::PollEvents,
    ];

    /// The name clients call it by.
    pub fn name(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::GetPermissions => "getPermissions",
            Self::CreateUser => "createUser",
            Self::SetPassword => "setPassword",
            Self::SetPermissions => "setPermissions",
            Self::RemoveUser => "removeUser",
            Self::SetEventFilter => "setEventFilter",
            Self::PollEvents => "pollEvents",
        }
    }

    /// The static requirement table.
    ///
    /// `logout` and `getPermissions` are open so that a client holding a
    /// stale token can still call them: logout is idempotent and
    /// getPermissions answers with an empty set. `setPassword` only needs
    /// a session here; changing someone else's password additionally
    /// needs [`Permission::ManageUsers`], checked by the handler.
    pub fn requirement(self) -> Requirement {
        match self {
            Self::Login | Self::Logout | Self::GetPermissions => Requirement::Open,
            Self::CreateUser | Self::SetPermissions | Self::RemoveUser => {
                Requirement::permissions([Permission::ManageUsers])
            }
            Self::SetPassword | Self::SetEventFilter | Self::PollEvents => Requirement::session(),
        }
    }
}

impl fmt::Display for LocalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
