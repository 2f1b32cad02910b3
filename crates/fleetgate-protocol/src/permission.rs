//! Capabilities a user account can be granted.
//!
//! A [`Permission`] is a named privilege. Accounts carry a [`PermissionSet`],
//! sessions carry a copy of it taken at login, and every operation declares
//! the set it requires. Authorization is a plain superset test.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One capability tag.
///
/// The declaration order is the canonical order: when a session lacks
/// several required capabilities, the first missing one in this order is
/// the one reported.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    /// Read plant model, vehicle and order data; receive events.
    ReadData,
    /// Change kernel configuration entries.
    ChangeConfiguration,
    /// Edit the plant model.
    ModifyModel,
    /// Load or replace the plant model.
    LoadModel,
    /// Switch the kernel between operating modes.
    ChangeKernelState,
    /// Create, edit and remove user accounts.
    ManageUsers,
    /// Create and withdraw transport orders.
    ModifyOrder,
    /// Change vehicle state, including withdrawing a vehicle's order.
    ModifyVehicles,
    /// Publish operator messages.
    PublishMessages,
}

impl Permission {
    /// Every permission, in canonical order.
    pub const ALL: [Permission; 9] = [
        Permission::ReadData,
        Permission::ChangeConfiguration,
        Permission::ModifyModel,
        Permission::LoadModel,
        Permission::ChangeKernelState,
        Permission::ManageUsers,
        Permission::ModifyOrder,
        Permission::ModifyVehicles,
        Permission::PublishMessages,
    ];

    /// The wire name, e.g. `"MANAGE_USERS"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadData => "READ_DATA",
            Self::ChangeConfiguration => "CHANGE_CONFIGURATION",
            Self::ModifyModel => "MODIFY_MODEL",
            Self::LoadModel => "LOAD_MODEL",
            Self::ChangeKernelState => "CHANGE_KERNEL_STATE",
            Self::ManageUsers => "MANAGE_USERS",
            Self::ModifyOrder => "MODIFY_ORDER",
            Self::ModifyVehicles => "MODIFY_VEHICLES",
            Self::PublishMessages => "PUBLISH_MESSAGES",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered set of [`Permission`]s.
///
/// Serialized as a plain JSON array: `["READ_DATA", "MODIFY_ORDER"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    /// The empty set.
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Every permission. Granted to the bootstrap account.
    pub fn all() -> Self {
        Permission::ALL.into_iter().collect()
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    /// Adds a permission. Returns `false` if it was already present.
    pub fn insert(&mut self, permission: Permission) -> bool {
        self.0.insert(permission)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    /// Returns the first permission in `required` that this set lacks,
    /// or `None` if this set covers all of `required`.
    pub fn first_missing(&self, required: &PermissionSet) -> Option<Permission> {
        required.iter().find(|p| !self.contains(*p))
    }

    /// `true` if this set is a superset of `required`.
    pub fn covers(&self, required: &PermissionSet) -> bool {
        self.first_missing(required).is_none()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Permission; N]> for PermissionSet {
    fn from(permissions: [Permission; N]) -> Self {
        permissions.into_iter().collect()
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, p) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(p.as_str())?;
        }
        f.write_str("}")
    }
}
