//! Roles, permissions, and the relation tables between them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meshauth_core::types::{PermissionId, RoleId, UserId};

/// A named role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    /// Unique identifier.
    pub id: RoleId,
    /// Unique name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// When the role was created.
    pub created_at: DateTime<Utc>,
}

/// A permission on one action against one resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    /// Unique identifier.
    pub id: PermissionId,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Resource the permission applies to (e.g. `"incident"`).
    pub resource: String,
    /// Action on the resource (e.g. `"read"`).
    pub action: String,
    /// When the permission was created.
    pub created_at: DateTime<Utc>,
}

impl Permission {
    /// The `(resource, action)` pair this permission grants.
    pub fn key(&self) -> PermissionKey {
        PermissionKey::new(self.resource.clone(), self.action.clone())
    }
}

/// A `(resource, action)` pair, the unit of an access check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionKey {
    /// Resource name.
    pub resource: String,
    /// Action name.
    pub action: String,
}

impl PermissionKey {
    /// Builds a key.
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

/// Row of the role → permission relation table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RolePermission {
    /// Role side.
    pub role_id: RoleId,
    /// Permission side.
    pub permission_id: PermissionId,
    /// When the assignment was made.
    pub created_at: DateTime<Utc>,
}

/// Row of the user → role relation table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRole {
    /// User side.
    pub user_id: UserId,
    /// Role side.
    pub role_id: RoleId,
    /// When the membership was granted.
    pub created_at: DateTime<Utc>,
}
