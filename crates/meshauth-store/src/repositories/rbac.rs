//! Role, permission, and relation-table persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use meshauth_core::result::AppResult;
use meshauth_core::types::{PermissionId, RoleId, UserId};
use meshauth_entity::rbac::{Permission, Role};

/// Store of roles, permissions, and the role/permission and user/role
/// relation tables. Relation mutations are idempotent and report whether
/// they changed anything.
#[async_trait]
pub trait RbacRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a role. A taken name is a `Conflict`.
    async fn create_role(&self, role: Role) -> AppResult<()>;

    /// Insert a permission. A taken name is a `Conflict`.
    async fn create_permission(&self, permission: Permission) -> AppResult<()>;

    /// Find a role by ID.
    async fn find_role(&self, id: RoleId) -> AppResult<Option<Role>>;

    /// Find a role by name.
    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>>;

    /// Find a permission by ID.
    async fn find_permission(&self, id: PermissionId) -> AppResult<Option<Permission>>;

    /// Add a role → permission row.
    async fn assign_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Remove a role → permission row.
    async fn revoke_permission(&self, role_id: RoleId, permission_id: PermissionId)
    -> AppResult<bool>;

    /// Add a user → role row.
    async fn assign_role(&self, user_id: UserId, role_id: RoleId, now: DateTime<Utc>)
    -> AppResult<bool>;

    /// Remove a user → role row.
    async fn remove_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<bool>;

    /// Roles held by a user.
    async fn roles_for_user(&self, user_id: UserId) -> AppResult<Vec<RoleId>>;

    /// Permissions granted to any of the given roles, deduplicated.
    async fn permissions_for_roles(&self, role_ids: &[RoleId]) -> AppResult<Vec<Permission>>;
}
