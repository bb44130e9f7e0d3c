//! In-memory RBAC store.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use meshauth_core::error::AppError;
use meshauth_core::result::AppResult;
use meshauth_core::types::{PermissionId, RoleId, UserId};
use meshauth_entity::rbac::{Permission, Role, RolePermission, UserRole};

use crate::repositories::RbacRepository;

/// Roles, permissions, and relation tables keyed by their composite keys.
#[derive(Debug, Default)]
pub struct MemoryRbacStore {
    roles: DashMap<RoleId, Role>,
    role_names: DashMap<String, RoleId>,
    permissions: DashMap<PermissionId, Permission>,
    permission_names: DashMap<String, PermissionId>,
    role_permissions: DashMap<(RoleId, PermissionId), RolePermission>,
    user_roles: DashMap<(UserId, RoleId), UserRole>,
}

impl MemoryRbacStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RbacRepository for MemoryRbacStore {
    async fn create_role(&self, role: Role) -> AppResult<()> {
        match self.role_names.entry(role.name.clone()) {
            Entry::Occupied(_) => Err(AppError::conflict(format!(
                "Role '{}' already exists",
                role.name
            ))),
            Entry::Vacant(slot) => {
                slot.insert(role.id);
                self.roles.insert(role.id, role);
                Ok(())
            }
        }
    }

    async fn create_permission(&self, permission: Permission) -> AppResult<()> {
        match self.permission_names.entry(permission.name.clone()) {
            Entry::Occupied(_) => Err(AppError::conflict(format!(
                "Permission '{}' already exists",
                permission.name
            ))),
            Entry::Vacant(slot) => {
                slot.insert(permission.id);
                self.permissions.insert(permission.id, permission);
                Ok(())
            }
        }
    }

    async fn find_role(&self, id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.roles.get(&id).map(|r| r.value().clone()))
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        let Some(id) = self.role_names.get(name).map(|id| *id.value()) else {
            return Ok(None);
        };
        self.find_role(id).await
    }

    async fn find_permission(&self, id: PermissionId) -> AppResult<Option<Permission>> {
        Ok(self.permissions.get(&id).map(|p| p.value().clone()))
    }

    async fn assign_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        match self.role_permissions.entry((role_id, permission_id)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(RolePermission {
                    role_id,
                    permission_id,
                    created_at: now,
                });
                Ok(true)
            }
        }
    }

    async fn revoke_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        Ok(self.role_permissions.remove(&(role_id, permission_id)).is_some())
    }

    async fn assign_role(
        &self,
        user_id: UserId,
        role_id: RoleId,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        match self.user_roles.entry((user_id, role_id)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(UserRole {
                    user_id,
                    role_id,
                    created_at: now,
                });
                Ok(true)
            }
        }
    }

    async fn remove_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<bool> {
        Ok(self.user_roles.remove(&(user_id, role_id)).is_some())
    }

    async fn roles_for_user(&self, user_id: UserId) -> AppResult<Vec<RoleId>> {
        Ok(self
            .user_roles
            .iter()
            .filter(|row| row.key().0 == user_id)
            .map(|row| row.key().1)
            .collect())
    }

    async fn permissions_for_roles(&self, role_ids: &[RoleId]) -> AppResult<Vec<Permission>> {
        let wanted: HashSet<RoleId> = role_ids.iter().copied().collect();
        let permission_ids: HashSet<PermissionId> = self
            .role_permissions
            .iter()
            .filter(|row| wanted.contains(&row.key().0))
            .map(|row| row.key().1)
            .collect();

        Ok(permission_ids
            .into_iter()
            .filter_map(|id| self.permissions.get(&id).map(|p| p.value().clone()))
            .collect())
    }
}
