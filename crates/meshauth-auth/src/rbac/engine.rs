//! RBAC engine: permission closures with a generation-tagged cache.
//!
//! A user's closure is the union of the permissions of every role the user
//! holds. Closures are cached per user together with the generation they were
//! computed at. Every mutation bumps the generation, and a cached closure
//! from an older generation is recomputed instead of served.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, info};

use meshauth_core::config::RbacConfig;
use meshauth_core::error::AppError;
use meshauth_core::result::AppResult;
use meshauth_core::traits::Clock;
use meshauth_core::types::{PermissionId, RoleId, UserId};
use meshauth_entity::rbac::{Permission, PermissionKey, Role};
use meshauth_store::{RbacRepository, bounded};

#[derive(Debug, Clone)]
struct CachedClosure {
    generation: u64,
    permissions: Arc<Vec<Permission>>,
}

/// Answers permission checks and maintains the role/permission tables.
#[derive(Clone)]
pub struct RbacEngine {
    store: Arc<dyn RbacRepository>,
    clock: Arc<dyn Clock>,
    cache: Cache<UserId, CachedClosure>,
    generation: Arc<AtomicU64>,
    store_timeout: Duration,
}

impl std::fmt::Debug for RbacEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RbacEngine")
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .field("cached_users", &self.cache.entry_count())
            .finish()
    }
}

impl RbacEngine {
    /// Creates an engine.
    pub fn new(
        store: Arc<dyn RbacRepository>,
        clock: Arc<dyn Clock>,
        config: &RbacConfig,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            cache: Cache::builder()
                .max_capacity(config.closure_cache_capacity)
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
            store_timeout,
        }
    }

    async fn closure(&self, user_id: UserId) -> AppResult<Arc<Vec<Permission>>> {
        let generation = self.generation.load(Ordering::SeqCst);
        if let Some(cached) = self.cache.get(&user_id).await {
            if cached.generation == generation {
                return Ok(cached.permissions);
            }
        }

        let roles = bounded(self.store_timeout, self.store.roles_for_user(user_id)).await?;
        let mut permissions =
            bounded(self.store_timeout, self.store.permissions_for_roles(&roles)).await?;
        permissions.sort_by(|a, b| a.key().cmp(&b.key()).then_with(|| a.id.cmp(&b.id)));
        let permissions = Arc::new(permissions);

        // A mutation that landed while computing makes this result stale.
        if self.generation.load(Ordering::SeqCst) == generation {
            self.cache
                .insert(
                    user_id,
                    CachedClosure {
                        generation,
                        permissions: permissions.clone(),
                    },
                )
                .await;
        }
        debug!(user_id = %user_id, count = permissions.len(), "Computed permission closure");
        Ok(permissions)
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// The `(resource, action)` pairs granted to a user.
    pub async fn get_permissions(&self, user_id: UserId) -> AppResult<BTreeSet<PermissionKey>> {
        Ok(self
            .closure(user_id)
            .await?
            .iter()
            .map(Permission::key)
            .collect())
    }

    /// The full permission records granted to a user, ordered by key.
    pub async fn list_permissions(&self, user_id: UserId) -> AppResult<Vec<Permission>> {
        Ok(self.closure(user_id).await?.as_ref().clone())
    }

    /// Whether the user holds `action` on `resource`.
    pub async fn check(&self, user_id: UserId, resource: &str, action: &str) -> AppResult<bool> {
        Ok(self
            .closure(user_id)
            .await?
            .iter()
            .any(|p| p.resource == resource && p.action == action))
    }

    /// Like [`RbacEngine::check`], failing with `PermissionDenied`.
    pub async fn require(&self, user_id: UserId, resource: &str, action: &str) -> AppResult<()> {
        if self.check(user_id, resource, action).await? {
            Ok(())
        } else {
            Err(AppError::permission_denied(format!(
                "Missing permission '{resource}:{action}'"
            )))
        }
    }

    /// Grants a permission to a role. Both must exist. Repeating acks.
    pub async fn assign(&self, role_id: RoleId, permission_id: PermissionId) -> AppResult<()> {
        bounded(self.store_timeout, self.store.find_role(role_id))
            .await?
            .ok_or_else(|| AppError::not_found(format!("Role {role_id} not found")))?;
        bounded(self.store_timeout, self.store.find_permission(permission_id))
            .await?
            .ok_or_else(|| AppError::not_found(format!("Permission {permission_id} not found")))?;

        let added = bounded(
            self.store_timeout,
            self.store
                .assign_permission(role_id, permission_id, self.clock.now()),
        )
        .await?;
        self.bump();

        if added {
            info!(role_id = %role_id, permission_id = %permission_id, "Permission assigned to role");
        }
        Ok(())
    }

    /// Withdraws a permission from a role. Absent rows ack.
    pub async fn revoke(&self, role_id: RoleId, permission_id: PermissionId) -> AppResult<()> {
        let removed = bounded(
            self.store_timeout,
            self.store.revoke_permission(role_id, permission_id),
        )
        .await?;
        self.bump();

        if removed {
            info!(role_id = %role_id, permission_id = %permission_id, "Permission revoked from role");
        }
        Ok(())
    }

    /// Creates a role.
    pub async fn create_role(&self, name: &str, description: Option<String>) -> AppResult<Role> {
        let role = Role {
            id: RoleId::new(),
            name: name.to_string(),
            description,
            created_at: self.clock.now(),
        };
        bounded(self.store_timeout, self.store.create_role(role.clone())).await?;
        info!(role_id = %role.id, name = %role.name, "Role created");
        Ok(role)
    }

    /// Creates a permission on `action` against `resource`.
    pub async fn create_permission(
        &self,
        name: &str,
        resource: &str,
        action: &str,
        description: Option<String>,
    ) -> AppResult<Permission> {
        let permission = Permission {
            id: PermissionId::new(),
            name: name.to_string(),
            description,
            resource: resource.to_string(),
            action: action.to_string(),
            created_at: self.clock.now(),
        };
        bounded(
            self.store_timeout,
            self.store.create_permission(permission.clone()),
        )
        .await?;
        info!(permission_id = %permission.id, key = %permission.key(), "Permission created");
        Ok(permission)
    }

    /// Finds a role by name.
    pub async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        bounded(self.store_timeout, self.store.find_role_by_name(name)).await
    }

    /// Grants a role to a user. The role must exist.
    pub async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<()> {
        bounded(self.store_timeout, self.store.find_role(role_id))
            .await?
            .ok_or_else(|| AppError::not_found(format!("Role {role_id} not found")))?;
        bounded(
            self.store_timeout,
            self.store.assign_role(user_id, role_id, self.clock.now()),
        )
        .await?;
        self.bump();
        Ok(())
    }

    /// Takes a role away from a user.
    pub async fn remove_role(&self, user_id: UserId, role_id: RoleId) -> AppResult<()> {
        bounded(self.store_timeout, self.store.remove_role(user_id, role_id)).await?;
        self.bump();
        Ok(())
    }
}
