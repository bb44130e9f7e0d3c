//! In-memory profile store.

use async_trait::async_trait;
use dashmap::DashMap;

use meshauth_core::result::AppResult;
use meshauth_core::types::UserId;
use meshauth_entity::user::UserProfile;

use crate::repositories::ProfileRepository;

/// Profiles keyed by user ID.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: DashMap<UserId, UserProfile>,
}

impl MemoryProfileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileRepository for MemoryProfileStore {
    async fn upsert(&self, profile: UserProfile) -> AppResult<()> {
        self.profiles.insert(profile.user_id, profile);
        Ok(())
    }

    async fn find(&self, user_id: UserId) -> AppResult<Option<UserProfile>> {
        Ok(self.profiles.get(&user_id).map(|p| p.value().clone()))
    }

    async fn delete(&self, user_id: UserId) -> AppResult<bool> {
        Ok(self.profiles.remove(&user_id).is_some())
    }
}
