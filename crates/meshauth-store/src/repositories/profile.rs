//! User profile persistence.

use async_trait::async_trait;

use meshauth_core::result::AppResult;
use meshauth_core::types::UserId;
use meshauth_entity::user::UserProfile;

/// Store of user profiles owned by the identity side.
#[async_trait]
pub trait ProfileRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Insert or replace a profile.
    async fn upsert(&self, profile: UserProfile) -> AppResult<()>;

    /// Find a profile by user ID.
    async fn find(&self, user_id: UserId) -> AppResult<Option<UserProfile>>;

    /// Remove a profile. Returns whether one existed.
    async fn delete(&self, user_id: UserId) -> AppResult<bool>;
}
