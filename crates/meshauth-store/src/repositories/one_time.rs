//! Password-reset and email-verification token persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use meshauth_core::result::AppResult;
use meshauth_core::types::UserId;
use meshauth_entity::token::{OneTimeToken, TokenPurpose};

/// Store of one-time tokens keyed by the hash of their value.
#[async_trait]
pub trait OneTimeTokenRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a token.
    async fn insert(&self, token: OneTimeToken) -> AppResult<()>;

    /// Redeem a token in one atomic step.
    ///
    /// Fails with `TokenNotFound` (unknown hash or other purpose),
    /// `AlreadyUsed`, or `TokenExpired`. On success the token is marked used
    /// and returned.
    async fn consume(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
    ) -> AppResult<OneTimeToken>;

    /// Undo a redemption made at `used_at`, leaving the token redeemable
    /// again. A token since invalidated at another instant is left alone.
    /// Returns whether the token was released.
    async fn release(&self, token_hash: &str, used_at: DateTime<Utc>) -> AppResult<bool>;

    /// Mark every unused token of the user for `purpose` as used. Returns the
    /// count.
    async fn invalidate_for_user(
        &self,
        user_id: UserId,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Delete tokens past expiry. Returns the number deleted.
    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;
}
