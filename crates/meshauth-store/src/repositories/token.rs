//! Access/refresh token record persistence.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use meshauth_core::result::AppResult;
use meshauth_core::types::{SessionId, TokenId, UserId};
use meshauth_entity::token::{RevocationReason, TokenRecord};

/// Result of the atomic refresh-token test-and-set.
#[derive(Debug, Clone)]
pub enum ConsumeOutcome {
    /// This call revoked the record. Carries the record as it was before.
    Consumed(TokenRecord),
    /// The record was already revoked. Carries the current record.
    AlreadyRevoked(TokenRecord),
    /// No record with that ID.
    NotFound,
}

/// Store of issued token records keyed by `jti`.
#[async_trait]
pub trait TokenRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a record.
    async fn insert(&self, record: TokenRecord) -> AppResult<()>;

    /// Find a record by `jti`.
    async fn find(&self, id: TokenId) -> AppResult<Option<TokenRecord>>;

    /// Revoke the record with reason `Rotated` and link it to its
    /// replacement, if and only if it is not revoked yet.
    async fn consume_refresh(
        &self,
        id: TokenId,
        replaced_by: TokenId,
        now: DateTime<Utc>,
    ) -> AppResult<ConsumeOutcome>;

    /// Revoke one record. The first revocation wins. Returns the record, or
    /// `None` when unknown.
    async fn revoke(
        &self,
        id: TokenId,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> AppResult<Option<TokenRecord>>;

    /// Revoke every unrevoked record of a session. Returns the count.
    async fn revoke_for_session(
        &self,
        session_id: SessionId,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Revoke every unrevoked record of a user. Returns the count.
    async fn revoke_for_user(
        &self,
        user_id: UserId,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Delete records past expiry. Revoked records are additionally kept
    /// until `retention` after revocation. Returns the number deleted.
    async fn delete_expired(&self, now: DateTime<Utc>, retention: Duration) -> AppResult<u64>;

    /// Number of unrevoked, unexpired records.
    async fn count_active(&self, now: DateTime<Utc>) -> AppResult<u64>;

    /// Number of revoked records still held.
    async fn count_revoked(&self) -> AppResult<u64>;
}
