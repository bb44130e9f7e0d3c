//! Session persistence.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use meshauth_core::result::AppResult;
use meshauth_core::types::{SessionId, UserId};
use meshauth_entity::session::Session;

/// Store of sessions with a per-user index.
///
/// `create` and `revoke_all_for_user` are serialized per user: a session
/// created concurrently with a revoke-all is either revoked by it or inserted
/// after it completes.
#[async_trait]
pub trait SessionRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a new session.
    async fn create(&self, session: Session) -> AppResult<()>;

    /// Find a session by ID, in any state.
    async fn find(&self, id: SessionId) -> AppResult<Option<Session>>;

    /// All sessions of a user, in any state, in no particular order.
    async fn list_for_user(&self, user_id: UserId) -> AppResult<Vec<Session>>;

    /// Stamp `last_active_at` on an active session.
    ///
    /// Fails with `SessionNotFound`, `TokenRevoked` or `TokenExpired`. A touch
    /// never clears a revocation.
    async fn touch(&self, id: SessionId, now: DateTime<Utc>) -> AppResult<Session>;

    /// Revoke one session. The first revocation wins; later calls leave the
    /// record untouched. Returns the record and whether this call revoked it.
    async fn revoke(
        &self,
        id: SessionId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> AppResult<(Session, bool)>;

    /// Revoke every unrevoked session of a user. Returns the sessions this
    /// call revoked.
    async fn revoke_all_for_user(
        &self,
        user_id: UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Session>>;

    /// Delete sessions past expiry. Revoked sessions are additionally kept
    /// until `retention` after revocation. Returns the number deleted.
    async fn delete_expired(&self, now: DateTime<Utc>, retention: Duration) -> AppResult<u64>;

    /// Number of active sessions at `now`.
    async fn count_active(&self, now: DateTime<Utc>) -> AppResult<u64>;
}
