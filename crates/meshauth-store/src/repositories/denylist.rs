//! Revocation denylist consulted by access-token validation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use meshauth_core::result::AppResult;
use meshauth_core::types::{SessionId, TokenId};

/// Time-bounded denylist of access-token IDs and session IDs.
#[async_trait]
pub trait DenylistRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Deny a `jti` until `until`. An existing later deadline is kept.
    async fn deny_token(&self, jti: TokenId, until: DateTime<Utc>) -> AppResult<()>;

    /// Deny every token carrying `sid` until `until`. An existing later
    /// deadline is kept.
    async fn deny_session(&self, session_id: SessionId, until: DateTime<Utc>) -> AppResult<()>;

    /// Whether the `jti` is denied at `now`.
    async fn is_token_denied(&self, jti: TokenId, now: DateTime<Utc>) -> AppResult<bool>;

    /// Whether the session is denied at `now`.
    async fn is_session_denied(&self, session_id: SessionId, now: DateTime<Utc>)
    -> AppResult<bool>;

    /// Remove lapsed entries. Returns the number removed.
    async fn purge(&self, now: DateTime<Utc>) -> AppResult<u64>;
}
