//! Session manager: create, list, touch, revoke.
//!
//! Revocation cascades to the token service so that a revoked session's
//! access tokens stop validating and its refresh tokens stop rotating.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use meshauth_core::config::SessionConfig;
use meshauth_core::error::AppError;
use meshauth_core::result::AppResult;
use meshauth_core::traits::Clock;
use meshauth_core::types::{SessionId, UserId};
use meshauth_entity::session::{DeviceInfo, Session};
use meshauth_entity::token::RevocationReason;
use meshauth_store::{SessionRepository, bounded};

use crate::token::TokenService;

/// Manages session records and cascades revocations to tokens.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<dyn SessionRepository>,
    token_service: Arc<TokenService>,
    clock: Arc<dyn Clock>,
    absolute_ttl: chrono::Duration,
    store_timeout: Duration,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("absolute_ttl", &self.absolute_ttl)
            .finish()
    }
}

impl SessionManager {
    /// Creates a session manager.
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        token_service: Arc<TokenService>,
        clock: Arc<dyn Clock>,
        config: &SessionConfig,
        store_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            token_service,
            clock,
            absolute_ttl: chrono::Duration::hours(config.absolute_ttl_hours as i64),
            store_timeout,
        }
    }

    /// Opens a new session for `user_id`.
    pub async fn create(&self, user_id: UserId, device: DeviceInfo) -> AppResult<Session> {
        let now = self.clock.now();
        let session = Session {
            id: SessionId::new(),
            user_id,
            device,
            created_at: now,
            last_active_at: now,
            expires_at: now + self.absolute_ttl,
            revoked_at: None,
            revoked_reason: None,
        };
        bounded(self.store_timeout, self.sessions.create(session.clone())).await?;

        info!(user_id = %user_id, session_id = %session.id, "Session created");
        Ok(session)
    }

    /// Finds a session in any state.
    pub async fn find(&self, session_id: SessionId) -> AppResult<Session> {
        bounded(self.store_timeout, self.sessions.find(session_id))
            .await?
            .ok_or_else(|| AppError::session_not_found(format!("Session {session_id} not found")))
    }

    /// Active sessions of a user, most recently active first. Ties fall back
    /// to creation time, then ID.
    pub async fn list(&self, user_id: UserId) -> AppResult<Vec<Session>> {
        let now = self.clock.now();
        let mut sessions: Vec<Session> =
            bounded(self.store_timeout, self.sessions.list_for_user(user_id))
                .await?
                .into_iter()
                .filter(|s| s.is_active(now))
                .collect();

        sessions.sort_by(|a, b| {
            b.last_active_at
                .cmp(&a.last_active_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(sessions)
    }

    /// The user's most recently active session, if any.
    pub async fn most_recent(&self, user_id: UserId) -> AppResult<Option<Session>> {
        Ok(self.list(user_id).await?.into_iter().next())
    }

    /// Records activity on an active session.
    pub async fn touch(&self, session_id: SessionId) -> AppResult<Session> {
        bounded(
            self.store_timeout,
            self.sessions.touch(session_id, self.clock.now()),
        )
        .await
    }

    /// Revokes one session and its tokens. Repeating the call succeeds and
    /// re-applies the token cascade, so a cascade cut short by a store
    /// failure completes on retry.
    pub async fn revoke(&self, session_id: SessionId, reason: &str) -> AppResult<Session> {
        let (session, newly_revoked) = bounded(
            self.store_timeout,
            self.sessions.revoke(session_id, reason, self.clock.now()),
        )
        .await?;

        let tokens = self.token_service.revoke_session_tokens(&session).await?;
        if newly_revoked {
            info!(
                user_id = %session.user_id,
                session_id = %session_id,
                reason,
                tokens,
                "Session revoked"
            );
        } else {
            debug!(session_id = %session_id, tokens, "Session already revoked");
        }
        Ok(session)
    }

    /// Revokes every session of a user and all their tokens. Returns the
    /// number of sessions revoked by this call.
    pub async fn revoke_all(&self, user_id: UserId) -> AppResult<u64> {
        self.token_service
            .revoke_all_for_user(user_id, RevocationReason::UserRevoked)
            .await
    }

    /// Deletes sessions past expiry and retention.
    pub async fn sweep_expired(&self, retention: chrono::Duration) -> AppResult<u64> {
        bounded(
            self.store_timeout,
            self.sessions.delete_expired(self.clock.now(), retention),
        )
        .await
    }

    /// Number of active sessions.
    pub async fn count_active(&self) -> AppResult<u64> {
        bounded(
            self.store_timeout,
            self.sessions.count_active(self.clock.now()),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use meshauth_core::ErrorKind;
    use meshauth_core::config::AuthConfig;
    use meshauth_core::traits::ManualClock;
    use meshauth_core::types::TokenId;
    use meshauth_entity::token::TokenRecord;
    use meshauth_store::memory::{MemoryDenylist, MemorySessionStore, MemoryTokenStore};
    use meshauth_store::{ConsumeOutcome, DenylistRepository, TokenRepository};

    /// Fails the next `n` calls of one operation with a transient error.
    #[derive(Debug, Default)]
    struct FailNext(AtomicU32);

    impl FailNext {
        fn arm(&self, n: u32) {
            self.0.store(n, Ordering::SeqCst);
        }

        fn check(&self, op: &str) -> AppResult<()> {
            let tripped = self
                .0
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if tripped {
                return Err(AppError::transient(format!("{op} timed out")));
            }
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct FlakyTokens {
        inner: MemoryTokenStore,
        revoke_for_session: FailNext,
    }

    #[async_trait]
    impl TokenRepository for FlakyTokens {
        async fn insert(&self, record: TokenRecord) -> AppResult<()> {
            self.inner.insert(record).await
        }

        async fn find(&self, id: TokenId) -> AppResult<Option<TokenRecord>> {
            self.inner.find(id).await
        }

        async fn consume_refresh(
            &self,
            id: TokenId,
            replaced_by: TokenId,
            now: DateTime<Utc>,
        ) -> AppResult<ConsumeOutcome> {
            self.inner.consume_refresh(id, replaced_by, now).await
        }

        async fn revoke(
            &self,
            id: TokenId,
            reason: RevocationReason,
            now: DateTime<Utc>,
        ) -> AppResult<Option<TokenRecord>> {
            self.inner.revoke(id, reason, now).await
        }

        async fn revoke_for_session(
            &self,
            session_id: SessionId,
            reason: RevocationReason,
            now: DateTime<Utc>,
        ) -> AppResult<u64> {
            self.revoke_for_session.check("revoke_for_session")?;
            self.inner.revoke_for_session(session_id, reason, now).await
        }

        async fn revoke_for_user(
            &self,
            user_id: UserId,
            reason: RevocationReason,
            now: DateTime<Utc>,
        ) -> AppResult<u64> {
            self.inner.revoke_for_user(user_id, reason, now).await
        }

        async fn delete_expired(
            &self,
            now: DateTime<Utc>,
            retention: chrono::Duration,
        ) -> AppResult<u64> {
            self.inner.delete_expired(now, retention).await
        }

        async fn count_active(&self, now: DateTime<Utc>) -> AppResult<u64> {
            self.inner.count_active(now).await
        }

        async fn count_revoked(&self) -> AppResult<u64> {
            self.inner.count_revoked().await
        }
    }

    #[derive(Debug, Default)]
    struct FlakyDenylist {
        inner: MemoryDenylist,
        deny_session: FailNext,
    }

    #[async_trait]
    impl DenylistRepository for FlakyDenylist {
        async fn deny_token(&self, jti: TokenId, until: DateTime<Utc>) -> AppResult<()> {
            self.inner.deny_token(jti, until).await
        }

        async fn deny_session(&self, session_id: SessionId, until: DateTime<Utc>) -> AppResult<()> {
            self.deny_session.check("deny_session")?;
            self.inner.deny_session(session_id, until).await
        }

        async fn is_token_denied(&self, jti: TokenId, now: DateTime<Utc>) -> AppResult<bool> {
            self.inner.is_token_denied(jti, now).await
        }

        async fn is_session_denied(
            &self,
            session_id: SessionId,
            now: DateTime<Utc>,
        ) -> AppResult<bool> {
            self.inner.is_session_denied(session_id, now).await
        }

        async fn purge(&self, now: DateTime<Utc>) -> AppResult<u64> {
            self.inner.purge(now).await
        }
    }

    struct Fixture {
        manager: SessionManager,
        tokens: Arc<TokenService>,
        token_store: Arc<FlakyTokens>,
        denylist: Arc<FlakyDenylist>,
    }

    fn fixture(clock: Arc<ManualClock>) -> Fixture {
        let sessions = Arc::new(MemorySessionStore::new());
        let token_store = Arc::new(FlakyTokens::default());
        let denylist = Arc::new(FlakyDenylist::default());
        let timeout = Duration::from_secs(2);
        let tokens = Arc::new(TokenService::new(
            token_store.clone(),
            denylist.clone(),
            sessions.clone(),
            clock.clone(),
            &AuthConfig::default(),
            timeout,
        ));
        let manager = SessionManager::new(
            sessions,
            tokens.clone(),
            clock,
            &SessionConfig::default(),
            timeout,
        );
        Fixture {
            manager,
            tokens,
            token_store,
            denylist,
        }
    }

    fn manager(clock: Arc<ManualClock>) -> SessionManager {
        fixture(clock).manager
    }

    #[tokio::test]
    async fn test_list_orders_by_activity() {
        let clock = Arc::new(ManualClock::starting_now());
        let mgr = manager(clock.clone());
        let user = UserId::new();

        let a = mgr.create(user, DeviceInfo::default()).await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
        let b = mgr.create(user, DeviceInfo::default()).await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
        mgr.touch(a.id).await.unwrap();

        let listed: Vec<SessionId> = mgr.list(user).await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(listed, vec![a.id, b.id]);

        mgr.revoke(a.id, "logout").await.unwrap();
        let listed: Vec<SessionId> = mgr.list(user).await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(listed, vec![b.id]);
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let clock = Arc::new(ManualClock::starting_now());
        let mgr = manager(clock.clone());
        let s = mgr.create(UserId::new(), DeviceInfo::default()).await.unwrap();

        let first = mgr.revoke(s.id, "logout").await.unwrap();
        clock.advance(chrono::Duration::seconds(5));
        let second = mgr.revoke(s.id, "admin").await.unwrap();
        assert_eq!(first.revoked_at, second.revoked_at);
        assert_eq!(second.revoked_reason.as_deref(), Some("logout"));

        let err = mgr.revoke(SessionId::new(), "logout").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::SessionNotFound);
    }

    #[tokio::test]
    async fn test_expired_session_cannot_be_touched() {
        let clock = Arc::new(ManualClock::starting_now());
        let mgr = manager(clock.clone());
        let s = mgr.create(UserId::new(), DeviceInfo::default()).await.unwrap();

        clock.advance(chrono::Duration::hours(169));
        let err = mgr.touch(s.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenExpired);
        assert_eq!(mgr.count_active().await.unwrap(), 0);
        assert_eq!(mgr.sweep_expired(chrono::Duration::hours(24)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_revoke_retry_finishes_token_cascade() {
        let f = fixture(Arc::new(ManualClock::starting_now()));
        let user = UserId::new();
        let s = f.manager.create(user, DeviceInfo::default()).await.unwrap();
        let pair = f.tokens.issue_pair(user, "ruth", &s).await.unwrap();

        f.token_store.revoke_for_session.arm(1);
        let err = f.manager.revoke(s.id, "logout").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TransientStoreFailure);
        assert!(err.is_retryable());

        f.manager.revoke(s.id, "logout").await.unwrap();
        let err = f.tokens.validate_access(&pair.access_token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenRevoked);
        assert_eq!(f.tokens.count_active().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_revoke_retry_after_denylist_failure() {
        let f = fixture(Arc::new(ManualClock::starting_now()));
        let user = UserId::new();
        let s = f.manager.create(user, DeviceInfo::default()).await.unwrap();
        let pair = f.tokens.issue_pair(user, "rhea", &s).await.unwrap();

        f.denylist.deny_session.arm(1);
        assert!(f.manager.revoke(s.id, "logout").await.is_err());

        f.manager.revoke(s.id, "logout").await.unwrap();
        let err = f.tokens.validate_access(&pair.access_token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenRevoked);
    }

    #[tokio::test]
    async fn test_revoke_all_retry_denies_sessions_revoked_earlier() {
        let f = fixture(Arc::new(ManualClock::starting_now()));
        let user = UserId::new();
        let a = f.manager.create(user, DeviceInfo::default()).await.unwrap();
        let b = f.manager.create(user, DeviceInfo::default()).await.unwrap();
        let pair_a = f.tokens.issue_pair(user, "rosa", &a).await.unwrap();
        let pair_b = f.tokens.issue_pair(user, "rosa", &b).await.unwrap();

        f.denylist.deny_session.arm(1);
        let err = f.manager.revoke_all(user).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TransientStoreFailure);

        // Both sessions were revoked by the failed call, so the retry revokes none.
        assert_eq!(f.manager.revoke_all(user).await.unwrap(), 0);
        for pair in [&pair_a, &pair_b] {
            let err = f.tokens.validate_access(&pair.access_token).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::TokenRevoked);
        }
    }
}
