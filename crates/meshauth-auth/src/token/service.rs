//! Token service.
//!
//! Access tokens are validated from their signature plus the denylist and
//! never touch the record store. Refresh tokens are store-backed and
//! single-use: rotation revokes the presented record in one atomic step, and
//! a second presentation of a rotated token is treated as theft.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use meshauth_core::config::AuthConfig;
use meshauth_core::error::AppError;
use meshauth_core::result::AppResult;
use meshauth_core::traits::Clock;
use meshauth_core::types::{SessionId, TokenId, UserId};
use meshauth_entity::session::{Session, SessionState};
use meshauth_entity::token::{RevocationReason, TokenKind, TokenRecord};
use meshauth_store::{
    ConsumeOutcome, DenylistRepository, SessionRepository, TokenRepository, bounded,
};

use crate::credential::secret::hash_token;
use crate::jwt::{Claims, EncodedToken, JwtDecoder, JwtEncoder};

/// An access/refresh pair bound to one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived access token.
    pub access_token: String,
    /// Single-use refresh token.
    pub refresh_token: String,
    /// Access token expiry.
    pub access_expires_at: DateTime<Utc>,
    /// Refresh token expiry.
    pub refresh_expires_at: DateTime<Utc>,
    /// Owning session.
    pub session_id: SessionId,
}

/// Outcome of a successful rotation.
#[derive(Debug, Clone)]
pub struct RotatedPair {
    /// The new pair.
    pub tokens: TokenPair,
    /// Owner of the rotated token.
    pub user_id: UserId,
}

/// What a revocation hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokedToken {
    /// Kind of the revoked token.
    pub kind: TokenKind,
    /// Its `jti`.
    pub token_id: TokenId,
    /// Its owner.
    pub user_id: UserId,
    /// Its session.
    pub session_id: SessionId,
}

/// Issues, validates, rotates, and revokes tokens.
#[derive(Clone)]
pub struct TokenService {
    tokens: Arc<dyn TokenRepository>,
    denylist: Arc<dyn DenylistRepository>,
    sessions: Arc<dyn SessionRepository>,
    encoder: JwtEncoder,
    decoder: JwtDecoder,
    clock: Arc<dyn Clock>,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
    store_timeout: Duration,
    issued: Arc<AtomicU64>,
    replays: Arc<AtomicU64>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

/// Session revocation reason recorded for a user-wide token revocation.
fn session_reason(reason: RevocationReason) -> &'static str {
    match reason {
        RevocationReason::ReplayDetected => "refresh_token_replay",
        RevocationReason::Explicit => "token_revoked",
        RevocationReason::Rotated | RevocationReason::SessionRevoked => "session_revoked",
        RevocationReason::UserRevoked => "all_sessions_revoked",
    }
}

impl TokenService {
    /// Creates a token service.
    pub fn new(
        tokens: Arc<dyn TokenRepository>,
        denylist: Arc<dyn DenylistRepository>,
        sessions: Arc<dyn SessionRepository>,
        clock: Arc<dyn Clock>,
        config: &AuthConfig,
        store_timeout: Duration,
    ) -> Self {
        Self {
            tokens,
            denylist,
            sessions,
            encoder: JwtEncoder::new(config),
            decoder: JwtDecoder::new(config),
            clock,
            access_ttl: chrono::Duration::minutes(config.jwt_access_ttl_minutes as i64),
            refresh_ttl: chrono::Duration::hours(config.jwt_refresh_ttl_hours as i64),
            store_timeout,
            issued: Arc::new(AtomicU64::new(0)),
            replays: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Issues a fresh pair for `session` and records both tokens.
    pub async fn issue_pair(
        &self,
        user_id: UserId,
        username: &str,
        session: &Session,
    ) -> AppResult<TokenPair> {
        self.issue_pair_with(user_id, username, session, TokenId::new())
            .await
    }

    async fn issue_pair_with(
        &self,
        user_id: UserId,
        username: &str,
        session: &Session,
        refresh_jti: TokenId,
    ) -> AppResult<TokenPair> {
        let now = self.clock.now();
        let access_exp = now + self.access_ttl;
        let refresh_exp = (now + self.refresh_ttl).min(session.expires_at);

        let access = self.encoder.encode(
            TokenKind::Access,
            TokenId::new(),
            user_id,
            session.id,
            username,
            now,
            access_exp,
        )?;
        let refresh = self.encoder.encode(
            TokenKind::Refresh,
            refresh_jti,
            user_id,
            session.id,
            username,
            now,
            refresh_exp,
        )?;

        for (encoded, kind, expires_at) in [
            (&access, TokenKind::Access, access_exp),
            (&refresh, TokenKind::Refresh, refresh_exp),
        ] {
            bounded(
                self.store_timeout,
                self.tokens
                    .insert(record_for(encoded, kind, user_id, session.id, now, expires_at)),
            )
            .await?;
        }
        self.issued.fetch_add(2, Ordering::Relaxed);

        debug!(user_id = %user_id, session_id = %session.id, "Issued token pair");
        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            access_expires_at: access_exp,
            refresh_expires_at: refresh_exp,
            session_id: session.id,
        })
    }

    /// Validates an access token against signature, type, expiry, and the
    /// denylist.
    pub async fn validate_access(&self, token: &str) -> AppResult<Claims> {
        let claims = self.decoder.decode_kind(token, TokenKind::Access)?;
        let now = self.clock.now();
        if claims.is_expired(now) {
            return Err(AppError::token_expired("Token has expired"));
        }

        if bounded(self.store_timeout, self.denylist.is_token_denied(claims.jti, now)).await?
            || bounded(
                self.store_timeout,
                self.denylist.is_session_denied(claims.sid, now),
            )
            .await?
        {
            return Err(AppError::token_revoked("Token has been revoked"));
        }

        Ok(claims)
    }

    /// Exchanges a refresh token for a new pair on the same session.
    pub async fn rotate_refresh(&self, token: &str) -> AppResult<RotatedPair> {
        let claims = self.decoder.decode_kind(token, TokenKind::Refresh)?;
        let record = bounded(self.store_timeout, self.tokens.find(claims.jti))
            .await?
            .ok_or_else(|| AppError::token_not_found("Refresh token not found"))?;

        if record.kind != TokenKind::Refresh || record.token_hash != hash_token(token) {
            return Err(AppError::token_invalid("Refresh token does not match its record"));
        }

        let now = self.clock.now();
        if claims.is_expired(now) || record.expires_at <= now {
            return Err(AppError::token_expired("Refresh token has expired"));
        }

        let session = bounded(self.store_timeout, self.sessions.find(record.session_id))
            .await?
            .ok_or_else(|| AppError::session_not_found("Session not found"))?;
        match session.state(now) {
            SessionState::Active => {}
            SessionState::Revoked => {
                return Err(AppError::token_revoked("Session has been revoked"));
            }
            SessionState::Expired => return Err(AppError::token_expired("Session has expired")),
        }

        let next_jti = TokenId::new();
        match bounded(
            self.store_timeout,
            self.tokens.consume_refresh(record.id, next_jti, now),
        )
        .await?
        {
            ConsumeOutcome::Consumed(_) => {}
            ConsumeOutcome::AlreadyRevoked(current)
                if current.revocation_reason == Some(RevocationReason::Rotated) =>
            {
                self.replays.fetch_add(1, Ordering::Relaxed);
                warn!(
                    user_id = %record.user_id,
                    session_id = %record.session_id,
                    token_id = %record.id,
                    "Rotated refresh token presented again, revoking all sessions"
                );
                self.revoke_all_for_user(record.user_id, RevocationReason::ReplayDetected)
                    .await?;
                return Err(AppError::token_revoked("Refresh token has been revoked"));
            }
            ConsumeOutcome::AlreadyRevoked(_) => {
                return Err(AppError::token_revoked("Refresh token has been revoked"));
            }
            ConsumeOutcome::NotFound => {
                return Err(AppError::token_not_found("Refresh token not found"));
            }
        }

        let tokens = self
            .issue_pair_with(record.user_id, &claims.username, &session, next_jti)
            .await?;

        info!(user_id = %record.user_id, session_id = %session.id, "Refresh token rotated");
        Ok(RotatedPair {
            tokens,
            user_id: record.user_id,
        })
    }

    /// Revokes one token. Access tokens are denylisted until their expiry;
    /// refresh tokens have their record revoked. Repeating the call acks.
    pub async fn revoke(&self, token: &str) -> AppResult<RevokedToken> {
        let claims = self.decoder.decode(token)?;
        let now = self.clock.now();

        match claims.token_type {
            TokenKind::Access => {
                bounded(
                    self.store_timeout,
                    self.denylist.deny_token(claims.jti, claims.expires_at()),
                )
                .await?;
                bounded(
                    self.store_timeout,
                    self.tokens.revoke(claims.jti, RevocationReason::Explicit, now),
                )
                .await?;
            }
            TokenKind::Refresh => {
                let record = bounded(self.store_timeout, self.tokens.find(claims.jti))
                    .await?
                    .ok_or_else(|| AppError::token_not_found("Refresh token not found"))?;
                if record.token_hash != hash_token(token) {
                    return Err(AppError::token_invalid(
                        "Refresh token does not match its record",
                    ));
                }
                bounded(
                    self.store_timeout,
                    self.tokens.revoke(claims.jti, RevocationReason::Explicit, now),
                )
                .await?;
            }
        }

        info!(
            user_id = %claims.sub,
            token_id = %claims.jti,
            kind = %claims.token_type,
            "Token revoked"
        );
        Ok(RevokedToken {
            kind: claims.token_type,
            token_id: claims.jti,
            user_id: claims.sub,
            session_id: claims.sid,
        })
    }

    /// Denylists `session` for as long as any of its access tokens could
    /// still verify, then revokes its token records. Safe to repeat.
    pub async fn revoke_session_tokens(&self, session: &Session) -> AppResult<u64> {
        let now = self.clock.now();
        self.deny_session(session, now).await?;
        bounded(
            self.store_timeout,
            self.tokens
                .revoke_for_session(session.id, RevocationReason::SessionRevoked, now),
        )
        .await
    }

    /// Revokes every session and token of a user. Returns the number of
    /// sessions this call revoked.
    ///
    /// Every revoked session whose access tokens may still verify is
    /// denylisted, not only the ones revoked here, so a retry after a partial
    /// failure leaves nothing validating.
    pub async fn revoke_all_for_user(
        &self,
        user_id: UserId,
        reason: RevocationReason,
    ) -> AppResult<u64> {
        let now = self.clock.now();
        let revoked = bounded(
            self.store_timeout,
            self.sessions
                .revoke_all_for_user(user_id, session_reason(reason), now),
        )
        .await?;

        let sessions = bounded(self.store_timeout, self.sessions.list_for_user(user_id)).await?;
        let mut denied = 0usize;
        for session in sessions
            .iter()
            .filter(|s| s.revoked_at.is_some() && s.expires_at + self.access_ttl > now)
        {
            self.deny_session(session, now).await?;
            denied += 1;
        }

        let tokens = bounded(
            self.store_timeout,
            self.tokens.revoke_for_user(user_id, reason, now),
        )
        .await?;

        info!(
            user_id = %user_id,
            sessions = revoked.len(),
            denied,
            tokens,
            "Revoked all sessions and tokens for user"
        );
        Ok(revoked.len() as u64)
    }

    /// Deletes token records past expiry and retention, and purges lapsed
    /// denylist entries. Returns the number of token records deleted.
    pub async fn sweep_expired(&self, retention: chrono::Duration) -> AppResult<u64> {
        let now = self.clock.now();
        let deleted = bounded(
            self.store_timeout,
            self.tokens.delete_expired(now, retention),
        )
        .await?;
        let purged = bounded(self.store_timeout, self.denylist.purge(now)).await?;
        debug!(deleted, purged, "Token sweep finished");
        Ok(deleted)
    }

    /// Number of unrevoked, unexpired token records.
    pub async fn count_active(&self) -> AppResult<u64> {
        bounded(
            self.store_timeout,
            self.tokens.count_active(self.clock.now()),
        )
        .await
    }

    /// Number of revoked token records still held.
    pub async fn count_revoked(&self) -> AppResult<u64> {
        bounded(self.store_timeout, self.tokens.count_revoked()).await
    }

    /// Tokens issued since start.
    pub fn tokens_issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    /// Refresh-token replays detected since start.
    pub fn replays_detected(&self) -> u64 {
        self.replays.load(Ordering::Relaxed)
    }

    async fn deny_session(&self, session: &Session, now: DateTime<Utc>) -> AppResult<()> {
        let until = session.expires_at.max(now + self.access_ttl);
        bounded(
            self.store_timeout,
            self.denylist.deny_session(session.id, until),
        )
        .await
    }
}

fn record_for(
    encoded: &EncodedToken,
    kind: TokenKind,
    user_id: UserId,
    session_id: SessionId,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> TokenRecord {
    TokenRecord {
        id: encoded.claims.jti,
        user_id,
        session_id,
        kind,
        token_hash: hash_token(&encoded.token),
        issued_at,
        expires_at,
        revoked_at: None,
        revocation_reason: None,
        replaced_by: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshauth_core::ErrorKind;
    use meshauth_core::traits::ManualClock;
    use meshauth_entity::session::DeviceInfo;
    use meshauth_store::memory::{MemoryDenylist, MemorySessionStore, MemoryTokenStore};

    struct Fixture {
        clock: Arc<ManualClock>,
        sessions: Arc<MemorySessionStore>,
        service: TokenService,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::starting_now());
        let sessions = Arc::new(MemorySessionStore::new());
        let service = TokenService::new(
            Arc::new(MemoryTokenStore::new()),
            Arc::new(MemoryDenylist::new()),
            sessions.clone(),
            clock.clone(),
            &AuthConfig::default(),
            Duration::from_secs(2),
        );
        Fixture {
            clock,
            sessions,
            service,
        }
    }

    async fn session(f: &Fixture, user_id: UserId) -> Session {
        let now = f.clock.now();
        let session = Session {
            id: SessionId::new(),
            user_id,
            device: DeviceInfo::default(),
            created_at: now,
            last_active_at: now,
            expires_at: now + chrono::Duration::hours(168),
            revoked_at: None,
            revoked_reason: None,
        };
        f.sessions.create(session.clone()).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_access_token_validates_until_expiry() {
        let f = fixture();
        let user = UserId::new();
        let s = session(&f, user).await;
        let pair = f.service.issue_pair(user, "alice", &s).await.unwrap();

        let claims = f.service.validate_access(&pair.access_token).await.unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.sid, s.id);

        let err = f
            .service
            .validate_access(&pair.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenInvalid);

        f.clock.advance(chrono::Duration::minutes(16));
        let err = f
            .service
            .validate_access(&pair.access_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenExpired);
    }

    #[tokio::test]
    async fn test_refresh_expiry_capped_by_session() {
        let f = fixture();
        let user = UserId::new();
        let mut s = session(&f, user).await;
        s.expires_at = f.clock.now() + chrono::Duration::hours(1);
        let pair = f.service.issue_pair(user, "alice", &s).await.unwrap();
        assert_eq!(pair.refresh_expires_at, s.expires_at);
    }

    #[tokio::test]
    async fn test_replayed_refresh_revokes_everything() {
        let f = fixture();
        let user = UserId::new();
        let s = session(&f, user).await;
        let first = f.service.issue_pair(user, "alice", &s).await.unwrap();

        let rotated = f.service.rotate_refresh(&first.refresh_token).await.unwrap();
        assert_eq!(rotated.tokens.session_id, s.id);

        let err = f
            .service
            .rotate_refresh(&first.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenRevoked);
        assert_eq!(f.service.replays_detected(), 1);

        let stored = f.sessions.find(s.id).await.unwrap().unwrap();
        assert!(stored.revoked_at.is_some());

        let err = f
            .service
            .validate_access(&rotated.tokens.access_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenRevoked);
        let err = f
            .service
            .rotate_refresh(&rotated.tokens.refresh_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenRevoked);
    }

    #[tokio::test]
    async fn test_revoke_access_token_is_idempotent() {
        let f = fixture();
        let user = UserId::new();
        let s = session(&f, user).await;
        let pair = f.service.issue_pair(user, "alice", &s).await.unwrap();

        let revoked = f.service.revoke(&pair.access_token).await.unwrap();
        assert_eq!(revoked.kind, TokenKind::Access);
        f.service.revoke(&pair.access_token).await.unwrap();

        let err = f
            .service
            .validate_access(&pair.access_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenRevoked);
    }

    #[tokio::test]
    async fn test_revoke_session_denies_its_access_tokens() {
        let f = fixture();
        let user = UserId::new();
        let s = session(&f, user).await;
        let pair = f.service.issue_pair(user, "alice", &s).await.unwrap();

        assert_eq!(f.service.revoke_session_tokens(&s).await.unwrap(), 2);
        let err = f
            .service
            .validate_access(&pair.access_token)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenRevoked);
        assert_eq!(f.service.count_active().await.unwrap(), 0);
    }
}
