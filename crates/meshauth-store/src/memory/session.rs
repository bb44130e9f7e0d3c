//! In-memory session store.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

use meshauth_core::error::AppError;
use meshauth_core::result::AppResult;
use meshauth_core::types::{SessionId, UserId};
use meshauth_entity::session::{Session, SessionState};

use crate::repositories::SessionRepository;

/// Sessions plus a per-user index.
///
/// Lock order is always user index entry, then session entry. Holding the
/// user's index entry is what serializes `create` against
/// `revoke_all_for_user`.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<SessionId, Session>,
    by_user: DashMap<UserId, Vec<SessionId>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Deletion predicate shared with the token sweep.
pub(crate) fn past_retention(
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    retention: Duration,
) -> bool {
    expires_at < now && revoked_at.is_none_or(|at| at + retention < now)
}

fn mark_revoked(session: &mut Session, reason: &str, now: DateTime<Utc>) -> bool {
    if session.revoked_at.is_some() {
        return false;
    }
    session.revoked_at = Some(now);
    session.revoked_reason = Some(reason.to_string());
    true
}

#[async_trait]
impl SessionRepository for MemorySessionStore {
    async fn create(&self, session: Session) -> AppResult<()> {
        let mut index = self.by_user.entry(session.user_id).or_default();
        index.push(session.id);
        self.sessions.insert(session.id, session);
        Ok(())
    }

    async fn find(&self, id: SessionId) -> AppResult<Option<Session>> {
        Ok(self.sessions.get(&id).map(|s| s.value().clone()))
    }

    async fn list_for_user(&self, user_id: UserId) -> AppResult<Vec<Session>> {
        let ids = self
            .by_user
            .get(&user_id)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();

        Ok(ids
            .iter()
            .filter_map(|id| self.sessions.get(id).map(|s| s.value().clone()))
            .collect())
    }

    async fn touch(&self, id: SessionId, now: DateTime<Utc>) -> AppResult<Session> {
        let mut entry = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::session_not_found(format!("Session {id} not found")))?;

        match entry.state(now) {
            SessionState::Active => {
                entry.last_active_at = now;
                Ok(entry.value().clone())
            }
            SessionState::Revoked => Err(AppError::token_revoked("Session has been revoked")),
            SessionState::Expired => Err(AppError::token_expired("Session has expired")),
        }
    }

    async fn revoke(
        &self,
        id: SessionId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> AppResult<(Session, bool)> {
        let mut entry = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::session_not_found(format!("Session {id} not found")))?;

        let revoked = mark_revoked(entry.value_mut(), reason, now);
        Ok((entry.value().clone(), revoked))
    }

    async fn revoke_all_for_user(
        &self,
        user_id: UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Session>> {
        let Some(index) = self.by_user.get(&user_id) else {
            return Ok(Vec::new());
        };

        let mut revoked = Vec::new();
        for id in index.iter() {
            if let Some(mut session) = self.sessions.get_mut(id) {
                if mark_revoked(session.value_mut(), reason, now) {
                    revoked.push(session.value().clone());
                }
            }
        }

        debug!(user_id = %user_id, count = revoked.len(), "Revoked all sessions for user");
        Ok(revoked)
    }

    async fn delete_expired(&self, now: DateTime<Utc>, retention: Duration) -> AppResult<u64> {
        let candidates: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|s| past_retention(s.expires_at, s.revoked_at, now, retention))
            .map(|s| *s.key())
            .collect();

        let mut deleted = 0u64;
        for id in candidates {
            let removed = self
                .sessions
                .remove_if(&id, |_, s| past_retention(s.expires_at, s.revoked_at, now, retention));

            if let Some((_, session)) = removed {
                if let Some(mut ids) = self.by_user.get_mut(&session.user_id) {
                    ids.retain(|sid| *sid != id);
                }
                self.by_user.remove_if(&session.user_id, |_, ids| ids.is_empty());
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    async fn count_active(&self, now: DateTime<Utc>) -> AppResult<u64> {
        Ok(self.sessions.iter().filter(|s| s.is_active(now)).count() as u64)
    }
}
