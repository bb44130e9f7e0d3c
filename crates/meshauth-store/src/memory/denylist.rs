//! In-memory revocation denylist.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use meshauth_core::result::AppResult;
use meshauth_core::types::{SessionId, TokenId};

use crate::repositories::DenylistRepository;

/// Denied `jti`s and session IDs, each with a lapse instant.
#[derive(Debug, Default)]
pub struct MemoryDenylist {
    tokens: DashMap<TokenId, DateTime<Utc>>,
    sessions: DashMap<SessionId, DateTime<Utc>>,
}

impl MemoryDenylist {
    /// Create an empty denylist.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DenylistRepository for MemoryDenylist {
    async fn deny_token(&self, jti: TokenId, until: DateTime<Utc>) -> AppResult<()> {
        self.tokens
            .entry(jti)
            .and_modify(|current| *current = (*current).max(until))
            .or_insert(until);
        Ok(())
    }

    async fn deny_session(&self, session_id: SessionId, until: DateTime<Utc>) -> AppResult<()> {
        self.sessions
            .entry(session_id)
            .and_modify(|current| *current = (*current).max(until))
            .or_insert(until);
        Ok(())
    }

    async fn is_token_denied(&self, jti: TokenId, now: DateTime<Utc>) -> AppResult<bool> {
        Ok(self.tokens.get(&jti).is_some_and(|until| *until > now))
    }

    async fn is_session_denied(
        &self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        Ok(self.sessions.get(&session_id).is_some_and(|until| *until > now))
    }

    async fn purge(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut removed = 0u64;
        let mut keep = |until: &DateTime<Utc>| {
            let live = *until > now;
            if !live {
                removed += 1;
            }
            live
        };
        self.tokens.retain(|_, until| keep(&*until));
        self.sessions.retain(|_, until| keep(&*until));
        Ok(removed)
    }
}
