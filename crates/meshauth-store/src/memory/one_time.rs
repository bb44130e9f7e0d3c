//! In-memory one-time token store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use meshauth_core::error::{AppError, ErrorKind};
use meshauth_core::result::AppResult;
use meshauth_core::types::UserId;
use meshauth_entity::token::{OneTimeToken, TokenPurpose};

use crate::repositories::OneTimeTokenRepository;

/// One-time tokens keyed by the hash of their value.
#[derive(Debug, Default)]
pub struct MemoryOneTimeTokenStore {
    tokens: DashMap<String, OneTimeToken>,
}

impl MemoryOneTimeTokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OneTimeTokenRepository for MemoryOneTimeTokenStore {
    async fn insert(&self, token: OneTimeToken) -> AppResult<()> {
        self.tokens.insert(token.token_hash.clone(), token);
        Ok(())
    }

    async fn consume(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
    ) -> AppResult<OneTimeToken> {
        let mut token = self
            .tokens
            .get_mut(token_hash)
            .filter(|t| t.purpose == purpose)
            .ok_or_else(|| AppError::one_time_token(ErrorKind::TokenNotFound))?;

        if token.used_at.is_some() {
            return Err(AppError::one_time_token(ErrorKind::AlreadyUsed));
        }
        if token.is_expired(now) {
            return Err(AppError::one_time_token(ErrorKind::TokenExpired));
        }

        token.used_at = Some(now);
        Ok(token.value().clone())
    }

    async fn release(&self, token_hash: &str, used_at: DateTime<Utc>) -> AppResult<bool> {
        let Some(mut token) = self.tokens.get_mut(token_hash) else {
            return Ok(false);
        };
        if token.used_at != Some(used_at) {
            return Ok(false);
        }
        token.used_at = None;
        Ok(true)
    }

    async fn invalidate_for_user(
        &self,
        user_id: UserId,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut count = 0u64;
        for mut token in self.tokens.iter_mut() {
            if token.user_id == user_id && token.purpose == purpose && token.used_at.is_none() {
                token.used_at = Some(now);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut deleted = 0u64;
        self.tokens.retain(|_, token| {
            let keep = token.expires_at >= now;
            if !keep {
                deleted += 1;
            }
            keep
        });
        Ok(deleted)
    }
}
