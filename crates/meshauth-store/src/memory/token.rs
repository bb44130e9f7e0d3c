//! In-memory token record store.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use meshauth_core::result::AppResult;
use meshauth_core::types::{SessionId, TokenId, UserId};
use meshauth_entity::token::{RevocationReason, TokenRecord};

use super::session::past_retention;
use crate::repositories::{ConsumeOutcome, TokenRepository};

/// Token records keyed by `jti`.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    records: DashMap<TokenId, TokenRecord>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn revoke_where(
        &self,
        reason: RevocationReason,
        now: DateTime<Utc>,
        matches: impl Fn(&TokenRecord) -> bool,
    ) -> u64 {
        let mut count = 0u64;
        for mut record in self.records.iter_mut() {
            if record.revoked_at.is_none() && matches(record.value()) {
                record.revoked_at = Some(now);
                record.revocation_reason = Some(reason);
                count += 1;
            }
        }
        count
    }
}

#[async_trait]
impl TokenRepository for MemoryTokenStore {
    async fn insert(&self, record: TokenRecord) -> AppResult<()> {
        self.records.insert(record.id, record);
        Ok(())
    }

    async fn find(&self, id: TokenId) -> AppResult<Option<TokenRecord>> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }

    async fn consume_refresh(
        &self,
        id: TokenId,
        replaced_by: TokenId,
        now: DateTime<Utc>,
    ) -> AppResult<ConsumeOutcome> {
        let Some(mut record) = self.records.get_mut(&id) else {
            return Ok(ConsumeOutcome::NotFound);
        };

        if record.revoked_at.is_some() {
            return Ok(ConsumeOutcome::AlreadyRevoked(record.value().clone()));
        }

        let before = record.value().clone();
        record.revoked_at = Some(now);
        record.revocation_reason = Some(RevocationReason::Rotated);
        record.replaced_by = Some(replaced_by);
        Ok(ConsumeOutcome::Consumed(before))
    }

    async fn revoke(
        &self,
        id: TokenId,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> AppResult<Option<TokenRecord>> {
        let Some(mut record) = self.records.get_mut(&id) else {
            return Ok(None);
        };
        if record.revoked_at.is_none() {
            record.revoked_at = Some(now);
            record.revocation_reason = Some(reason);
        }
        Ok(Some(record.value().clone()))
    }

    async fn revoke_for_session(
        &self,
        session_id: SessionId,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        Ok(self.revoke_where(reason, now, |r| r.session_id == session_id))
    }

    async fn revoke_for_user(
        &self,
        user_id: UserId,
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        Ok(self.revoke_where(reason, now, |r| r.user_id == user_id))
    }

    async fn delete_expired(&self, now: DateTime<Utc>, retention: Duration) -> AppResult<u64> {
        let candidates: Vec<TokenId> = self
            .records
            .iter()
            .filter(|r| past_retention(r.expires_at, r.revoked_at, now, retention))
            .map(|r| *r.key())
            .collect();

        let mut deleted = 0u64;
        for id in candidates {
            if self
                .records
                .remove_if(&id, |_, r| past_retention(r.expires_at, r.revoked_at, now, retention))
                .is_some()
            {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn count_active(&self, now: DateTime<Utc>) -> AppResult<u64> {
        Ok(self.records.iter().filter(|r| r.is_active(now)).count() as u64)
    }

    async fn count_revoked(&self) -> AppResult<u64> {
        Ok(self.records.iter().filter(|r| r.is_revoked()).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshauth_entity::token::TokenKind;

    fn refresh(now: DateTime<Utc>) -> TokenRecord {
        TokenRecord {
            id: TokenId::new(),
            user_id: UserId::new(),
            session_id: SessionId::new(),
            kind: TokenKind::Refresh,
            token_hash: "h".into(),
            issued_at: now,
            expires_at: now + Duration::days(7),
            revoked_at: None,
            revocation_reason: None,
            replaced_by: None,
        }
    }

    #[tokio::test]
    async fn test_consume_is_single_shot() {
        let store = MemoryTokenStore::new();
        let now = Utc::now();
        let rec = refresh(now);
        let id = rec.id;
        store.insert(rec).await.unwrap();

        let next = TokenId::new();
        assert!(matches!(
            store.consume_refresh(id, next, now).await.unwrap(),
            ConsumeOutcome::Consumed(_)
        ));
        match store.consume_refresh(id, TokenId::new(), now).await.unwrap() {
            ConsumeOutcome::AlreadyRevoked(r) => {
                assert_eq!(r.revocation_reason, Some(RevocationReason::Rotated));
                assert_eq!(r.replaced_by, Some(next));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(matches!(
            store.consume_refresh(TokenId::new(), next, now).await.unwrap(),
            ConsumeOutcome::NotFound
        ));
    }

    #[tokio::test]
    async fn test_revoke_keeps_first_reason() {
        let store = MemoryTokenStore::new();
        let now = Utc::now();
        let rec = refresh(now);
        let (id, session_id) = (rec.id, rec.session_id);
        store.insert(rec).await.unwrap();

        assert_eq!(
            store
                .revoke_for_session(session_id, RevocationReason::SessionRevoked, now)
                .await
                .unwrap(),
            1
        );
        let r = store
            .revoke(id, RevocationReason::Explicit, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(r.revocation_reason, Some(RevocationReason::SessionRevoked));
        assert_eq!(store.count_revoked().await.unwrap(), 1);
        assert_eq!(store.count_active(now).await.unwrap(), 0);
    }
}
