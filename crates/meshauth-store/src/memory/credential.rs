//! In-memory credential store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use meshauth_core::error::AppError;
use meshauth_core::result::AppResult;
use meshauth_core::types::UserId;
use meshauth_entity::user::CredentialRecord;

use crate::repositories::{AttemptGate, CredentialRepository};

/// Credential records with unique username and email indices.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: DashMap<UserId, CredentialRecord>,
    usernames: DashMap<String, UserId>,
    emails: DashMap<String, UserId>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_record<T>(
        &self,
        user_id: UserId,
        f: impl FnOnce(&mut CredentialRecord) -> T,
    ) -> AppResult<T> {
        let mut entry = self
            .records
            .get_mut(&user_id)
            .ok_or_else(|| AppError::not_found(format!("User {user_id} not found")))?;
        Ok(f(entry.value_mut()))
    }
}

fn email_key(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[async_trait]
impl CredentialRepository for MemoryCredentialStore {
    async fn create(&self, record: CredentialRecord) -> AppResult<()> {
        let user_id = record.user_id;

        match self.usernames.entry(record.username.clone()) {
            Entry::Occupied(_) => {
                return Err(AppError::conflict(format!(
                    "Username '{}' is already taken",
                    record.username
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(user_id);
            }
        }

        match self.emails.entry(email_key(&record.email)) {
            Entry::Occupied(_) => {
                self.usernames.remove(&record.username);
                return Err(AppError::conflict("Email is already registered"));
            }
            Entry::Vacant(slot) => {
                slot.insert(user_id);
            }
        }

        self.records.insert(user_id, record);
        Ok(())
    }

    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<CredentialRecord>> {
        Ok(self.records.get(&user_id).map(|r| r.value().clone()))
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<CredentialRecord>> {
        let Some(user_id) = self.usernames.get(username).map(|id| *id.value()) else {
            return Ok(None);
        };
        self.find_by_id(user_id).await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<CredentialRecord>> {
        let Some(user_id) = self.emails.get(&email_key(email)).map(|id| *id.value()) else {
            return Ok(None);
        };
        self.find_by_id(user_id).await
    }

    async fn begin_attempt(
        &self,
        user_id: UserId,
        threshold: u32,
        lock_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<AttemptGate> {
        self.with_record(user_id, |record| {
            let lapsed = match record.locked_until {
                Some(until) if until > now => return AttemptGate::Locked { until },
                Some(_) => true,
                None => false,
            };

            if !lapsed && record.failed_attempts >= threshold {
                record.locked_until = Some(lock_until);
                record.updated_at = now;
                return AttemptGate::Locked { until: lock_until };
            }

            record.failed_attempts = record.failed_attempts.saturating_add(1);
            if record.failed_attempts >= threshold {
                record.locked_until = Some(lock_until);
            }
            record.updated_at = now;
            AttemptGate::Admitted {
                attempt: record.failed_attempts,
            }
        })
    }

    async fn record_success(
        &self,
        user_id: UserId,
        attempt: u32,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        self.with_record(user_id, |record| {
            record.last_login_at = Some(now);
            record.updated_at = now;
            // A later reservation may have locked the account meanwhile.
            if record.failed_attempts != attempt {
                return false;
            }
            record.failed_attempts = 0;
            record.locked_until = None;
            true
        })
    }

    async fn delete(&self, user_id: UserId) -> AppResult<bool> {
        let Some((_, record)) = self.records.remove(&user_id) else {
            return Ok(false);
        };
        self.usernames
            .remove_if(&record.username, |_, owner| *owner == user_id);
        self.emails
            .remove_if(&email_key(&record.email), |_, owner| *owner == user_id);
        Ok(true)
    }

    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.with_record(user_id, |record| {
            record.password_hash = password_hash;
            record.failed_attempts = 0;
            record.locked_until = None;
            record.updated_at = now;
        })
    }

    async fn set_email_verified(&self, user_id: UserId, now: DateTime<Utc>) -> AppResult<()> {
        self.with_record(user_id, |record| {
            record.email_verified = true;
            record.updated_at = now;
        })
    }

    async fn count_locked(&self, now: DateTime<Utc>) -> AppResult<u64> {
        Ok(self.records.iter().filter(|r| r.is_locked(now)).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use meshauth_core::error::ErrorKind;

    fn record(username: &str, email: &str) -> CredentialRecord {
        CredentialRecord::new(UserId::new(), username, email, "hash", Utc::now())
    }

    #[tokio::test]
    async fn test_unique_username_and_email() {
        let store = MemoryCredentialStore::new();
        store.create(record("alice", "alice@x.com")).await.unwrap();

        let err = store.create(record("alice", "other@x.com")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        let err = store.create(record("alice2", "ALICE@x.com")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        // The rejected username must not stay reserved.
        store.create(record("alice2", "alice2@x.com")).await.unwrap();
    }

    #[tokio::test]
    async fn test_reservation_locks_at_threshold() {
        let store = MemoryCredentialStore::new();
        let rec = record("bob", "bob@x.com");
        let id = rec.user_id;
        store.create(rec).await.unwrap();

        let now = Utc::now();
        let until = now + Duration::minutes(15);
        for n in 1..=2 {
            let gate = store.begin_attempt(id, 3, until, now).await.unwrap();
            assert_eq!(gate, AttemptGate::Admitted { attempt: n });
        }
        let gate = store.begin_attempt(id, 3, until, now).await.unwrap();
        assert_eq!(gate, AttemptGate::Admitted { attempt: 3 });
        assert_eq!(store.count_locked(now).await.unwrap(), 1);

        let gate = store.begin_attempt(id, 3, until, now).await.unwrap();
        assert_eq!(gate, AttemptGate::Locked { until });

        // The last admitted attempt succeeding lifts its own lock.
        assert!(store.record_success(id, 3, now).await.unwrap());
        let r = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(r.failed_attempts, 0);
        assert!(r.locked_until.is_none());
        assert_eq!(r.last_login_at, Some(now));
    }

    #[tokio::test]
    async fn test_early_success_keeps_later_lock() {
        let store = MemoryCredentialStore::new();
        let rec = record("cora", "cora@x.com");
        let id = rec.user_id;
        store.create(rec).await.unwrap();

        let now = Utc::now();
        let until = now + Duration::minutes(15);
        for _ in 0..3 {
            store.begin_attempt(id, 3, until, now).await.unwrap();
        }

        assert!(!store.record_success(id, 1, now).await.unwrap());
        let r = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(r.locked_until, Some(until));
        assert_eq!(r.failed_attempts, 3);
    }

    #[tokio::test]
    async fn test_lapsed_lock_admits_one_attempt_at_a_time() {
        let store = MemoryCredentialStore::new();
        let rec = record("dora", "dora@x.com");
        let id = rec.user_id;
        store.create(rec).await.unwrap();

        let now = Utc::now();
        let until = now + Duration::minutes(15);
        for _ in 0..3 {
            store.begin_attempt(id, 3, until, now).await.unwrap();
        }

        let later = until + Duration::seconds(1);
        let relock = later + Duration::minutes(15);
        let gate = store.begin_attempt(id, 3, relock, later).await.unwrap();
        assert_eq!(gate, AttemptGate::Admitted { attempt: 4 });

        // The counter keeps climbing, so the admitted attempt re-locks at once.
        let gate = store.begin_attempt(id, 3, relock, later).await.unwrap();
        assert_eq!(gate, AttemptGate::Locked { until: relock });

        assert!(store.record_success(id, 4, later).await.unwrap());
        let r = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(r.failed_attempts, 0);
        assert!(r.locked_until.is_none());
    }

    #[tokio::test]
    async fn test_delete_releases_username_and_email() {
        let store = MemoryCredentialStore::new();
        let rec = record("erik", "erik@x.com");
        let id = rec.user_id;
        store.create(rec).await.unwrap();

        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
        assert!(store.find_by_username("erik").await.unwrap().is_none());
        store.create(record("erik", "ERIK@x.com")).await.unwrap();
    }

    #[tokio::test]
    async fn test_find_by_email_ignores_case() {
        let store = MemoryCredentialStore::new();
        store.create(record("carol", "Carol@X.com")).await.unwrap();
        assert!(store.find_by_email("carol@x.com").await.unwrap().is_some());
    }
}
