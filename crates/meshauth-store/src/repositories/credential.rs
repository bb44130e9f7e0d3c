//! Credential persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use meshauth_core::result::AppResult;
use meshauth_core::types::UserId;
use meshauth_entity::user::CredentialRecord;

/// Outcome of reserving a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptGate {
    /// The attempt may check the password. `attempt` is its position in the
    /// current failure window, already counted as a failure.
    Admitted {
        /// 1-based position in the window.
        attempt: u32,
    },
    /// The account is locked. No password check may run.
    Locked {
        /// End of the lock.
        until: DateTime<Utc>,
    },
}

/// Store of credential records, unique by username and by email.
#[async_trait]
pub trait CredentialRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a new record. A taken username or email is a `Conflict`.
    async fn create(&self, record: CredentialRecord) -> AppResult<()>;

    /// Find a record by user ID.
    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<CredentialRecord>>;

    /// Find a record by exact username.
    async fn find_by_username(&self, username: &str) -> AppResult<Option<CredentialRecord>>;

    /// Find a record by email, ignoring ASCII case.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<CredentialRecord>>;

    /// Reserve one login attempt in a single atomic step.
    ///
    /// A lock still in force refuses the attempt. An admitted attempt is
    /// counted as a failure up front, and any reservation that brings the
    /// counter to `threshold` or past it sets `locked_until` to `lock_until`.
    /// No more than `threshold` password checks can run before the first
    /// lock, and one per window after a lock lapses.
    async fn begin_attempt(
        &self,
        user_id: UserId,
        threshold: u32,
        lock_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<AttemptGate>;

    /// Settle an admitted attempt whose password matched. Stamps
    /// `last_login_at`, and clears the counter and lock only when no attempt
    /// was reserved after `attempt`. Returns whether the state was cleared.
    async fn record_success(
        &self,
        user_id: UserId,
        attempt: u32,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Delete a record and release its username and email. Returns whether
    /// a record existed.
    async fn delete(&self, user_id: UserId) -> AppResult<bool>;

    /// Replace the password hash and clear the lockout state.
    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Mark the email address verified.
    async fn set_email_verified(&self, user_id: UserId, now: DateTime<Utc>) -> AppResult<()>;

    /// Number of accounts locked at `now`.
    async fn count_locked(&self, now: DateTime<Utc>) -> AppResult<u64>;
}
