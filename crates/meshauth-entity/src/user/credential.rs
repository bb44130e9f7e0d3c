//! Credential record: the auth-owned part of a user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meshauth_core::types::UserId;

/// Login credentials and lockout state for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// The user this record belongs to.
    pub user_id: UserId,
    /// Unique login name.
    pub username: String,
    /// Unique email address.
    pub email: String,
    /// Argon2id PHC string.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Consecutive failed attempts since the last success.
    pub failed_attempts: u32,
    /// Authentication is refused until this instant.
    pub locked_until: Option<DateTime<Utc>>,
    /// Whether the email address has been confirmed.
    pub email_verified: bool,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last modified.
    pub updated_at: DateTime<Utc>,
    /// Last successful authentication.
    pub last_login_at: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    /// Builds a fresh, unlocked, unverified record.
    pub fn new(
        user_id: UserId,
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            failed_attempts: 0,
            locked_until: None,
            email_verified: false,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    /// Whether the account is locked at `now`.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}
