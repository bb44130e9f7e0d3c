//! Password-reset and email-verification tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meshauth_core::types::{OneTimeTokenId, UserId};

/// What a one-time token may be redeemed for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Redeemable by ResetPassword.
    PasswordReset,
    /// Redeemable by VerifyEmail.
    EmailVerification,
}

/// A random, single-use token. Only its hash is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneTimeToken {
    /// Unique identifier.
    pub id: OneTimeTokenId,
    /// The user it was issued to.
    pub user_id: UserId,
    /// What it can be redeemed for.
    pub purpose: TokenPurpose,
    /// SHA-256 of the raw token value, hex.
    pub token_hash: String,
    /// Issue instant.
    pub created_at: DateTime<Utc>,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
    /// Set when redeemed or invalidated.
    pub used_at: Option<DateTime<Utc>>,
}

impl OneTimeToken {
    /// Whether the token is past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
