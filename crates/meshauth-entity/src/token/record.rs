//! Persisted access/refresh token record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meshauth_core::types::{SessionId, TokenId, UserId};

/// Distinguishes access tokens from refresh tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived, signature-verified token for API requests.
    Access,
    /// Store-backed, single-use-on-rotation token.
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// Why a token stopped being valid before its expiry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    /// Exchanged for a new pair. Presenting it again is a replay.
    Rotated,
    /// Revoked on request.
    Explicit,
    /// Its session was revoked.
    SessionRevoked,
    /// Every token of the user was revoked.
    UserRevoked,
    /// A rotated refresh token was presented again.
    ReplayDetected,
}

/// Server-side record of an issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    /// The JWT `jti`.
    pub id: TokenId,
    /// Owner.
    pub user_id: UserId,
    /// Owning session.
    pub session_id: SessionId,
    /// Access or refresh.
    pub kind: TokenKind,
    /// SHA-256 of the encoded token, hex.
    pub token_hash: String,
    /// Issue instant.
    pub issued_at: DateTime<Utc>,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
    /// Set once, by the first revocation.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Reason recorded with `revoked_at`.
    pub revocation_reason: Option<RevocationReason>,
    /// The refresh token that replaced this one on rotation.
    pub replaced_by: Option<TokenId>,
}

impl TokenRecord {
    /// Whether the record is neither revoked nor expired at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }

    /// Whether the record has been revoked.
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}
