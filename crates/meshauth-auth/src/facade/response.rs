//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meshauth_core::types::{SessionId, TokenId, UserId};
use meshauth_entity::rbac::PermissionKey;
use meshauth_entity::session::Session;
use meshauth_entity::user::{CredentialRecord, UserProfile};

use crate::jwt::Claims;
use crate::token::TokenPair;

/// Plain acknowledgement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AckResponse {
    /// Always `true`.
    pub success: bool,
}

impl AckResponse {
    /// A successful ack.
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// User summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    /// User ID.
    pub id: UserId,
    /// Username.
    pub username: String,
    /// Email.
    pub email: String,
    /// Whether the email has been verified.
    pub email_verified: bool,
    /// Given name, when a profile exists.
    pub first_name: Option<String>,
    /// Family name, when a profile exists.
    pub last_name: Option<String>,
}

impl UserResponse {
    /// Builds a summary from the credential record and an optional profile.
    pub fn new(record: &CredentialRecord, profile: Option<&UserProfile>) -> Self {
        Self {
            id: record.user_id,
            username: record.username.clone(),
            email: record.email.clone(),
            email_verified: record.email_verified,
            first_name: profile.map(|p| p.first_name.clone()),
            last_name: profile.map(|p| p.last_name.clone()),
        }
    }
}

/// Login response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Issued tokens.
    pub tokens: TokenPair,
    /// The new session.
    pub session: Session,
    /// The authenticated user.
    pub user: UserResponse,
}

/// Registration response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// The created user.
    pub user: UserResponse,
    /// Issued tokens.
    pub tokens: TokenPair,
    /// The first session.
    pub session: Session,
}

/// Refresh response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    /// New access token.
    pub access_token: String,
    /// New refresh token.
    pub refresh_token: String,
    /// Access token expiry.
    pub access_expires_at: DateTime<Utc>,
    /// Refresh token expiry.
    pub refresh_expires_at: DateTime<Utc>,
}

impl From<TokenPair> for RefreshResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            access_expires_at: pair.access_expires_at,
            refresh_expires_at: pair.refresh_expires_at,
        }
    }
}

/// Claims of a validated access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimsResponse {
    /// Subject.
    pub user_id: UserId,
    /// Session.
    pub session_id: SessionId,
    /// Token ID.
    pub token_id: TokenId,
    /// Username at issue time.
    pub username: String,
    /// Issue time.
    pub issued_at: DateTime<Utc>,
    /// Expiry.
    pub expires_at: DateTime<Utc>,
}

impl From<Claims> for ClaimsResponse {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            session_id: claims.sid,
            token_id: claims.jti,
            issued_at: claims.issued_at(),
            expires_at: claims.expires_at(),
            username: claims.username,
        }
    }
}

/// Active sessions of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsResponse {
    /// Most recently active first.
    pub sessions: Vec<Session>,
}

/// Count of sessions revoked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RevokeAllResponse {
    /// Sessions revoked by this call.
    pub revoked_count: u64,
}

/// Permission closure of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsResponse {
    /// Sorted `(resource, action)` pairs.
    pub permissions: Vec<PermissionKey>,
}

/// Permission check result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CheckPermissionResponse {
    /// Whether access is granted.
    pub allowed: bool,
}

/// Service statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StatsResponse {
    /// Sessions currently active.
    pub active_sessions: u64,
    /// Token records neither revoked nor expired.
    pub active_tokens: u64,
    /// Revoked token records still retained.
    pub revoked_tokens: u64,
    /// Accounts currently locked.
    pub locked_accounts: u64,
    /// Successful logins since start.
    pub logins_succeeded: u64,
    /// Failed logins since start.
    pub logins_failed: u64,
    /// Tokens issued since start.
    pub tokens_issued: u64,
    /// Refresh-token replays detected since start.
    pub replays_detected: u64,
}

/// Result of a cleanup call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CleanupResponse {
    /// Records deleted.
    pub deleted_count: u64,
}
