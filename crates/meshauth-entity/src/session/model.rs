//! Session entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meshauth_core::types::{SessionId, UserId};

/// Client metadata captured at login.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
    /// User-Agent string reported by the client.
    pub user_agent: Option<String>,
    /// Client IP address as reported by the transport.
    pub ip_address: Option<String>,
    /// Free-form device label.
    pub device_name: Option<String>,
}

/// Lifecycle state of a session at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Usable.
    Active,
    /// Terminated by logout or an explicit revoke. Terminal.
    Revoked,
    /// Past its absolute lifetime. Terminal.
    Expired,
}

/// One successful login.
///
/// Created on login, touched on refresh, revoked on logout or explicit
/// revoke, and deleted by the cleanup sweep once expired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    /// The user this session belongs to.
    pub user_id: UserId,
    /// Client metadata.
    pub device: DeviceInfo,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Last refresh or explicit touch.
    pub last_active_at: DateTime<Utc>,
    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,
    /// Set once, by the first revocation.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Why the session was revoked.
    pub revoked_reason: Option<String>,
}

impl Session {
    /// Derives the state at `now`. Revocation takes precedence over expiry.
    pub fn state(&self, now: DateTime<Utc>) -> SessionState {
        if self.revoked_at.is_some() {
            SessionState::Revoked
        } else if self.expires_at <= now {
            SessionState::Expired
        } else {
            SessionState::Active
        }
    }

    /// Shorthand for `state(now) == Active`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.state(now) == SessionState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(now: DateTime<Utc>) -> Session {
        Session {
            id: SessionId::new(),
            user_id: UserId::new(),
            device: DeviceInfo::default(),
            created_at: now,
            last_active_at: now,
            expires_at: now + Duration::hours(1),
            revoked_at: None,
            revoked_reason: None,
        }
    }

    #[test]
    fn test_state_transitions() {
        let now = Utc::now();
        let mut s = session(now);
        assert_eq!(s.state(now), SessionState::Active);
        assert_eq!(s.state(now + Duration::hours(1)), SessionState::Expired);

        s.revoked_at = Some(now);
        assert_eq!(s.state(now + Duration::hours(2)), SessionState::Revoked);
    }
}
