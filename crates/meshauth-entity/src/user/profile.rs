//! Profile attributes held by the external identity store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meshauth_core::types::UserId;

/// Non-auth user attributes captured at registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    /// The user this profile describes.
    pub user_id: UserId,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// When the profile was created.
    pub created_at: DateTime<Utc>,
}
