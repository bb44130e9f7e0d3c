//! Session management configuration.

use serde::{Deserialize, Serialize};

/// Session lifetime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Absolute session lifetime in hours, regardless of activity.
    /// Refresh tokens never outlive their session.
    #[serde(default = "default_absolute_ttl")]
    pub absolute_ttl_hours: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            absolute_ttl_hours: default_absolute_ttl(),
        }
    }
}

fn default_absolute_ttl() -> u64 {
    168
}
