//! Role-based access control configuration.

use serde::{Deserialize, Serialize};

/// RBAC configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RbacConfig {
    /// Role assigned to newly registered users, when such a role exists.
    #[serde(default = "default_role")]
    pub default_role: String,
    /// Maximum number of per-user permission closures kept in memory.
    #[serde(default = "default_cache_capacity")]
    pub closure_cache_capacity: u64,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            default_role: default_role(),
            closure_cache_capacity: default_cache_capacity(),
        }
    }
}

fn default_role() -> String {
    "customer".to_string()
}

fn default_cache_capacity() -> u64 {
    10_000
}
