//! Expired-state cleanup configuration.

use serde::{Deserialize, Serialize};

/// Periodic sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Whether the periodic sweep runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between two sweeps.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    /// Hours a revoked record is kept for audit before it may be deleted.
    #[serde(default = "default_retention")]
    pub revoked_retention_hours: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_interval(),
            revoked_retention_hours: default_retention(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    900
}

fn default_retention() -> u64 {
    24
}
