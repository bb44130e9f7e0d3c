//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field carries a serde default.

pub mod auth;
pub mod cleanup;
pub mod logging;
pub mod rbac;
pub mod session;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use self::auth::AuthConfig;
pub use self::cleanup::CleanupConfig;
pub use self::logging::LoggingConfig;
pub use self::rbac::RbacConfig;
pub use self::session::SessionConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// Top-level deserialization target for the merged configuration
/// (default.toml + environment overlay + `MESHAUTH__*` variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Service identity.
    #[serde(default)]
    pub service: ServiceConfig,
    /// Credential and token settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Session lifetime settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Periodic cleanup settings.
    #[serde(default)]
    pub cleanup: CleanupConfig,
    /// Store access settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Role-based access control settings.
    #[serde(default)]
    pub rbac: RbacConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Service identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name reported in logs.
    #[serde(default = "default_service_name")]
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
        }
    }
}

/// Store access configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Upper bound for a single store call, in milliseconds.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_ms: u64,
}

impl StoreConfig {
    /// The per-call timeout as a [`Duration`].
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: default_operation_timeout(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config/default`, an environment-specific overlay, and
    /// environment variables prefixed with `MESHAUTH_`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("MESHAUTH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        parsed.validate()?;
        Ok(parsed)
    }

    /// Rejects settings the auth core cannot run safely with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(AppError::configuration("auth.jwt_secret must not be empty"));
        }
        if self.auth.jwt_access_ttl_minutes == 0 || self.auth.jwt_refresh_ttl_hours == 0 {
            return Err(AppError::configuration("Token TTLs must be greater than zero"));
        }
        if self.session.absolute_ttl_hours == 0 {
            return Err(AppError::configuration(
                "session.absolute_ttl_hours must be greater than zero",
            ));
        }
        if self.auth.max_failed_attempts == 0 {
            return Err(AppError::configuration(
                "auth.max_failed_attempts must be greater than zero",
            ));
        }
        if self.store.operation_timeout_ms == 0 {
            return Err(AppError::configuration(
                "store.operation_timeout_ms must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn default_service_name() -> String {
    "auth-service".to_string()
}

fn default_operation_timeout() -> u64 {
    2_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.auth.password_min_length, 8);
        assert_eq!(config.auth.reset_token_ttl_minutes, 60);
    }

    #[test]
    fn test_empty_secret_rejected() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_zero_lockout_threshold_rejected() {
        let mut config = AppConfig::default();
        config.auth.max_failed_attempts = 0;
        assert!(config.validate().is_err());
    }
}
