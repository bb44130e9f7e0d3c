//! Wiring of the auth components.

use std::sync::Arc;

use tracing::info;

use meshauth_core::config::AppConfig;
use meshauth_core::result::AppResult;
use meshauth_core::traits::{Clock, LogNotifier, Notifier, SystemClock};
use meshauth_store::{MemoryStores, ProfileRepository};

use crate::cleanup::{CleanupReconciler, CleanupScheduler};
use crate::credential::CredentialManager;
use crate::facade::AuthFacade;
use crate::rbac::RbacEngine;
use crate::session::SessionManager;
use crate::token::TokenService;

/// Every auth component, built once and shared by `Arc`.
#[derive(Debug, Clone)]
pub struct AuthServices {
    /// Validated configuration.
    pub config: Arc<AppConfig>,
    /// Credentials, lockout, and one-time tokens.
    pub credentials: Arc<CredentialManager>,
    /// Access/refresh tokens.
    pub tokens: Arc<TokenService>,
    /// Sessions.
    pub sessions: Arc<SessionManager>,
    /// Roles and permissions.
    pub rbac: Arc<RbacEngine>,
    /// Expired-record removal.
    pub cleanup: Arc<CleanupReconciler>,
    /// User profiles.
    pub profiles: Arc<dyn ProfileRepository>,
    /// Time source shared by every component.
    pub clock: Arc<dyn Clock>,
}

impl AuthServices {
    /// Builds the components over `stores`.
    pub fn build(
        config: AppConfig,
        stores: MemoryStores,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        config.validate()?;
        let store_timeout = config.store.operation_timeout();

        let credentials = Arc::new(CredentialManager::new(
            stores.credentials.clone(),
            stores.one_time_tokens.clone(),
            notifier,
            clock.clone(),
            config.auth.clone(),
            store_timeout,
        ));
        let tokens = Arc::new(TokenService::new(
            stores.tokens.clone(),
            stores.denylist.clone(),
            stores.sessions.clone(),
            clock.clone(),
            &config.auth,
            store_timeout,
        ));
        let sessions = Arc::new(SessionManager::new(
            stores.sessions.clone(),
            tokens.clone(),
            clock.clone(),
            &config.session,
            store_timeout,
        ));
        let rbac = Arc::new(RbacEngine::new(
            stores.rbac.clone(),
            clock.clone(),
            &config.rbac,
            store_timeout,
        ));
        let cleanup = Arc::new(CleanupReconciler::new(
            tokens.clone(),
            sessions.clone(),
            credentials.clone(),
            &config.cleanup,
        ));

        info!(
            service = %config.service.name,
            access_ttl_minutes = config.auth.jwt_access_ttl_minutes,
            refresh_ttl_hours = config.auth.jwt_refresh_ttl_hours,
            "Auth services initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            credentials,
            tokens,
            sessions,
            rbac,
            cleanup,
            profiles: stores.profiles,
            clock,
        })
    }

    /// In-memory stores, the log notifier, and the system clock.
    pub fn in_memory(config: AppConfig) -> AppResult<Self> {
        Self::build(
            config,
            MemoryStores::new(),
            Arc::new(LogNotifier),
            Arc::new(SystemClock),
        )
    }

    /// The facade over these components.
    pub fn facade(&self) -> AuthFacade {
        AuthFacade::new(self)
    }

    /// A periodic cleanup driver for this reconciler.
    pub fn scheduler(&self) -> CleanupScheduler {
        CleanupScheduler::new(self.cleanup.clone(), &self.config.cleanup)
    }
}
