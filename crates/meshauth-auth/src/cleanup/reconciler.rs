//! One cleanup pass over tokens and sessions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use meshauth_core::config::CleanupConfig;
use meshauth_core::result::AppResult;

use crate::credential::CredentialManager;
use crate::session::SessionManager;
use crate::token::TokenService;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Token records and one-time tokens deleted.
    pub tokens_deleted: u64,
    /// Sessions deleted.
    pub sessions_deleted: u64,
}

/// Deletes records whose expiry has passed.
///
/// Revoked records stay for the configured retention window after
/// revocation. Each deletion commits on its own; a pass that fails halfway
/// leaves the rest for the next pass.
#[derive(Clone)]
pub struct CleanupReconciler {
    token_service: Arc<TokenService>,
    session_manager: Arc<SessionManager>,
    credential_manager: Arc<CredentialManager>,
    retention: chrono::Duration,
}

impl std::fmt::Debug for CleanupReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupReconciler")
            .field("retention", &self.retention)
            .finish()
    }
}

impl CleanupReconciler {
    /// Creates a reconciler.
    pub fn new(
        token_service: Arc<TokenService>,
        session_manager: Arc<SessionManager>,
        credential_manager: Arc<CredentialManager>,
        config: &CleanupConfig,
    ) -> Self {
        Self {
            token_service,
            session_manager,
            credential_manager,
            retention: chrono::Duration::hours(config.revoked_retention_hours as i64),
        }
    }

    /// Deletes expired token records and one-time tokens.
    pub async fn sweep_tokens(&self) -> AppResult<u64> {
        let records = self.token_service.sweep_expired(self.retention).await?;
        let one_time = self.credential_manager.sweep_one_time_tokens().await?;
        Ok(records + one_time)
    }

    /// Deletes expired sessions.
    pub async fn sweep_sessions(&self) -> AppResult<u64> {
        self.session_manager.sweep_expired(self.retention).await
    }

    /// Runs both passes. A failing pass does not stop the other one; the
    /// first error is returned after both have run.
    pub async fn sweep(&self) -> AppResult<SweepReport> {
        let tokens = self.sweep_tokens().await;
        let sessions = self.sweep_sessions().await;

        if let Err(e) = &tokens {
            error!(error = %e, "Token sweep failed");
        }
        if let Err(e) = &sessions {
            error!(error = %e, "Session sweep failed");
        }

        let report = SweepReport {
            tokens_deleted: tokens?,
            sessions_deleted: sessions?,
        };
        if report != SweepReport::default() {
            info!(
                tokens_deleted = report.tokens_deleted,
                sessions_deleted = report.sessions_deleted,
                "Cleanup sweep completed"
            );
        }
        Ok(report)
    }
}
