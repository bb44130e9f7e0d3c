//! Auth facade.
//!
//! Each operation validates its request, runs inside a span carrying the
//! request ID, and is bounded by the context deadline. Errors keep the kind
//! the component returned; the facade only attaches the operation name.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{Instrument, debug, error, info, info_span, warn};
use validator::Validate;

use meshauth_core::config::RbacConfig;
use meshauth_core::error::{AppError, ErrorKind};
use meshauth_core::result::AppResult;
use meshauth_core::types::UserId;
use meshauth_entity::token::TokenKind;
use meshauth_entity::user::{CredentialRecord, UserProfile};
use meshauth_store::{ProfileRepository, bounded};

use crate::cleanup::CleanupReconciler;
use crate::credential::CredentialManager;
use crate::rbac::RbacEngine;
use crate::services::AuthServices;
use crate::session::SessionManager;
use crate::token::TokenService;

use super::context::RequestContext;
use super::request::{
    ChangePasswordRequest, CheckPermissionRequest, ForgotPasswordRequest, LoginRequest,
    LogoutRequest, RefreshRequest, RegisterRequest, ResetPasswordRequest, RevokeSessionRequest,
    RolePermissionRequest, TokenRequest, UserRequest,
};
use super::response::{
    AckResponse, CheckPermissionResponse, ClaimsResponse, CleanupResponse, LoginResponse,
    PermissionsResponse, RefreshResponse, RegisterResponse, RevokeAllResponse, SessionsResponse,
    StatsResponse, UserResponse,
};

/// Orchestrates the auth components behind one call per use case.
#[derive(Clone)]
pub struct AuthFacade {
    credentials: Arc<CredentialManager>,
    tokens: Arc<TokenService>,
    sessions: Arc<SessionManager>,
    rbac: Arc<RbacEngine>,
    cleanup: Arc<CleanupReconciler>,
    profiles: Arc<dyn ProfileRepository>,
    rbac_config: RbacConfig,
    store_timeout: std::time::Duration,
    logins_succeeded: Arc<AtomicU64>,
    logins_failed: Arc<AtomicU64>,
}

impl std::fmt::Debug for AuthFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthFacade")
            .field("rbac_config", &self.rbac_config)
            .finish()
    }
}

impl AuthFacade {
    /// Creates a facade over wired services.
    pub fn new(services: &AuthServices) -> Self {
        Self {
            credentials: services.credentials.clone(),
            tokens: services.tokens.clone(),
            sessions: services.sessions.clone(),
            rbac: services.rbac.clone(),
            cleanup: services.cleanup.clone(),
            profiles: services.profiles.clone(),
            rbac_config: services.config.rbac.clone(),
            store_timeout: services.config.store.operation_timeout(),
            logins_succeeded: Arc::new(AtomicU64::new(0)),
            logins_failed: Arc::new(AtomicU64::new(0)),
        }
    }

    async fn run<T, F>(&self, ctx: &RequestContext, op: &'static str, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let span = info_span!("auth", op, request_id = %ctx.request_id);
        let result = async {
            match tokio::time::timeout(ctx.timeout, fut).await {
                Ok(result) => result,
                Err(elapsed) => Err(AppError::from(elapsed)),
            }
        }
        .instrument(span)
        .await;

        result.map_err(|e| {
            match e.kind {
                ErrorKind::Internal | ErrorKind::TransientStoreFailure => {
                    error!(op, request_id = %ctx.request_id, error = %e, "Auth operation failed");
                }
                _ => debug!(op, request_id = %ctx.request_id, error = %e, "Auth operation rejected"),
            }
            e.with_context(op)
        })
    }

    async fn profile(&self, user_id: UserId) -> AppResult<Option<UserProfile>> {
        bounded(self.store_timeout, self.profiles.find(user_id)).await
    }

    /// Authenticates and opens a session.
    pub async fn login(&self, ctx: &RequestContext, req: LoginRequest) -> AppResult<LoginResponse> {
        self.run(ctx, "login", async {
            req.validate()?;

            let record = match self.credentials.verify(&req.username, &req.password).await {
                Ok(record) => record,
                Err(e) => {
                    if matches!(e.kind, ErrorKind::InvalidCredentials | ErrorKind::AccountLocked) {
                        self.logins_failed.fetch_add(1, Ordering::Relaxed);
                    }
                    return Err(e);
                }
            };

            let session = self.sessions.create(record.user_id, req.device).await?;
            let tokens = self
                .tokens
                .issue_pair(record.user_id, &record.username, &session)
                .await?;
            self.logins_succeeded.fetch_add(1, Ordering::Relaxed);

            let profile = self.profile(record.user_id).await?;
            info!(user_id = %record.user_id, session_id = %session.id, "Login successful");
            Ok(LoginResponse {
                tokens,
                session,
                user: UserResponse::new(&record, profile.as_ref()),
            })
        })
        .await
    }

    /// Creates an account, sends a verification token, and logs the user in.
    ///
    /// A failure after the credentials are written undoes the registration,
    /// so the same username and email can be registered again on retry.
    pub async fn register(
        &self,
        ctx: &RequestContext,
        req: RegisterRequest,
    ) -> AppResult<RegisterResponse> {
        self.run(ctx, "register", async {
            req.validate()?;

            let record = self
                .credentials
                .register(&req.username, &req.email, &req.password)
                .await?;

            match self.complete_registration(&record, &req).await {
                Ok(response) => {
                    info!(user_id = %record.user_id, "User registered");
                    Ok(response)
                }
                Err(e) => {
                    warn!(user_id = %record.user_id, error = %e, "Registration failed, rolling back");
                    self.undo_registration(record.user_id).await;
                    Err(e)
                }
            }
        })
        .await
    }

    async fn complete_registration(
        &self,
        record: &CredentialRecord,
        req: &RegisterRequest,
    ) -> AppResult<RegisterResponse> {
        let profile = UserProfile {
            user_id: record.user_id,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            created_at: record.created_at,
        };
        bounded(self.store_timeout, self.profiles.upsert(profile.clone())).await?;

        match self
            .rbac
            .find_role_by_name(&self.rbac_config.default_role)
            .await?
        {
            Some(role) => self.rbac.assign_role(record.user_id, role.id).await?,
            None => warn!(
                role = %self.rbac_config.default_role,
                "Default role does not exist, registering without a role"
            ),
        }

        self.credentials.issue_verification(record.user_id).await?;

        let session = self.sessions.create(record.user_id, req.device.clone()).await?;
        let tokens = self
            .tokens
            .issue_pair(record.user_id, &record.username, &session)
            .await?;

        Ok(RegisterResponse {
            user: UserResponse::new(record, Some(&profile)),
            tokens,
            session,
        })
    }

    /// Best-effort removal of everything a partial registration wrote.
    /// Credentials go last so the username stays reserved until the rest is
    /// gone.
    async fn undo_registration(&self, user_id: UserId) {
        if let Err(e) = self.sessions.revoke_all(user_id).await {
            error!(user_id = %user_id, error = %e, "Rollback failed to revoke sessions");
        }
        if let Ok(Some(role)) = self
            .rbac
            .find_role_by_name(&self.rbac_config.default_role)
            .await
        {
            if let Err(e) = self.rbac.remove_role(user_id, role.id).await {
                error!(user_id = %user_id, error = %e, "Rollback failed to remove default role");
            }
        }
        if let Err(e) = bounded(self.store_timeout, self.profiles.delete(user_id)).await {
            error!(user_id = %user_id, error = %e, "Rollback failed to delete profile");
        }
        if let Err(e) = self.credentials.delete(user_id).await {
            error!(user_id = %user_id, error = %e, "Rollback failed to delete credentials");
        }
    }

    /// Rotates a refresh token.
    pub async fn refresh(
        &self,
        ctx: &RequestContext,
        req: RefreshRequest,
    ) -> AppResult<RefreshResponse> {
        self.run(ctx, "refresh", async {
            req.validate()?;

            let rotated = self.tokens.rotate_refresh(&req.refresh_token).await?;
            if let Err(e) = self.sessions.touch(rotated.tokens.session_id).await {
                warn!(
                    session_id = %rotated.tokens.session_id,
                    error = %e,
                    "Failed to record session activity after refresh"
                );
            }
            Ok(rotated.tokens.into())
        })
        .await
    }

    /// Ends a session of the user: the named one, all of them, or the most
    /// recently active one.
    pub async fn logout(&self, ctx: &RequestContext, req: LogoutRequest) -> AppResult<AckResponse> {
        self.run(ctx, "logout", async {
            req.validate()?;

            if req.all_sessions {
                let count = self.sessions.revoke_all(req.user_id).await?;
                info!(user_id = %req.user_id, count, "Logged out of all sessions");
                return Ok(AckResponse::ok());
            }

            let session = match req.session_id {
                Some(session_id) => {
                    let session = self.sessions.find(session_id).await?;
                    if session.user_id != req.user_id {
                        return Err(AppError::session_not_found(format!(
                            "Session {session_id} not found"
                        )));
                    }
                    Some(session)
                }
                None => self.sessions.most_recent(req.user_id).await?,
            };

            match session {
                Some(session) => {
                    self.sessions.revoke(session.id, "logout").await?;
                    info!(user_id = %req.user_id, session_id = %session.id, "Logged out");
                }
                None => debug!(user_id = %req.user_id, "Logout with no active session"),
            }
            Ok(AckResponse::ok())
        })
        .await
    }

    /// Validates an access token.
    pub async fn validate_token(
        &self,
        ctx: &RequestContext,
        req: TokenRequest,
    ) -> AppResult<ClaimsResponse> {
        self.run(ctx, "validate_token", async {
            req.validate()?;
            Ok(self.tokens.validate_access(&req.token).await?.into())
        })
        .await
    }

    /// Revokes one token. A refresh token takes its session down with it.
    pub async fn revoke_token(
        &self,
        ctx: &RequestContext,
        req: TokenRequest,
    ) -> AppResult<AckResponse> {
        self.run(ctx, "revoke_token", async {
            req.validate()?;

            let revoked = self.tokens.revoke(&req.token).await?;
            if revoked.kind == TokenKind::Refresh {
                match self.sessions.revoke(revoked.session_id, "token_revoked").await {
                    Ok(_) => {}
                    Err(e) if e.kind == ErrorKind::SessionNotFound => {
                        debug!(session_id = %revoked.session_id, "Session already removed");
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(AckResponse::ok())
        })
        .await
    }

    /// Changes the password and ends every session of the user.
    pub async fn change_password(
        &self,
        ctx: &RequestContext,
        req: ChangePasswordRequest,
    ) -> AppResult<AckResponse> {
        self.run(ctx, "change_password", async {
            req.validate()?;

            self.credentials
                .change_password(req.user_id, &req.current_password, &req.new_password)
                .await?;
            self.sessions.revoke_all(req.user_id).await?;
            Ok(AckResponse::ok())
        })
        .await
    }

    /// Starts a password reset. Acks whether or not the email is known.
    pub async fn forgot_password(
        &self,
        ctx: &RequestContext,
        req: ForgotPasswordRequest,
    ) -> AppResult<AckResponse> {
        self.run(ctx, "forgot_password", async {
            req.validate()?;
            self.credentials.request_reset(&req.email).await?;
            Ok(AckResponse::ok())
        })
        .await
    }

    /// Completes a password reset and ends every session of the user.
    pub async fn reset_password(
        &self,
        ctx: &RequestContext,
        req: ResetPasswordRequest,
    ) -> AppResult<AckResponse> {
        self.run(ctx, "reset_password", async {
            req.validate()?;

            let user_id = self
                .credentials
                .reset_password(&req.token, &req.new_password)
                .await?;
            self.sessions.revoke_all(user_id).await?;
            Ok(AckResponse::ok())
        })
        .await
    }

    /// Redeems an email-verification token.
    pub async fn verify_email(
        &self,
        ctx: &RequestContext,
        req: TokenRequest,
    ) -> AppResult<AckResponse> {
        self.run(ctx, "verify_email", async {
            req.validate()?;
            self.credentials.verify_email(&req.token).await?;
            Ok(AckResponse::ok())
        })
        .await
    }

    /// Sends a new verification token.
    pub async fn resend_verification(
        &self,
        ctx: &RequestContext,
        req: UserRequest,
    ) -> AppResult<AckResponse> {
        self.run(ctx, "resend_verification", async {
            req.validate()?;
            self.credentials.resend_verification(req.user_id).await?;
            Ok(AckResponse::ok())
        })
        .await
    }

    /// Lists active sessions of a user.
    pub async fn list_sessions(
        &self,
        ctx: &RequestContext,
        req: UserRequest,
    ) -> AppResult<SessionsResponse> {
        self.run(ctx, "list_sessions", async {
            req.validate()?;
            Ok(SessionsResponse {
                sessions: self.sessions.list(req.user_id).await?,
            })
        })
        .await
    }

    /// Revokes one session. Repeating the call acks.
    pub async fn revoke_session(
        &self,
        ctx: &RequestContext,
        req: RevokeSessionRequest,
    ) -> AppResult<AckResponse> {
        self.run(ctx, "revoke_session", async {
            req.validate()?;

            if let Some(user_id) = req.user_id {
                let session = self.sessions.find(req.session_id).await?;
                if session.user_id != user_id {
                    return Err(AppError::session_not_found(format!(
                        "Session {} not found",
                        req.session_id
                    )));
                }
            }
            self.sessions.revoke(req.session_id, "revoked").await?;
            Ok(AckResponse::ok())
        })
        .await
    }

    /// Revokes every session of a user.
    pub async fn revoke_all_sessions(
        &self,
        ctx: &RequestContext,
        req: UserRequest,
    ) -> AppResult<RevokeAllResponse> {
        self.run(ctx, "revoke_all_sessions", async {
            req.validate()?;
            Ok(RevokeAllResponse {
                revoked_count: self.sessions.revoke_all(req.user_id).await?,
            })
        })
        .await
    }

    /// Returns the permission closure of a user.
    pub async fn get_permissions(
        &self,
        ctx: &RequestContext,
        req: UserRequest,
    ) -> AppResult<PermissionsResponse> {
        self.run(ctx, "get_permissions", async {
            req.validate()?;
            Ok(PermissionsResponse {
                permissions: self
                    .rbac
                    .get_permissions(req.user_id)
                    .await?
                    .into_iter()
                    .collect(),
            })
        })
        .await
    }

    /// Checks one permission.
    pub async fn check_permission(
        &self,
        ctx: &RequestContext,
        req: CheckPermissionRequest,
    ) -> AppResult<CheckPermissionResponse> {
        self.run(ctx, "check_permission", async {
            req.validate()?;
            Ok(CheckPermissionResponse {
                allowed: self
                    .rbac
                    .check(req.user_id, &req.resource, &req.action)
                    .await?,
            })
        })
        .await
    }

    /// Grants a permission to a role.
    pub async fn assign_permission(
        &self,
        ctx: &RequestContext,
        req: RolePermissionRequest,
    ) -> AppResult<AckResponse> {
        self.run(ctx, "assign_permission", async {
            req.validate()?;
            self.rbac.assign(req.role_id, req.permission_id).await?;
            Ok(AckResponse::ok())
        })
        .await
    }

    /// Withdraws a permission from a role.
    pub async fn revoke_permission(
        &self,
        ctx: &RequestContext,
        req: RolePermissionRequest,
    ) -> AppResult<AckResponse> {
        self.run(ctx, "revoke_permission", async {
            req.validate()?;
            self.rbac.revoke(req.role_id, req.permission_id).await?;
            Ok(AckResponse::ok())
        })
        .await
    }

    /// Current counts and counters.
    pub async fn get_stats(&self, ctx: &RequestContext) -> AppResult<StatsResponse> {
        self.run(ctx, "get_stats", async {
            Ok(StatsResponse {
                active_sessions: self.sessions.count_active().await?,
                active_tokens: self.tokens.count_active().await?,
                revoked_tokens: self.tokens.count_revoked().await?,
                locked_accounts: self.credentials.count_locked().await?,
                logins_succeeded: self.logins_succeeded.load(Ordering::Relaxed),
                logins_failed: self.logins_failed.load(Ordering::Relaxed),
                tokens_issued: self.tokens.tokens_issued(),
                replays_detected: self.tokens.replays_detected(),
            })
        })
        .await
    }

    /// Runs the token half of a cleanup pass.
    pub async fn cleanup_tokens(&self, ctx: &RequestContext) -> AppResult<CleanupResponse> {
        self.run(ctx, "cleanup_tokens", async {
            Ok(CleanupResponse {
                deleted_count: self.cleanup.sweep_tokens().await?,
            })
        })
        .await
    }

    /// Runs the session half of a cleanup pass.
    pub async fn cleanup_sessions(&self, ctx: &RequestContext) -> AppResult<CleanupResponse> {
        self.run(ctx, "cleanup_sessions", async {
            Ok(CleanupResponse {
                deleted_count: self.cleanup.sweep_sessions().await?,
            })
        })
        .await
    }
}
