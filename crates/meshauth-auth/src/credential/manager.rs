//! Credential manager: login verification with lockout, registration,
//! password change and reset, and email verification.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use meshauth_core::config::AuthConfig;
use meshauth_core::error::{AppError, ErrorKind};
use meshauth_core::result::AppResult;
use meshauth_core::traits::{Clock, Notification, Notifier};
use meshauth_core::types::{OneTimeTokenId, UserId};
use meshauth_entity::token::{OneTimeToken, TokenPurpose};
use meshauth_entity::user::CredentialRecord;
use meshauth_store::{AttemptGate, CredentialRepository, OneTimeTokenRepository, bounded};

use super::hasher::PasswordHasher;
use super::policy::PasswordPolicy;
use super::secret::{generate_token, hash_token};

/// A freshly issued one-time token. `token` is the only copy of the raw
/// value; the store keeps its hash.
#[derive(Debug, Clone)]
pub struct IssuedOneTimeToken {
    /// The user the token was issued to.
    pub user_id: UserId,
    /// What it can be redeemed for.
    pub purpose: TokenPurpose,
    /// Raw token value.
    pub token: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

/// Owns credential records and the password-reset/verification token
/// lifecycle.
#[derive(Clone)]
pub struct CredentialManager {
    credentials: Arc<dyn CredentialRepository>,
    one_time_tokens: Arc<dyn OneTimeTokenRepository>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    hasher: PasswordHasher,
    policy: PasswordPolicy,
    config: AuthConfig,
    store_timeout: Duration,
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("policy", &self.policy)
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

impl CredentialManager {
    /// Creates a credential manager.
    pub fn new(
        credentials: Arc<dyn CredentialRepository>,
        one_time_tokens: Arc<dyn OneTimeTokenRepository>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
        store_timeout: Duration,
    ) -> Self {
        Self {
            credentials,
            one_time_tokens,
            notifier,
            clock,
            hasher: PasswordHasher::new(),
            policy: PasswordPolicy::new(&config),
            config,
            store_timeout,
        }
    }

    /// Looks a login up by username, falling back to email when it looks
    /// like an address.
    async fn find_by_login(&self, login: &str) -> AppResult<Option<CredentialRecord>> {
        let by_name = bounded(self.store_timeout, self.credentials.find_by_username(login)).await?;
        if by_name.is_some() || !login.contains('@') {
            return Ok(by_name);
        }
        bounded(self.store_timeout, self.credentials.find_by_email(login)).await
    }

    /// Fetches a record or fails with `NotFound`.
    pub async fn find(&self, user_id: UserId) -> AppResult<CredentialRecord> {
        bounded(self.store_timeout, self.credentials.find_by_id(user_id))
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {user_id} not found")))
    }

    /// Verifies a login (username or email) and password.
    ///
    /// The attempt is reserved against the lockout threshold before any hash
    /// work, so a locked account or a burst of parallel guesses never gets
    /// more than `max_failed_attempts` password checks. A correct password
    /// resets the counter.
    pub async fn verify(&self, login: &str, password: &str) -> AppResult<CredentialRecord> {
        let Some(record) = self.find_by_login(login).await? else {
            self.hasher.dummy_verify(password);
            debug!("Login attempt for unknown user");
            return Err(AppError::invalid_credentials());
        };

        let attempt = match self.begin_attempt(record.user_id).await? {
            AttemptGate::Admitted { attempt } => attempt,
            AttemptGate::Locked { until } => {
                warn!(user_id = %record.user_id, locked_until = %until, "Login attempt on locked account");
                return Err(AppError::account_locked());
            }
        };

        if !self.hasher.verify_password(password, &record.password_hash)? {
            if attempt >= self.config.max_failed_attempts {
                warn!(
                    user_id = %record.user_id,
                    failed_attempts = attempt,
                    "Account locked after repeated failures"
                );
            }
            return Err(AppError::invalid_credentials());
        }

        self.settle_success(record.user_id, attempt).await?;
        Ok(record)
    }

    /// Counts one failed attempt and locks the account when the threshold is
    /// reached. A locked account is left as it is.
    pub async fn record_failed_attempt(&self, user_id: UserId) -> AppResult<CredentialRecord> {
        if let AttemptGate::Admitted { attempt } = self.begin_attempt(user_id).await? {
            if attempt >= self.config.max_failed_attempts {
                warn!(
                    user_id = %user_id,
                    failed_attempts = attempt,
                    "Account locked after repeated failures"
                );
            }
        }
        self.find(user_id).await
    }

    /// Clears the failure counter and any lock, and stamps the login time.
    /// A failure counted concurrently keeps the state in place; returns
    /// whether it was cleared.
    pub async fn record_success(&self, user_id: UserId) -> AppResult<bool> {
        let record = self.find(user_id).await?;
        self.settle_success(user_id, record.failed_attempts).await
    }

    async fn settle_success(&self, user_id: UserId, attempt: u32) -> AppResult<bool> {
        let cleared = bounded(
            self.store_timeout,
            self.credentials
                .record_success(user_id, attempt, self.clock.now()),
        )
        .await?;
        if !cleared {
            debug!(user_id = %user_id, "Failures counted after this attempt were kept");
        }
        Ok(cleared)
    }

    /// Reserves one attempt for `user_id` against the lockout threshold.
    async fn begin_attempt(&self, user_id: UserId) -> AppResult<AttemptGate> {
        let now = self.clock.now();
        let lock_until = now + chrono::Duration::minutes(self.config.lockout_duration_minutes as i64);
        bounded(
            self.store_timeout,
            self.credentials.begin_attempt(
                user_id,
                self.config.max_failed_attempts,
                lock_until,
                now,
            ),
        )
        .await
    }

    /// Creates credentials for a new user.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> AppResult<CredentialRecord> {
        let username = username.trim();
        let len = username.chars().count();
        if !(3..=50).contains(&len) {
            return Err(AppError::validation(
                "Username must be between 3 and 50 characters",
            ));
        }
        self.policy.validate(password)?;

        let hash = self.hasher.hash_password(password)?;
        let record = CredentialRecord::new(UserId::new(), username, email.trim(), hash, self.clock.now());
        bounded(self.store_timeout, self.credentials.create(record.clone())).await?;

        info!(user_id = %record.user_id, "Credentials registered");
        Ok(record)
    }

    /// Removes a user's credentials, freeing the username and email.
    pub async fn delete(&self, user_id: UserId) -> AppResult<bool> {
        let deleted = bounded(self.store_timeout, self.credentials.delete(user_id)).await?;
        if deleted {
            info!(user_id = %user_id, "Credentials deleted");
        }
        Ok(deleted)
    }

    /// Replaces the password after checking the current one.
    ///
    /// A wrong current password is `InvalidCredentials` and does not count
    /// toward lockout.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let record = self.find(user_id).await?;
        if !self.hasher.verify_password(current_password, &record.password_hash)? {
            return Err(AppError::invalid_credentials());
        }

        self.policy.validate(new_password)?;
        self.policy.validate_not_same(current_password, new_password)?;

        let hash = self.hasher.hash_password(new_password)?;
        bounded(
            self.store_timeout,
            self.credentials.update_password_hash(user_id, hash, self.clock.now()),
        )
        .await?;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Issues a password-reset token for the account behind `email`.
    ///
    /// An unknown address yields `None`. Older unused reset tokens of the user
    /// stop working.
    pub async fn request_reset(&self, email: &str) -> AppResult<Option<IssuedOneTimeToken>> {
        let Some(record) = bounded(self.store_timeout, self.credentials.find_by_email(email)).await?
        else {
            debug!("Password reset requested for unknown email");
            return Ok(None);
        };

        let ttl = chrono::Duration::minutes(self.config.reset_token_ttl_minutes as i64);
        let issued = self
            .issue_one_time(&record, TokenPurpose::PasswordReset, ttl)
            .await?;
        Ok(Some(issued))
    }

    /// Redeems a reset token and sets a new password.
    ///
    /// The policy is checked and the new hash computed before the token is
    /// consumed, so a rejected password leaves the token usable. If the
    /// password write fails after redemption, the redemption is released and
    /// the same token can be retried.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<UserId> {
        self.policy.validate(new_password)?;
        let hash = self.hasher.hash_password(new_password)?;

        let consumed = self
            .consume_one_time(token, TokenPurpose::PasswordReset)
            .await?;

        let written = bounded(
            self.store_timeout,
            self.credentials
                .update_password_hash(consumed.user_id, hash, self.clock.now()),
        )
        .await;
        if let Err(e) = written {
            self.release_one_time(token, &consumed).await;
            return Err(e);
        }

        info!(user_id = %consumed.user_id, "Password reset completed");
        Ok(consumed.user_id)
    }

    /// Issues an email-verification token.
    pub async fn issue_verification(&self, user_id: UserId) -> AppResult<IssuedOneTimeToken> {
        let record = self.find(user_id).await?;
        let ttl = chrono::Duration::hours(self.config.verification_token_ttl_hours as i64);
        self.issue_one_time(&record, TokenPurpose::EmailVerification, ttl)
            .await
    }

    /// Reissues a verification token. An already verified address is a
    /// `Conflict`.
    pub async fn resend_verification(&self, user_id: UserId) -> AppResult<IssuedOneTimeToken> {
        let record = self.find(user_id).await?;
        if record.email_verified {
            return Err(AppError::conflict("Email is already verified"));
        }
        let ttl = chrono::Duration::hours(self.config.verification_token_ttl_hours as i64);
        self.issue_one_time(&record, TokenPurpose::EmailVerification, ttl)
            .await
    }

    /// Redeems a verification token and marks the address verified.
    pub async fn verify_email(&self, token: &str) -> AppResult<UserId> {
        let consumed = self
            .consume_one_time(token, TokenPurpose::EmailVerification)
            .await?;
        bounded(
            self.store_timeout,
            self.credentials
                .set_email_verified(consumed.user_id, self.clock.now()),
        )
        .await?;

        info!(user_id = %consumed.user_id, "Email verified");
        Ok(consumed.user_id)
    }

    /// Deletes expired one-time tokens.
    pub async fn sweep_one_time_tokens(&self) -> AppResult<u64> {
        bounded(
            self.store_timeout,
            self.one_time_tokens.delete_expired(self.clock.now()),
        )
        .await
    }

    /// Number of accounts currently locked.
    pub async fn count_locked(&self) -> AppResult<u64> {
        bounded(
            self.store_timeout,
            self.credentials.count_locked(self.clock.now()),
        )
        .await
    }

    async fn issue_one_time(
        &self,
        record: &CredentialRecord,
        purpose: TokenPurpose,
        ttl: chrono::Duration,
    ) -> AppResult<IssuedOneTimeToken> {
        let now = self.clock.now();
        let invalidated = bounded(
            self.store_timeout,
            self.one_time_tokens
                .invalidate_for_user(record.user_id, purpose, now),
        )
        .await?;
        if invalidated > 0 {
            debug!(user_id = %record.user_id, invalidated, "Superseded earlier one-time tokens");
        }

        let token = generate_token();
        let expires_at = now + ttl;
        bounded(
            self.store_timeout,
            self.one_time_tokens.insert(OneTimeToken {
                id: OneTimeTokenId::new(),
                user_id: record.user_id,
                purpose,
                token_hash: hash_token(&token),
                created_at: now,
                expires_at,
                used_at: None,
            }),
        )
        .await?;

        let notification = match purpose {
            TokenPurpose::PasswordReset => Notification::PasswordReset {
                user_id: record.user_id,
                email: record.email.clone(),
                token: token.clone(),
                expires_at,
            },
            TokenPurpose::EmailVerification => Notification::EmailVerification {
                user_id: record.user_id,
                email: record.email.clone(),
                token: token.clone(),
                expires_at,
            },
        };
        if let Err(e) = self.notifier.notify(notification).await {
            warn!(user_id = %record.user_id, error = %e, "Notification delivery failed");
        }

        Ok(IssuedOneTimeToken {
            user_id: record.user_id,
            purpose,
            token,
            expires_at,
        })
    }

    async fn consume_one_time(&self, token: &str, purpose: TokenPurpose) -> AppResult<OneTimeToken> {
        if token.is_empty() {
            return Err(AppError::one_time_token(ErrorKind::TokenNotFound));
        }
        bounded(
            self.store_timeout,
            self.one_time_tokens
                .consume(&hash_token(token), purpose, self.clock.now()),
        )
        .await
    }

    async fn release_one_time(&self, token: &str, consumed: &OneTimeToken) {
        let Some(used_at) = consumed.used_at else {
            return;
        };
        match bounded(
            self.store_timeout,
            self.one_time_tokens.release(&hash_token(token), used_at),
        )
        .await
        {
            Ok(true) => debug!(user_id = %consumed.user_id, "Released one-time token after failed write"),
            Ok(false) => {}
            Err(e) => {
                error!(user_id = %consumed.user_id, error = %e, "Failed to release one-time token");
            }
        }
    }
}
