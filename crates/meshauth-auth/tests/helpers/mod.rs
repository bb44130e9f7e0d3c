//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use meshauth_auth::facade::request::{LoginRequest, RegisterRequest};
use meshauth_auth::facade::response::{LoginResponse, RegisterResponse};
use meshauth_auth::{AuthFacade, AuthServices, RequestContext};
use meshauth_core::config::AppConfig;
use meshauth_core::error::AppError;
use meshauth_core::result::AppResult;
use meshauth_core::traits::{Clock, ManualClock, Notification, Notifier};
use meshauth_core::types::UserId;
use meshauth_entity::session::DeviceInfo;
use meshauth_entity::user::{CredentialRecord, UserProfile};
use meshauth_store::memory::{MemoryCredentialStore, MemoryProfileStore};
use meshauth_store::{AttemptGate, CredentialRepository, MemoryStores, ProfileRepository};

/// Notifier that keeps every notification for inspection.
#[derive(Debug, Default)]
pub struct CapturingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl CapturingNotifier {
    /// Raw token of the newest password-reset notification.
    pub fn last_reset_token(&self) -> Option<String> {
        self.sent.lock().unwrap().iter().rev().find_map(|n| match n {
            Notification::PasswordReset { token, .. } => Some(token.clone()),
            _ => None,
        })
    }

    /// Raw token of the newest email-verification notification.
    pub fn last_verification_token(&self) -> Option<String> {
        self.sent.lock().unwrap().iter().rev().find_map(|n| match n {
            Notification::EmailVerification { token, .. } => Some(token.clone()),
            _ => None,
        })
    }

    /// Number of notifications sent so far.
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for CapturingNotifier {
    async fn notify(&self, notification: Notification) -> AppResult<()> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

/// Fails the next `n` calls of one operation with a transient store error.
#[derive(Debug, Default)]
pub struct FailNext(AtomicU32);

impl FailNext {
    /// Arm the next `n` calls to fail
    pub fn arm(&self, n: u32) {
        self.0.store(n, Ordering::SeqCst);
    }

    fn check(&self, op: &str) -> AppResult<()> {
        let tripped = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            return Err(AppError::transient(format!("{op} timed out")));
        }
        Ok(())
    }
}

/// Profile store whose upserts can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyProfiles {
    inner: MemoryProfileStore,
    /// Failure switch for `upsert`
    pub upsert: FailNext,
}

#[async_trait]
impl ProfileRepository for FlakyProfiles {
    async fn upsert(&self, profile: UserProfile) -> AppResult<()> {
        self.upsert.check("profiles.upsert")?;
        self.inner.upsert(profile).await
    }

    async fn find(&self, user_id: UserId) -> AppResult<Option<UserProfile>> {
        self.inner.find(user_id).await
    }

    async fn delete(&self, user_id: UserId) -> AppResult<bool> {
        self.inner.delete(user_id).await
    }
}

/// Credential store whose password writes can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyCredentials {
    inner: MemoryCredentialStore,
    /// Failure switch for `update_password_hash`
    pub update_password_hash: FailNext,
}

#[async_trait]
impl CredentialRepository for FlakyCredentials {
    async fn create(&self, record: CredentialRecord) -> AppResult<()> {
        self.inner.create(record).await
    }

    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<CredentialRecord>> {
        self.inner.find_by_id(user_id).await
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<CredentialRecord>> {
        self.inner.find_by_username(username).await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<CredentialRecord>> {
        self.inner.find_by_email(email).await
    }

    async fn begin_attempt(
        &self,
        user_id: UserId,
        threshold: u32,
        lock_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<AttemptGate> {
        self.inner
            .begin_attempt(user_id, threshold, lock_until, now)
            .await
    }

    async fn record_success(
        &self,
        user_id: UserId,
        attempt: u32,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        self.inner.record_success(user_id, attempt, now).await
    }

    async fn delete(&self, user_id: UserId) -> AppResult<bool> {
        self.inner.delete(user_id).await
    }

    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.update_password_hash.check("credentials.update_password_hash")?;
        self.inner
            .update_password_hash(user_id, password_hash, now)
            .await
    }

    async fn set_email_verified(&self, user_id: UserId, now: DateTime<Utc>) -> AppResult<()> {
        self.inner.set_email_verified(user_id, now).await
    }

    async fn count_locked(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.inner.count_locked(now).await
    }
}

/// Test application context
pub struct TestApp {
    /// Wired components
    pub services: AuthServices,
    /// The facade under test
    pub facade: AuthFacade,
    /// Clock shared by every component
    pub clock: Arc<ManualClock>,
    /// Captured notifications
    pub notifier: Arc<CapturingNotifier>,
}

impl TestApp {
    /// Create a new test application over empty in-memory stores
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Create a test application with custom configuration
    pub fn with_config(config: AppConfig) -> Self {
        Self::with_stores(config, MemoryStores::new())
    }

    /// Create a test application over the given stores
    pub fn with_stores(config: AppConfig, stores: MemoryStores) -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let notifier = Arc::new(CapturingNotifier::default());
        let services = AuthServices::build(config, stores, notifier.clone(), clock.clone())
        .expect("Failed to build auth services");
        let facade = services.facade();

        Self {
            services,
            facade,
            clock,
            notifier,
        }
    }

    /// A fresh request context
    pub fn ctx(&self) -> RequestContext {
        RequestContext::default()
    }

    /// Register a user with fixed profile fields
    pub async fn register(&self, username: &str, email: &str, password: &str) -> RegisterResponse {
        self.facade
            .register(&self.ctx(), register_request(username, email, password))
            .await
            .expect("Registration failed")
    }

    /// Log in and return the full response
    pub async fn login(&self, username: &str, password: &str) -> LoginResponse {
        self.facade
            .login(&self.ctx(), login_request(username, password))
            .await
            .expect("Login failed")
    }

    /// Current time on the shared clock
    pub fn clock_now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Move time forward by whole seconds
    pub fn advance_secs(&self, secs: i64) {
        self.clock.advance(chrono::Duration::seconds(secs));
    }
}

/// Configuration used by every test
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = "integration-test-secret".to_string();
    config
}

/// Build a login request
pub fn login_request(username: &str, password: &str) -> LoginRequest {
    LoginRequest {
        username: username.to_string(),
        password: password.to_string(),
        device: DeviceInfo {
            user_agent: Some("integration-test".to_string()),
            ..Default::default()
        },
    }
}

/// Build a register request
pub fn register_request(username: &str, email: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        device: DeviceInfo::default(),
    }
}
