//! Outbound notification capability (password-reset and verification mail).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::result::AppResult;
use crate::types::UserId;

/// A message the auth core asks the outside world to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A password-reset link or code.
    PasswordReset {
        /// Recipient user.
        user_id: UserId,
        /// Recipient address.
        email: String,
        /// The raw single-use token.
        token: String,
        /// When the token stops working.
        expires_at: DateTime<Utc>,
    },
    /// An email-verification link or code.
    EmailVerification {
        /// Recipient user.
        user_id: UserId,
        /// Recipient address.
        email: String,
        /// The raw single-use token.
        token: String,
        /// When the token stops working.
        expires_at: DateTime<Utc>,
    },
}

impl Notification {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PasswordReset { .. } => "password_reset",
            Self::EmailVerification { .. } => "email_verification",
        }
    }

    /// The recipient user.
    pub fn user_id(&self) -> UserId {
        match self {
            Self::PasswordReset { user_id, .. } | Self::EmailVerification { user_id, .. } => {
                *user_id
            }
        }
    }
}

/// Delivers notifications.
///
/// The core calls `notify` at most once per request and never retries;
/// delivery guarantees belong to the implementation.
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug + 'static {
    /// Hands a notification off for delivery.
    async fn notify(&self, notification: Notification) -> AppResult<()>;
}

/// Notifier that only records the dispatch in the log. The token value is
/// never written out.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> AppResult<()> {
        info!(
            kind = notification.kind(),
            user_id = %notification.user_id(),
            "Notification dispatched"
        );
        Ok(())
    }
}
