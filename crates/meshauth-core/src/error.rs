//! Unified application error types for MeshAuth.
//!
//! Components return the most specific [`ErrorKind`] they can. Callers above
//! them (the facade in particular) never reclassify an error; they only attach
//! context with [`AppError::with_context`].

use std::fmt;
use thiserror::Error;

/// Message shared by every authentication failure so that a caller cannot
/// tell a wrong password from a locked or unknown account.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid username or password";

/// Message shared by every failed password-reset or email-verification
/// token redemption.
pub const INVALID_ONE_TIME_TOKEN_MESSAGE: &str = "Invalid or expired token";

/// Error categories surfaced by the auth core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// Malformed or missing input. The caller's fault; never retried.
    Validation,
    /// Unknown user or wrong password.
    InvalidCredentials,
    /// The account is temporarily locked after repeated failures.
    AccountLocked,
    /// The token (or the session behind it) is past its expiry.
    TokenExpired,
    /// The token (or the session behind it) was revoked.
    TokenRevoked,
    /// No record exists for the presented token.
    TokenNotFound,
    /// The token is malformed, has a bad signature, or is of the wrong type.
    TokenInvalid,
    /// No session exists with the given identifier.
    SessionNotFound,
    /// The caller lacks the required permission.
    PermissionDenied,
    /// A single-use token was already redeemed.
    AlreadyUsed,
    /// A referenced role, permission, or user does not exist.
    NotFound,
    /// A uniqueness constraint or state precondition was violated.
    Conflict,
    /// A store did not answer in time or is unavailable. Safe to retry.
    TransientStoreFailure,
    /// Unexpected or unclassified failure.
    Internal,
    /// Invalid configuration.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "VALIDATION_ERROR"),
            Self::InvalidCredentials => write!(f, "INVALID_CREDENTIALS"),
            Self::AccountLocked => write!(f, "ACCOUNT_LOCKED"),
            Self::TokenExpired => write!(f, "TOKEN_EXPIRED"),
            Self::TokenRevoked => write!(f, "TOKEN_REVOKED"),
            Self::TokenNotFound => write!(f, "TOKEN_NOT_FOUND"),
            Self::TokenInvalid => write!(f, "TOKEN_INVALID"),
            Self::SessionNotFound => write!(f, "SESSION_NOT_FOUND"),
            Self::PermissionDenied => write!(f, "PERMISSION_DENIED"),
            Self::AlreadyUsed => write!(f, "ALREADY_USED"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::TransientStoreFailure => write!(f, "TRANSIENT_STORE_FAILURE"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
        }
    }
}

/// The unified application error used throughout MeshAuth.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable message, safe to hand back to the caller.
    pub message: String,
    /// Request context attached on the way out (operation name, etc.).
    pub context: Option<String>,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
            source: Some(Box::new(source)),
        }
    }

    /// Attaches request context without changing the kind or message.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Whether the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::TransientStoreFailure)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create an invalid-credentials error with the generic message.
    pub fn invalid_credentials() -> Self {
        Self::new(ErrorKind::InvalidCredentials, INVALID_CREDENTIALS_MESSAGE)
    }

    /// Create an account-locked error. The message is identical to
    /// [`AppError::invalid_credentials`].
    pub fn account_locked() -> Self {
        Self::new(ErrorKind::AccountLocked, INVALID_CREDENTIALS_MESSAGE)
    }

    /// Create a token-expired error.
    pub fn token_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TokenExpired, message)
    }

    /// Create a token-revoked error.
    pub fn token_revoked(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TokenRevoked, message)
    }

    /// Create a token-not-found error.
    pub fn token_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TokenNotFound, message)
    }

    /// Create a token-invalid error.
    pub fn token_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TokenInvalid, message)
    }

    /// Create a session-not-found error.
    pub fn session_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SessionNotFound, message)
    }

    /// Create a permission-denied error.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    /// Failure to redeem a one-time token. The kind stays specific
    /// (`TokenExpired`, `AlreadyUsed`, `TokenNotFound`) while the message is
    /// the same for all of them.
    pub fn one_time_token(kind: ErrorKind) -> Self {
        Self::new(kind, INVALID_ONE_TIME_TOKEN_MESSAGE)
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create a transient store failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientStoreFailure, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            context: self.context.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = err
            .field_errors()
            .iter()
            .map(|(field, errors)| {
                let detail = errors
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{field}: {detail}")
            })
            .collect();
        fields.sort();
        Self::with_source(ErrorKind::Validation, fields.join("; "), err)
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::with_source(
            ErrorKind::TransientStoreFailure,
            "Operation timed out",
            err,
        )
    }
}
