//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use validator::Validate;

use meshauth_core::types::{PermissionId, RoleId, SessionId, UserId};
use meshauth_entity::session::DeviceInfo;

/// Login request. `username` may also be an email address.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    /// Username or email.
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    /// Password.
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    /// Client metadata.
    #[serde(default)]
    pub device: DeviceInfo,
}

/// Registration request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Username.
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
    /// Email.
    #[validate(email(message = "Email is invalid"))]
    pub email: String,
    /// Password.
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    /// Given name.
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    /// Family name.
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    /// Client metadata.
    #[serde(default)]
    pub device: DeviceInfo,
}

/// Token refresh request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RefreshRequest {
    /// Refresh token.
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Logout request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LogoutRequest {
    /// The user logging out.
    pub user_id: UserId,
    /// Session to end. Defaults to the most recently active one.
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// End every session of the user.
    #[serde(default)]
    pub all_sessions: bool,
}

/// A request carrying one token.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TokenRequest {
    /// The token.
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

/// Password change request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    /// The user.
    pub user_id: UserId,
    /// Current password.
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    /// New password.
    #[validate(length(min = 1, message = "New password is required"))]
    pub new_password: String,
}

/// Forgot-password request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    /// Account email.
    #[validate(email(message = "Email is invalid"))]
    pub email: String,
}

/// Password reset request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    /// Reset token from the notification.
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
    /// New password.
    #[validate(length(min = 1, message = "New password is required"))]
    pub new_password: String,
}

/// A request naming one user.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UserRequest {
    /// The user.
    pub user_id: UserId,
}

/// Session revocation request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RevokeSessionRequest {
    /// Session to revoke.
    pub session_id: SessionId,
    /// When set, the session must belong to this user.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// Permission check request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CheckPermissionRequest {
    /// The user.
    pub user_id: UserId,
    /// Resource name.
    #[validate(length(min = 1, message = "Resource is required"))]
    pub resource: String,
    /// Action name.
    #[validate(length(min = 1, message = "Action is required"))]
    pub action: String,
}

/// Role/permission relation request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RolePermissionRequest {
    /// Role.
    pub role_id: RoleId,
    /// Permission.
    pub permission_id: PermissionId,
}
