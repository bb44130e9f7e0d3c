//! # meshauth-entity
//!
//! Plain data records shared by the stores and the auth components.
//! Records carry no behaviour beyond state predicates evaluated against a
//! caller-supplied instant.

pub mod rbac;
pub mod session;
pub mod token;
pub mod user;

pub use rbac::{Permission, PermissionKey, Role, RolePermission, UserRole};
pub use session::{DeviceInfo, Session, SessionState};
pub use token::{OneTimeToken, RevocationReason, TokenKind, TokenPurpose, TokenRecord};
pub use user::{CredentialRecord, UserProfile};
