//! Shared value types.

pub mod id;

pub use id::{OneTimeTokenId, PermissionId, RequestId, RoleId, SessionId, TokenId, UserId};
