//! Token domain entities.

pub mod one_time;
pub mod record;

pub use one_time::{OneTimeToken, TokenPurpose};
pub use record::{RevocationReason, TokenKind, TokenRecord};
