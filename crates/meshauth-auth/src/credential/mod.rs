//! Credential verification, lockout, password changes, and one-time tokens.

pub mod hasher;
pub mod manager;
pub mod policy;
pub mod secret;

pub use hasher::PasswordHasher;
pub use manager::{CredentialManager, IssuedOneTimeToken};
pub use policy::PasswordPolicy;
