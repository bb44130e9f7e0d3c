//! User identity records consumed by the auth core.

pub mod credential;
pub mod profile;

pub use credential::CredentialRecord;
pub use profile::UserProfile;
