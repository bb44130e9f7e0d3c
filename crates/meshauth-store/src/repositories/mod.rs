//! Repository traits, one per persisted concern.
//!
//! Every mutating method is atomic per entity. Methods that take `now` use it
//! for state checks and timestamps so the caller's clock stays authoritative.

pub mod credential;
pub mod denylist;
pub mod one_time;
pub mod profile;
pub mod rbac;
pub mod session;
pub mod token;

pub use credential::{AttemptGate, CredentialRepository};
pub use denylist::DenylistRepository;
pub use one_time::OneTimeTokenRepository;
pub use profile::ProfileRepository;
pub use rbac::RbacRepository;
pub use session::SessionRepository;
pub use token::{ConsumeOutcome, TokenRepository};
