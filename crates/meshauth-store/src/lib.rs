//! # meshauth-store
//!
//! Persistence seams for the auth core. Each persisted concern has its own
//! repository trait in [`repositories`]; [`memory`] provides concurrent
//! in-process implementations built on sharded maps, where every mutation of
//! one entity happens under that entity's entry lock.
//!
//! Callers bound every store call with [`bounded`].

pub mod memory;
pub mod repositories;
pub mod timeout;

pub use memory::MemoryStores;
pub use repositories::{
    AttemptGate, ConsumeOutcome, CredentialRepository, DenylistRepository,
    OneTimeTokenRepository, ProfileRepository, RbacRepository, SessionRepository,
    TokenRepository,
};
pub use timeout::bounded;
