//! Concurrent in-memory stores.

pub mod credential;
pub mod denylist;
pub mod one_time;
pub mod profile;
pub mod rbac;
pub mod session;
pub mod token;

use std::sync::Arc;

pub use credential::MemoryCredentialStore;
pub use denylist::MemoryDenylist;
pub use one_time::MemoryOneTimeTokenStore;
pub use profile::MemoryProfileStore;
pub use rbac::MemoryRbacStore;
pub use session::MemorySessionStore;
pub use token::MemoryTokenStore;

use crate::repositories::{
    CredentialRepository, DenylistRepository, OneTimeTokenRepository, ProfileRepository,
    RbacRepository, SessionRepository, TokenRepository,
};

/// One handle per repository, shared by the auth components.
#[derive(Debug, Clone)]
pub struct MemoryStores {
    /// Credential records.
    pub credentials: Arc<dyn CredentialRepository>,
    /// User profiles.
    pub profiles: Arc<dyn ProfileRepository>,
    /// Sessions.
    pub sessions: Arc<dyn SessionRepository>,
    /// Access/refresh token records.
    pub tokens: Arc<dyn TokenRepository>,
    /// Revocation denylist.
    pub denylist: Arc<dyn DenylistRepository>,
    /// Reset and verification tokens.
    pub one_time_tokens: Arc<dyn OneTimeTokenRepository>,
    /// Roles and permissions.
    pub rbac: Arc<dyn RbacRepository>,
}

impl MemoryStores {
    /// Fresh, empty stores.
    pub fn new() -> Self {
        Self {
            credentials: Arc::new(MemoryCredentialStore::new()),
            profiles: Arc::new(MemoryProfileStore::new()),
            sessions: Arc::new(MemorySessionStore::new()),
            tokens: Arc::new(MemoryTokenStore::new()),
            denylist: Arc::new(MemoryDenylist::new()),
            one_time_tokens: Arc::new(MemoryOneTimeTokenStore::new()),
            rbac: Arc::new(MemoryRbacStore::new()),
        }
    }
}

impl Default for MemoryStores {
    fn default() -> Self {
        Self::new()
    }
}
