//! Typed identifiers.
//!
//! Every entity key is a random v4 UUID behind its own newtype, so a
//! `SessionId` cannot stand in for a `TokenId`. They serialize as the bare
//! UUID string, which is also what ends up in JWT `sid`/`jti` claims.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_newtypes {
    ($($(#[$doc:meta])* $name:ident;)+) => {$(
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// A fresh random ID.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// The underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::try_parse(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    )+};
}

uuid_newtypes! {
    /// A user. Issued by the identity side; the auth core only references it.
    UserId;
    /// A login session, carried in tokens as `sid`.
    SessionId;
    /// An access or refresh token, carried as `jti`.
    TokenId;
    OneTimeTokenId;
    RoleId;
    PermissionId;
    /// Correlates the log lines of one facade call.
    RequestId;
}
