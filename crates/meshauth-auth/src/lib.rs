//! # meshauth-auth
//!
//! The auth core of MeshAuth:
//!
//! - [`credential`]: password hashing, lockout, resets, email verification
//! - [`jwt`]: signed token encoding and decoding
//! - [`token`]: access/refresh issuance, rotation with replay detection, revocation
//! - [`session`]: session lifecycle with cascading revocation
//! - [`rbac`]: role and permission resolution with a cached closure
//! - [`cleanup`]: removal of expired tokens and sessions
//! - [`facade`]: one entry point per use case
//!
//! [`AuthServices`] wires them together.

pub mod cleanup;
pub mod credential;
pub mod facade;
pub mod jwt;
pub mod rbac;
pub mod services;
pub mod session;
pub mod token;

pub use facade::{AuthFacade, RequestContext};
pub use services::AuthServices;
