//! Token issuance, validation, rotation, and revocation.

pub mod service;

pub use service::{RevokedToken, RotatedPair, TokenPair, TokenService};
