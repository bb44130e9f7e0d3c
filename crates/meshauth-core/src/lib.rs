//! # meshauth-core
//!
//! Core crate for MeshAuth. Contains configuration schemas, typed
//! identifiers, the capability traits injected into the auth components
//! (clock, notifier), and the unified error system.
//!
//! This crate has **no** internal dependencies on other MeshAuth crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
