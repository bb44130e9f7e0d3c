//! Role-based access control.

pub mod engine;

pub use engine::RbacEngine;
