//! Removal of expired tokens and sessions.

pub mod reconciler;
pub mod scheduler;

pub use reconciler::{CleanupReconciler, SweepReport};
pub use scheduler::CleanupScheduler;
