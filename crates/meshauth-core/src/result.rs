//! Convenience result type alias for MeshAuth.

use crate::error::AppError;

/// A specialized `Result` type for MeshAuth operations.
pub type AppResult<T> = Result<T, AppError>;
