//! Deadline enforcement for store calls.

use std::future::Future;
use std::time::Duration;

use meshauth_core::error::AppError;
use meshauth_core::result::AppResult;

/// Runs a store call under `limit`. An elapsed deadline becomes a
/// retryable `TransientStoreFailure`.
pub async fn bounded<T, F>(limit: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(elapsed) => Err(AppError::from(elapsed)),
    }
}
