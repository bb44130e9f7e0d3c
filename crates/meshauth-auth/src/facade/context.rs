//! Per-request execution context.

use std::time::Duration;

use meshauth_core::types::RequestId;

/// Default deadline for a facade call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Request ID and deadline supplied by the transport.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    /// Correlation ID for logs.
    pub request_id: RequestId,
    /// Upper bound on the whole call.
    pub timeout: Duration,
}

impl RequestContext {
    /// A fresh context with the given deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            request_id: RequestId::new(),
            timeout,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }
}
