//! Fixed-delay retry policy for idempotent reads.

use std::time::Duration;

use bytes::Bytes;
use tower::retry::Policy;
use tracing::warn;

use crate::{Error, Request, Response};

/// Retries failed GET requests a fixed number of times.
///
/// A failure is a transport error or a response with status 400 or above.
/// Every attempt waits `delay` first. Other methods are sent once.
///
/// # Example
///
/// ```ignore
/// use relay::middleware::RetryPolicy;
/// use tower::retry::RetryLayer;
///
/// let service = ServiceBuilder::new()
///     .layer(RetryLayer::new(RetryPolicy::new(2, Duration::from_secs(1))))
///     .service(transport);
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    remaining: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Create a policy allowing `max_retries` extra attempts.
    #[must_use]
    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            remaining: max_retries,
            delay,
        }
    }

    fn is_failure(result: &Result<Response<Bytes>, Error>) -> bool {
        match result {
            Ok(response) => response.is_failure(),
            Err(_) => true,
        }
    }
}

impl Policy<Request<Bytes>, Response<Bytes>, Error> for RetryPolicy {
    type Future = tokio::time::Sleep;

    fn retry(
        &mut self,
        req: &mut Request<Bytes>,
        result: &mut Result<Response<Bytes>, Error>,
    ) -> Option<Self::Future> {
        if !req.method().is_get() || self.remaining == 0 || !Self::is_failure(result) {
            return None;
        }

        self.remaining -= 1;
        match result {
            Ok(response) => warn!(
                url = %req.url(),
                status = response.status(),
                remaining = self.remaining,
                "retrying request"
            ),
            Err(err) => warn!(
                url = %req.url(),
                error = %err,
                remaining = self.remaining,
                "retrying request"
            ),
        }

        Some(tokio::time::sleep(self.delay))
    }

    fn clone_request(&mut self, req: &Request<Bytes>) -> Option<Request<Bytes>> {
        req.method().is_get().then(|| req.clone())
    }
}
