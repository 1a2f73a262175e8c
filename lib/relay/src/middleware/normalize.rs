//! Retry and error classification.
//!
//! This is the innermost step of the pipeline. It wraps the transport in a
//! [`Retry`] driven by [`RetryPolicy`] and turns whatever remains after the
//! last attempt into a [`NormalizedError`]: transport failures become
//! client errors, and any response with status 400 or above becomes a server
//! error carrying the status code.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use tower::retry::Retry;
use tower::{Layer, Service};
use tracing::{error, warn};

use super::RetryPolicy;
use crate::{Error, NormalizedError, Request, Response};

/// Layer that retries GET requests and normalizes failures.
#[derive(Debug, Clone)]
pub struct NormalizeErrorsLayer {
    policy: RetryPolicy,
}

impl NormalizeErrorsLayer {
    /// Create the layer with `retries` extra attempts spaced by `delay`.
    #[must_use]
    pub const fn new(retries: u32, delay: Duration) -> Self {
        Self {
            policy: RetryPolicy::new(retries, delay),
        }
    }
}

impl<S> Layer<S> for NormalizeErrorsLayer {
    type Service = NormalizeErrors<Retry<RetryPolicy, S>>;

    fn layer(&self, inner: S) -> Self::Service {
        NormalizeErrors {
            inner: Retry::new(self.policy.clone(), inner),
        }
    }
}

/// Service that maps transport results into the pipeline's error type.
#[derive(Debug, Clone)]
pub struct NormalizeErrors<S> {
    inner: S,
}

impl<S> NormalizeErrors<S> {
    /// Wrap a service without retrying.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }
}

fn normalize(result: Result<Response<Bytes>, Error>) -> Result<Response<Bytes>, NormalizedError> {
    let normalized = match result {
        Ok(response) if response.is_failure() => NormalizedError::from_status(response.status()),
        Ok(response) => return Ok(response),
        Err(err) => NormalizedError::from(err),
    };

    match normalized.status() {
        Some(401) => warn!("unauthorized, the session token is missing or expired"),
        Some(403) => warn!("forbidden, the current user lacks permission"),
        Some(404) => warn!("resource not found"),
        Some(500) => error!("internal server error"),
        Some(503) => error!("service unavailable"),
        _ => {}
    }

    Err(normalized)
}

impl<S> Service<Request<Bytes>> for NormalizeErrors<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Bytes>;
    type Error = NormalizedError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(NormalizedError::from)
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let mut inner = self.inner.clone();
        Box::pin(async move { normalize(inner.call(request).await) })
    }
}
