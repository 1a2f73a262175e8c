//! Request/response logging middleware.
//!
//! This middleware logs requests and their outcome using the `tracing` crate.
//! It only observes: the request and the result are passed on unchanged.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::time::Instant;
use tower::{Layer, Service};
use tracing::{Instrument, Level, debug, info, span, warn};

use crate::{HeaderMap, NormalizedError, Request, Response};

const BODY_PREVIEW_LEN: usize = 256;
const REDACTED: &str = "<redacted>";

/// Layer that adds request/response logging.
///
/// A disabled layer forwards requests without logging anything.
///
/// # Example
///
/// ```ignore
/// use relay::middleware::LoggingLayer;
/// use tower::ServiceBuilder;
///
/// let service = ServiceBuilder::new()
///     .layer(LoggingLayer::new(config.development))
///     .service(inner);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LoggingLayer {
    enabled: bool,
}

impl Default for LoggingLayer {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl LoggingLayer {
    /// Create a logging layer, active only when `enabled` is set.
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Returns `true` if the layer logs.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = Logging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging {
            inner,
            enabled: self.enabled,
        }
    }
}

/// Service that logs requests and responses.
#[derive(Debug, Clone)]
pub struct Logging<S> {
    inner: S,
    enabled: bool,
}

fn body_preview(body: &Bytes) -> String {
    let end = body.len().min(BODY_PREVIEW_LEN);
    String::from_utf8_lossy(body.get(..end).unwrap_or(body)).into_owned()
}

/// `name=value` pairs; sensitive values are redacted.
fn header_pairs(headers: &HeaderMap) -> Vec<String> {
    headers
        .iter()
        .map(|(name, value)| {
            if value.is_sensitive() {
                format!("{name}={REDACTED}")
            } else {
                format!("{name}={}", String::from_utf8_lossy(value.as_bytes()))
            }
        })
        .collect()
}

impl<S> Service<Request<Bytes>> for Logging<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>, Error = NormalizedError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = Response<Bytes>;
    type Error = NormalizedError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let mut inner = self.inner.clone();

        if !self.enabled {
            return Box::pin(async move { inner.call(request).await });
        }

        let method = request.method();
        let url = request.url().to_string();

        let span = span!(Level::INFO, "http_request", %method, %url);

        Box::pin(
            async move {
                let start = Instant::now();

                debug!(
                    headers = ?header_pairs(request.headers()),
                    body_len = request.body().map_or(0, Bytes::len),
                    body = ?request.body().map(body_preview),
                    "request details"
                );
                info!(%method, %url, "sending request");

                let result = inner.call(request).await;

                // Saturating conversion to u64 (truncates after ~584 million years)
                let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                match &result {
                    Ok(response) => {
                        info!(status = response.status(), elapsed_ms, "request completed");
                    }
                    Err(err) => {
                        warn!(
                            status = ?err.status(),
                            message = err.message(),
                            elapsed_ms,
                            "request failed"
                        );
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
