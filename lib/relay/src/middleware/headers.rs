//! Default header injection.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, header};
use tower::{Layer, Service};

use crate::{DEFAULT_APP_VERSION, NormalizedError, Request, Response};

const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");
const X_APP_VERSION: HeaderName = HeaderName::from_static("x-app-version");

/// Layer that sets the standard headers on every request.
///
/// `Content-Type` and `Accept` are `application/json`, `X-Requested-With`
/// is `XMLHttpRequest` and `X-App-Version` carries the configured version.
/// Existing values for those names are replaced; every other header passes
/// through untouched.
#[derive(Debug, Clone)]
pub struct DefaultHeadersLayer {
    headers: Arc<HeaderMap>,
}

impl DefaultHeadersLayer {
    /// Create the layer for the given application version.
    ///
    /// A version that is not a valid header value falls back to
    /// [`DEFAULT_APP_VERSION`].
    #[must_use]
    pub fn new(app_version: &str) -> Self {
        let version = HeaderValue::from_str(app_version).unwrap_or_else(|_| {
            tracing::warn!(app_version, "invalid app version header, using default");
            HeaderValue::from_static(DEFAULT_APP_VERSION)
        });

        let json = HeaderValue::from_static("application/json");
        let mut headers = HeaderMap::with_capacity(4);
        headers.insert(header::CONTENT_TYPE, json.clone());
        headers.insert(header::ACCEPT, json);
        headers.insert(X_REQUESTED_WITH, HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(X_APP_VERSION, version);

        Self {
            headers: Arc::new(headers),
        }
    }

    /// Headers applied to each request.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl Default for DefaultHeadersLayer {
    fn default() -> Self {
        Self::new(DEFAULT_APP_VERSION)
    }
}

impl<S> Layer<S> for DefaultHeadersLayer {
    type Service = DefaultHeaders<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DefaultHeaders {
            inner,
            headers: Arc::clone(&self.headers),
        }
    }
}

/// Service that sets the standard headers.
#[derive(Debug, Clone)]
pub struct DefaultHeaders<S> {
    inner: S,
    headers: Arc<HeaderMap>,
}

impl<S> Service<Request<Bytes>> for DefaultHeaders<S>
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
        let request = request.with_headers(&self.headers);
        tracing::debug!(
            method = %request.method(),
            url = %request.url(),
            headers = ?request.headers().keys().collect::<Vec<_>>(),
            "request headers set"
        );
        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(request).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_headers() {
        let layer = DefaultHeadersLayer::default();
        let headers = layer.headers();

        assert_eq!(headers.len(), 4);
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers["accept"], "application/json");
        assert_eq!(headers["x-requested-with"], "XMLHttpRequest");
        assert_eq!(headers["x-app-version"], "1.0.0");
    }

    #[test]
    fn custom_version() {
        let layer = DefaultHeadersLayer::new("2.3.1");
        assert_eq!(layer.headers()["x-app-version"], "2.3.1");
    }

    #[test]
    fn invalid_version_falls_back() {
        let layer = DefaultHeadersLayer::new("bad\nversion");
        assert_eq!(layer.headers()["x-app-version"], DEFAULT_APP_VERSION);
    }
}
