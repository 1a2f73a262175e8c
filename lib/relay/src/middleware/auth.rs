//! Bearer token injection backed by a shared token store.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::task::{Context, Poll};

use bytes::Bytes;
use http::{HeaderValue, header};
use tower::{Layer, Service};

use crate::{NormalizedError, PathMatcher, Request, Response};

/// Shared holder for the current session token.
///
/// Clones share the same slot: a token set through one handle is seen by
/// every pipeline holding another.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    token: Arc<RwLock<Option<Arc<str>>>>,
}

impl TokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a token, replacing any previous one.
    pub fn set(&self, token: impl Into<String>) {
        let token: Arc<str> = Arc::from(token.into());
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// Forget the current token.
    pub fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// The current token, if any.
    #[must_use]
    pub fn token(&self) -> Option<Arc<str>> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns `true` when a non-empty token is stored.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some_and(|token| !token.is_empty())
    }
}

/// Layer that adds `Authorization: Bearer <token>` to protected requests.
///
/// Requests whose URL matches one of the public paths, or that are sent
/// while the store holds no token, pass through unchanged.
#[derive(Debug, Clone)]
pub struct AuthLayer {
    tokens: TokenStore,
    public_paths: PathMatcher,
}

impl AuthLayer {
    /// Create the layer over a token store and a public path list.
    #[must_use]
    pub const fn new(tokens: TokenStore, public_paths: PathMatcher) -> Self {
        Self {
            tokens,
            public_paths,
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = Auth<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Auth {
            inner,
            tokens: self.tokens.clone(),
            public_paths: self.public_paths.clone(),
        }
    }
}

/// Service that attaches the bearer token.
#[derive(Debug, Clone)]
pub struct Auth<S> {
    inner: S,
    tokens: TokenStore,
    public_paths: PathMatcher,
}

impl<S> Auth<S> {
    fn authorize(&self, request: Request<Bytes>) -> Request<Bytes> {
        if self.public_paths.matches(request.url_with_params()) {
            return request;
        }

        let Some(token) = self.tokens.token().filter(|token| !token.is_empty()) else {
            return request;
        };

        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                request.with_header(header::AUTHORIZATION, value)
            }
            Err(_) => {
                tracing::warn!("stored token is not a valid header value, sending without it");
                request
            }
        }
    }
}

impl<S> Service<Request<Bytes>> for Auth<S>
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
        let request = self.authorize(request);
        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(request).await })
    }
}
