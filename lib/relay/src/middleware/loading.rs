//! In-flight request counting.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::sync::watch;
use tower::{Layer, Service};

use crate::{NormalizedError, PathMatcher, Request, Response};

const METRIC_REQUESTS_IN_FLIGHT: &str = "relay_requests_in_flight";

#[derive(Debug)]
struct Inner {
    count: AtomicUsize,
    loading: watch::Sender<bool>,
}

/// Shared count of requests currently in flight.
///
/// `is_loading` is `count > 0`. Subscribers are notified only when that
/// boolean changes, not on every increment.
#[derive(Debug, Clone)]
pub struct LoadingCounter {
    inner: Arc<Inner>,
}

impl Default for LoadingCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingCounter {
    /// Create a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        let (loading, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                count: AtomicUsize::new(0),
                loading,
            }),
        }
    }

    /// Record a request entering flight.
    pub fn increment(&self) {
        self.inner.count.fetch_add(1, Ordering::SeqCst);
        metrics::gauge!(METRIC_REQUESTS_IN_FLIGHT).increment(1.0);
        self.publish();
    }

    /// Record a request leaving flight. Does nothing at zero.
    pub fn decrement(&self) {
        let decremented = self
            .inner
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            })
            .is_ok();

        if decremented {
            metrics::gauge!(METRIC_REQUESTS_IN_FLIGHT).decrement(1.0);
            self.publish();
        }
    }

    /// Requests currently in flight.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }

    /// Returns `true` while at least one request is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.count() > 0
    }

    /// Watch the loading boolean.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.loading.subscribe()
    }

    /// Increment now and decrement when the returned guard is dropped.
    #[must_use]
    pub fn guard(&self) -> LoadingGuard {
        self.increment();
        LoadingGuard {
            counter: self.clone(),
        }
    }

    fn publish(&self) {
        let count = &self.inner.count;
        self.inner.loading.send_if_modified(|loading| {
            let now = count.load(Ordering::SeqCst) > 0;
            let changed = *loading != now;
            *loading = now;
            changed
        });
    }
}

/// Decrements its [`LoadingCounter`] once when dropped.
#[derive(Debug)]
pub struct LoadingGuard {
    counter: LoadingCounter,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.counter.decrement();
    }
}

/// Layer that keeps a [`LoadingCounter`] in step with in-flight requests.
#[derive(Debug, Clone)]
pub struct LoadingLayer {
    counter: LoadingCounter,
    skip_paths: PathMatcher,
}

impl LoadingLayer {
    /// Create the layer over a counter and a skip-list.
    #[must_use]
    pub const fn new(counter: LoadingCounter, skip_paths: PathMatcher) -> Self {
        Self {
            counter,
            skip_paths,
        }
    }
}

impl<S> Layer<S> for LoadingLayer {
    type Service = Loading<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Loading {
            inner,
            counter: self.counter.clone(),
            skip_paths: self.skip_paths.clone(),
        }
    }
}

/// Service that counts in-flight requests.
#[derive(Debug, Clone)]
pub struct Loading<S> {
    inner: S,
    counter: LoadingCounter,
    skip_paths: PathMatcher,
}

impl<S> Service<Request<Bytes>> for Loading<S>
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

        if self.skip_paths.matches(request.url_with_params()) {
            return Box::pin(async move { inner.call(request).await });
        }

        let guard = self.counter.guard();
        Box::pin(async move {
            let result = inner.call(request).await;
            drop(guard);
            result
        })
    }
}
