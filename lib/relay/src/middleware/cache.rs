//! URL-keyed response cache with a time-to-live.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tower::{Layer, Service};
use tracing::debug;

use crate::{NormalizedError, PathMatcher, Request, Response};

const METRIC_CACHE_HITS: &str = "relay_cache_hits_total";
const METRIC_CACHE_MISSES: &str = "relay_cache_misses_total";

#[derive(Debug, Clone)]
struct CacheEntry {
    response: Response<Bytes>,
    inserted_at: Instant,
}

/// Shared store of successful GET responses.
///
/// Entries are keyed by the full URL including the query string. An entry
/// older than the TTL is removed the next time it is looked up. There is no
/// capacity bound.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60))
    }
}

impl ResponseCache {
    /// Create an empty cache with the given TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Entry lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh cached response for this request's URL.
    #[must_use]
    pub fn get(&self, request: &Request<Bytes>) -> Option<Response<Bytes>> {
        self.lookup(request.url_with_params())
    }

    /// Store `response` for this request's URL, replacing any previous entry.
    pub fn put(&self, request: &Request<Bytes>, response: Response<Bytes>) {
        self.store(request.url_with_params().to_string(), response);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, stale ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lookup(&self, key: &str) -> Option<Response<Bytes>> {
        let mut entries = self.lock();
        let entry = entries.get(key)?;

        if Instant::now().duration_since(entry.inserted_at) > self.ttl {
            entries.remove(key);
            return None;
        }

        Some(entry.response.clone())
    }

    fn store(&self, key: String, response: Response<Bytes>) {
        let entry = CacheEntry {
            response,
            inserted_at: Instant::now(),
        };
        self.lock().insert(key, entry);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Layer that serves GET requests from a [`ResponseCache`].
#[derive(Debug, Clone)]
pub struct CacheLayer {
    cache: ResponseCache,
    skip_paths: PathMatcher,
}

impl CacheLayer {
    /// Create the layer over a cache and a skip-list.
    #[must_use]
    pub const fn new(cache: ResponseCache, skip_paths: PathMatcher) -> Self {
        Self { cache, skip_paths }
    }
}

impl<S> Layer<S> for CacheLayer {
    type Service = Cache<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Cache {
            inner,
            cache: self.cache.clone(),
            skip_paths: self.skip_paths.clone(),
        }
    }
}

/// Service that short-circuits on fresh cache hits.
#[derive(Debug, Clone)]
pub struct Cache<S> {
    inner: S,
    cache: ResponseCache,
    skip_paths: PathMatcher,
}

impl<S> Cache<S> {
    fn is_cacheable(&self, request: &Request<Bytes>) -> bool {
        request.method().is_get() && !self.skip_paths.matches(request.url_with_params())
    }
}

impl<S> Service<Request<Bytes>> for Cache<S>
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

        if !self.is_cacheable(&request) {
            return Box::pin(async move { inner.call(request).await });
        }

        let key = request.url_with_params().to_string();
        if let Some(response) = self.cache.lookup(&key) {
            debug!(url = %key, "cache hit");
            metrics::counter!(METRIC_CACHE_HITS).increment(1);
            return Box::pin(async move { Ok(response) });
        }

        metrics::counter!(METRIC_CACHE_MISSES).increment(1);
        let cache = self.cache.clone();
        Box::pin(async move {
            let response = inner.call(request).await?;
            cache.store(key, response.clone());
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderMap;

    use super::*;
    use crate::Method;

    fn get(url: &str) -> Request<Bytes> {
        Request::builder(Method::Get, url::Url::parse(url).expect("url"))
            .build()
            .expect("request")
    }

    fn ok(body: &'static str) -> Response<Bytes> {
        Response::new(200, HeaderMap::new(), Bytes::from_static(body.as_bytes()))
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entry_is_returned() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let request = get("http://localhost/api/products?page=1");

        cache.put(&request, ok("[]"));
        tokio::time::advance(Duration::from_secs(60)).await;

        let cached = cache.get(&request).expect("hit");
        assert_eq!(cached.body(), &Bytes::from_static(b"[]"));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entry_is_removed() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let request = get("http://localhost/api/products");

        cache.put(&request, ok("[]"));
        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(cache.get(&request).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn query_string_is_part_of_the_key() {
        let cache = ResponseCache::default();
        cache.put(&get("http://localhost/api/products?page=1"), ok("one"));

        assert!(
            cache
                .get(&get("http://localhost/api/products?page=2"))
                .is_none()
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn put_overwrites() {
        let cache = ResponseCache::default();
        let request = get("http://localhost/api/products");
        cache.put(&request, ok("old"));
        cache.put(&request, ok("new"));

        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get(&request).expect("hit").body(),
            &Bytes::from_static(b"new")
        );
    }

    #[test]
    fn clear_empties() {
        let cache = ResponseCache::default();
        cache.put(&get("http://localhost/a"), ok("a"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn only_get_outside_skip_list_is_cacheable() {
        let layer = CacheLayer::new(
            ResponseCache::default(),
            PathMatcher::new(crate::DEFAULT_CACHE_SKIP_PATHS),
        );
        let service = layer.layer(());

        assert!(service.is_cacheable(&get("http://localhost/api/products")));
        assert!(!service.is_cacheable(&get("http://localhost/api/auth/me")));
        assert!(!service.is_cacheable(&get("http://localhost/api/polling/feed")));

        let post = Request::builder(
            Method::Post,
            url::Url::parse("http://localhost/api/products").expect("url"),
        )
        .build()
        .expect("request");
        assert!(!service.is_cacheable(&post));
    }
}
