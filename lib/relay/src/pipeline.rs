//! The composed interceptor pipeline.
//!
//! [`Pipeline`] stacks the middleware in a fixed order on top of a transport:
//!
//! ```text
//! Logging → Headers → Auth → Cache → Loading → NormalizeErrors(Retry(transport))
//! ```
//!
//! The shared state objects ([`TokenStore`], [`ResponseCache`],
//! [`LoadingCounter`]) are created by the builder or handed to it, and stay
//! reachable from the built pipeline.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use tower::util::BoxCloneService;
use tower::{Service, ServiceBuilder, ServiceExt};

use crate::middleware::{
    AuthLayer, CacheLayer, DefaultHeadersLayer, LoadingCounter, LoadingLayer, LoggingLayer,
    NormalizeErrorsLayer, ResponseCache, TokenStore,
};
use crate::{
    ClientConfigBuilder, Error, HyperTransport, NormalizedError, PipelineConfig, Request, Response,
};

/// Boxed service type for the full pipeline.
pub type BoxedService = BoxCloneService<Request<Bytes>, Response<Bytes>, NormalizedError>;

/// Boxed service type for a transport.
pub type TransportService = BoxCloneService<Request<Bytes>, Response<Bytes>, Error>;

/// Future returned by [`Pipeline`] as a tower service.
pub type PipelineFuture =
    Pin<Box<dyn Future<Output = Result<Response<Bytes>, NormalizedError>> + Send + 'static>>;

/// Thread-safe wrapper for a `BoxCloneService`.
///
/// `BoxCloneService` is `Send` but not `Sync`. The service is cloned under
/// the lock and driven outside of it.
#[derive(Clone)]
struct SyncService {
    inner: Arc<Mutex<BoxedService>>,
}

impl SyncService {
    fn new(service: BoxedService) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    fn call(&self, request: Request<Bytes>) -> PipelineFuture {
        let service = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        Box::pin(service.oneshot(request))
    }
}

/// The interceptor pipeline.
///
/// Cheap to clone; clones share the transport and all state objects.
///
/// # Example
///
/// ```ignore
/// use relay::prelude::*;
///
/// let pipeline = Pipeline::builder().build();
/// pipeline.tokens().set("abc123");
///
/// let response = pipeline.get("http://localhost:8080/api/products").await?;
/// ```
#[derive(Clone)]
pub struct Pipeline {
    service: SyncService,
    config: PipelineConfig,
    tokens: TokenStore,
    cache: ResponseCache,
    loading: LoadingCounter,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("authenticated", &self.tokens.is_authenticated())
            .field("cached", &self.cache.len())
            .field("in_flight", &self.loading.count())
            .finish_non_exhaustive()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Pipeline {
    /// Create a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Token store consulted by the auth step.
    #[must_use]
    pub const fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Response cache used by the cache step.
    #[must_use]
    pub const fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Loading counter maintained by the loading step.
    #[must_use]
    pub const fn loading(&self) -> &LoadingCounter {
        &self.loading
    }

    /// Pipeline configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl relay_core::HttpClient for Pipeline {
    type Error = NormalizedError;

    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>, NormalizedError> {
        self.service.call(request).await
    }
}

impl Service<Request<Bytes>> for Pipeline {
    type Response = Response<Bytes>;
    type Error = NormalizedError;
    type Future = PipelineFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness of the inner stack is awaited per call
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        self.service.call(request)
    }
}

/// Builder for [`Pipeline`].
///
/// # Example
///
/// ```ignore
/// use relay::{Pipeline, PipelineConfig};
/// use std::time::Duration;
///
/// let pipeline = Pipeline::builder()
///     .timeout(Duration::from_secs(10))
///     .config(PipelineConfig::default().with_app_version("2.0.0"))
///     .build();
/// ```
#[derive(Default)]
pub struct PipelineBuilder {
    client_config: ClientConfigBuilder,
    config: PipelineConfig,
    tokens: Option<TokenStore>,
    cache: Option<ResponseCache>,
    loading: Option<LoadingCounter>,
    transport: Option<TransportService>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("client_config", &self.client_config)
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}

impl PipelineBuilder {
    // ========================================================================
    // Transport Configuration
    // ========================================================================

    /// Set the request timeout of the default transport.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.client_config = self.client_config.timeout(timeout);
        self
    }

    /// Set the connection timeout of the default transport.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.client_config = self.client_config.connect_timeout(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.client_config = self.client_config.pool_idle_per_host(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.client_config = self.client_config.pool_idle_timeout(timeout);
        self
    }

    /// Replace the default transport.
    ///
    /// Transport settings on this builder are ignored when a transport is
    /// given.
    #[must_use]
    pub fn transport<S>(mut self, transport: S) -> Self
    where
        S: Service<Request<Bytes>, Response = Response<Bytes>, Error = Error>
            + Clone
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        self.transport = Some(BoxCloneService::new(transport));
        self
    }

    // ========================================================================
    // Pipeline Configuration
    // ========================================================================

    /// Set the pipeline configuration.
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing token store.
    #[must_use]
    pub fn token_store(mut self, tokens: TokenStore) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Share an existing response cache. Its own TTL is kept.
    #[must_use]
    pub fn response_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Share an existing loading counter.
    #[must_use]
    pub fn loading_counter(mut self, loading: LoadingCounter) -> Self {
        self.loading = Some(loading);
        self
    }

    /// Build the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        let config = self.config;
        let tokens = self.tokens.unwrap_or_default();
        let cache = self
            .cache
            .unwrap_or_else(|| ResponseCache::new(config.cache_ttl));
        let loading = self.loading.unwrap_or_default();

        let client_config = self.client_config;
        let transport = self
            .transport
            .unwrap_or_else(|| BoxCloneService::new(HyperTransport::new(client_config.build())));

        let service = ServiceBuilder::new()
            .layer(LoggingLayer::new(config.development))
            .layer(DefaultHeadersLayer::new(&config.app_version))
            .layer(AuthLayer::new(tokens.clone(), config.public_paths.clone()))
            .layer(CacheLayer::new(cache.clone(), config.cache_skip_paths.clone()))
            .layer(LoadingLayer::new(loading.clone(), config.loading_skip_paths.clone()))
            .layer(NormalizeErrorsLayer::new(config.retry_count, config.retry_delay))
            .service(transport);

        Pipeline {
            service: SyncService::new(BoxCloneService::new(service)),
            config,
            tokens,
            cache,
            loading,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_creates_shared_state() {
        let tokens = TokenStore::new();
        let pipeline = Pipeline::builder().token_store(tokens.clone()).build();

        tokens.set("abc123");
        assert!(pipeline.tokens().is_authenticated());
        assert!(pipeline.cache().is_empty());
        assert!(!pipeline.loading().is_loading());
    }

    #[test]
    fn cache_ttl_comes_from_config() {
        let pipeline = Pipeline::builder()
            .config(PipelineConfig::default().with_cache_ttl(Duration::from_secs(10)))
            .build();
        assert_eq!(pipeline.cache().ttl(), Duration::from_secs(10));
    }

    #[test]
    fn clones_share_state() {
        let pipeline = Pipeline::default();
        let other = pipeline.clone();
        other.tokens().set("token");
        assert!(pipeline.tokens().is_authenticated());
    }

    #[test]
    fn builder_debug() {
        let builder = Pipeline::builder().timeout(Duration::from_secs(5));
        let debug = format!("{builder:?}");
        assert!(debug.contains("PipelineBuilder"));
        assert!(debug.contains("custom_transport: false"));
    }
}
