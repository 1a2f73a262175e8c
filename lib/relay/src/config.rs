//! Transport and pipeline configuration.

use std::time::Duration;

use crate::PathMatcher;

/// Application version sent in the `X-App-Version` header.
pub const DEFAULT_APP_VERSION: &str = "1.0.0";

/// URLs that never receive an `Authorization` header.
pub const DEFAULT_PUBLIC_PATHS: [&str; 3] =
    ["/api/auth/login", "/api/auth/register", "/api/public"];

/// URLs that bypass the response cache.
pub const DEFAULT_CACHE_SKIP_PATHS: [&str; 3] = ["/api/auth", "/api/realtime", "/api/polling"];

/// URLs that do not count as loading.
pub const DEFAULT_LOADING_SKIP_PATHS: [&str; 3] = ["/api/health", "/api/ping", "/api/polling"];

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout duration.
    pub timeout: Duration,
    /// Connection timeout duration.
    pub connect_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_idle_per_host: usize,
    /// Idle connection timeout.
    pub pool_idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    pool_idle_per_host: Option<usize>,
    pool_idle_timeout: Option<Duration>,
}

impl ClientConfigBuilder {
    /// Set the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub const fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.pool_idle_per_host = Some(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub const fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            timeout: self.timeout.unwrap_or(defaults.timeout),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            pool_idle_per_host: self
                .pool_idle_per_host
                .unwrap_or(defaults.pool_idle_per_host),
            pool_idle_timeout: self.pool_idle_timeout.unwrap_or(defaults.pool_idle_timeout),
        }
    }
}

/// Configuration for the interceptor pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Development mode; the logging step is only active when set.
    pub development: bool,
    /// Value of the `X-App-Version` header.
    pub app_version: String,
    /// How long a cached response stays fresh.
    pub cache_ttl: Duration,
    /// Additional attempts for failed GET requests.
    pub retry_count: u32,
    /// Delay between attempts.
    pub retry_delay: Duration,
    /// URLs that never get an `Authorization` header.
    pub public_paths: PathMatcher,
    /// URLs that bypass the response cache.
    pub cache_skip_paths: PathMatcher,
    /// URLs that are not counted as loading.
    pub loading_skip_paths: PathMatcher,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            development: true,
            app_version: DEFAULT_APP_VERSION.to_string(),
            cache_ttl: Duration::from_secs(5 * 60),
            retry_count: 2,
            retry_delay: Duration::from_secs(1),
            public_paths: PathMatcher::new(DEFAULT_PUBLIC_PATHS),
            cache_skip_paths: PathMatcher::new(DEFAULT_CACHE_SKIP_PATHS),
            loading_skip_paths: PathMatcher::new(DEFAULT_LOADING_SKIP_PATHS),
        }
    }
}

impl PipelineConfig {
    /// Set development mode.
    #[must_use]
    pub const fn with_development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }

    /// Set the application version header value.
    #[must_use]
    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    /// Set the cache time-to-live.
    #[must_use]
    pub const fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the retry budget for GET requests.
    #[must_use]
    pub const fn with_retry(mut self, count: u32, delay: Duration) -> Self {
        self.retry_count = count;
        self.retry_delay = delay;
        self
    }

    /// Replace the public (unauthenticated) URL list.
    #[must_use]
    pub fn with_public_paths(mut self, paths: PathMatcher) -> Self {
        self.public_paths = paths;
        self
    }

    /// Replace the cache skip-list.
    #[must_use]
    pub fn with_cache_skip_paths(mut self, paths: PathMatcher) -> Self {
        self.cache_skip_paths = paths;
        self
    }

    /// Replace the loading skip-list.
    #[must_use]
    pub fn with_loading_skip_paths(mut self, paths: PathMatcher) -> Self {
        self.loading_skip_paths = paths;
        self
    }
}
