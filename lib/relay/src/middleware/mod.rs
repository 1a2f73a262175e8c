//! Tower middleware layers making up the relay pipeline.
//!
//! Each pipeline step is an ordinary tower [`Layer`]. [`Pipeline`](crate::Pipeline)
//! stacks them in a fixed order, outermost first:
//!
//! | Layer | Role |
//! |-------|------|
//! | [`LoggingLayer`] | `tracing` span and log lines per request (development only) |
//! | [`DefaultHeadersLayer`] | `Content-Type`, `Accept`, `X-Requested-With`, `X-App-Version` |
//! | [`AuthLayer`] | `Authorization: Bearer <token>` from a [`TokenStore`] |
//! | [`CacheLayer`] | serves fresh GET responses from a [`ResponseCache`] |
//! | [`LoadingLayer`] | keeps a [`LoadingCounter`] in step with in-flight requests |
//! | [`NormalizeErrorsLayer`] | retries GET with [`RetryPolicy`], emits [`NormalizedError`](crate::NormalizedError) |
//!
//! Layers above the normalizer work with `NormalizedError`; the normalizer
//! and the transport below it work with [`Error`](crate::Error).
//!
//! # Example: a custom stack
//!
//! ```ignore
//! use relay::middleware::{AuthLayer, NormalizeErrorsLayer, TokenStore, ServiceBuilder};
//!
//! let tokens = TokenStore::new();
//! let service = ServiceBuilder::new()
//!     .layer(AuthLayer::new(tokens.clone(), PathMatcher::default()))
//!     .layer(NormalizeErrorsLayer::new(2, Duration::from_secs(1)))
//!     .service(transport);
//! ```

mod auth;
mod cache;
mod headers;
mod loading;
mod logging;
mod normalize;
mod retry;

pub use auth::{Auth, AuthLayer, TokenStore};
pub use cache::{Cache, CacheLayer, ResponseCache};
pub use headers::{DefaultHeaders, DefaultHeadersLayer};
pub use loading::{Loading, LoadingCounter, LoadingGuard, LoadingLayer};
pub use logging::{Logging, LoggingLayer};
pub use normalize::{NormalizeErrors, NormalizeErrorsLayer};
pub use retry::RetryPolicy;

// Re-export tower types for convenience
pub use tower::{Layer, ServiceBuilder};
