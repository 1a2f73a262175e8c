//! Fixed HTTP interceptor pipeline.
//!
//! Every request goes through the same chain of tower middleware before it
//! reaches the network:
//!
//! ```text
//! Logging → Headers → Auth → Cache → Loading → NormalizeErrors(Retry(transport))
//! ```
//!
//! Callers only ever see a [`Response`] or a [`NormalizedError`].
//!
//! # Example
//!
//! ```ignore
//! use relay::prelude::*;
//!
//! let pipeline = Pipeline::builder().build();
//! pipeline.tokens().set("abc123");
//!
//! match pipeline.get("http://localhost:8080/api/products").await {
//!     Ok(response) => println!("{}", response.text()?),
//!     Err(err) => eprintln!("{err}"),
//! }
//!
//! // A second GET within five minutes is served from the cache
//! let again = pipeline.get("http://localhost:8080/api/products").await?;
//! ```

mod config;
mod matcher;
pub mod middleware;
mod pipeline;
pub mod prelude;
mod transport;

pub use config::{
    ClientConfig, ClientConfigBuilder, DEFAULT_APP_VERSION, DEFAULT_CACHE_SKIP_PATHS,
    DEFAULT_LOADING_SKIP_PATHS, DEFAULT_PUBLIC_PATHS, PipelineConfig,
};
pub use matcher::PathMatcher;
pub use middleware::{LoadingCounter, ResponseCache, TokenStore};
pub use pipeline::{BoxedService, Pipeline, PipelineBuilder, PipelineFuture, TransportService};
pub use transport::{HyperTransport, TransportFuture};

// Re-export tower for middleware composition
pub use tower;

// Re-export core types
pub use relay_core::{
    ContentType, Error, ErrorKind, HeaderMap, HeaderName, HeaderValue, HttpClient, HttpClientExt,
    Method, NormalizedError, Request, RequestBuilder, Response, Result, StatusCode, from_json,
    header, to_json, to_query_string,
};
pub use url;
