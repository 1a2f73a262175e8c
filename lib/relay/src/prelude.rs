//! Prelude module for convenient imports.
//!
//! ```ignore
//! use relay::prelude::*;
//! ```

pub use crate::{
    ClientConfig, Error, ErrorKind, HttpClient, HttpClientExt, LoadingCounter, Method,
    NormalizedError, PathMatcher, Pipeline, PipelineConfig, Request, Response, ResponseCache,
    StatusCode, TokenStore,
};
