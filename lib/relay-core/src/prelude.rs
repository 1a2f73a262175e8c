//! Prelude module for convenient imports.
//!
//! ```ignore
//! use relay_core::prelude::*;
//! ```

pub use crate::{
    ContentType, Error, ErrorKind, HttpClient, HttpClientExt, Method, NormalizedError, Request,
    RequestBuilder, Response, Result, from_json, to_json, to_query_string,
};
