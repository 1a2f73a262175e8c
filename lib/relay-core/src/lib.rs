//! Core types for the relay interceptor pipeline.
//!
//! This crate provides the data model shared by every pipeline step:
//! - [`Method`] - HTTP method enum
//! - [`Request`] and [`RequestBuilder`] - immutable HTTP requests ("clone with overrides")
//! - [`Response`] - immutable HTTP response
//! - [`Error`] - transport-level failures
//! - [`NormalizedError`] and [`ErrorKind`] - the single failure shape surfaced to callers
//! - [`HttpClient`] - client trait for executing requests
//! - [`StatusCode`] and [`header`] - re-exported from the `http` crate

mod body;
mod client;
mod error;
mod method;
mod normalized;
pub mod prelude;
mod request;
mod response;

pub use body::{ContentType, from_json, to_json, to_query_string};
pub use client::{HttpClient, HttpClientExt};
pub use error::{Error, Result};
pub use method::Method;
pub use normalized::{ErrorKind, NormalizedError};
pub use request::{Request, RequestBuilder};
pub use response::Response;

// Re-export http crate types for status codes and headers
pub use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
