//! HTTP client traits.
//!
//! - [`HttpClient`] - execute a [`Request`] and get a [`Response`]
//! - [`HttpClientExt`] - verb helpers built on top of `execute`

use std::future::Future;

use bytes::Bytes;

use crate::{Error, Method, Request, Response};

/// Core HTTP client trait.
///
/// The associated error lets a client surface either raw transport errors
/// or an already-normalized error. Errors raised before the request is sent
/// (URL parsing, body serialization) are converted with `From<Error>`.
pub trait HttpClient: Send + Sync {
    /// Error surfaced to callers.
    type Error: From<Error> + Send;

    /// Execute an HTTP request and return the response.
    fn execute(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>, Self::Error>> + Send;
}

/// Extension trait for [`HttpClient`] with convenience methods.
pub trait HttpClientExt: HttpClient {
    /// Execute a GET request.
    fn get(&self, url: &str) -> impl Future<Output = Result<Response<Bytes>, Self::Error>> + Send {
        async move {
            let request = simple_request(Method::Get, url)?;
            self.execute(request).await
        }
    }

    /// Execute a DELETE request.
    fn delete(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Response<Bytes>, Self::Error>> + Send {
        async move {
            let request = simple_request(Method::Delete, url)?;
            self.execute(request).await
        }
    }

    /// Execute a POST request with a JSON body.
    fn post_json<T: serde::Serialize + Send + Sync>(
        &self,
        url: &str,
        body: &T,
    ) -> impl Future<Output = Result<Response<Bytes>, Self::Error>> + Send {
        async move {
            let request = json_request(Method::Post, url, body)?;
            self.execute(request).await
        }
    }

    /// Execute a PUT request with a JSON body.
    fn put_json<T: serde::Serialize + Send + Sync>(
        &self,
        url: &str,
        body: &T,
    ) -> impl Future<Output = Result<Response<Bytes>, Self::Error>> + Send {
        async move {
            let request = json_request(Method::Put, url, body)?;
            self.execute(request).await
        }
    }

    /// Execute a PATCH request with a JSON body.
    fn patch_json<T: serde::Serialize + Send + Sync>(
        &self,
        url: &str,
        body: &T,
    ) -> impl Future<Output = Result<Response<Bytes>, Self::Error>> + Send {
        async move {
            let request = json_request(Method::Patch, url, body)?;
            self.execute(request).await
        }
    }
}

// Blanket implementation for all HttpClient implementors
impl<T: HttpClient> HttpClientExt for T {}

fn simple_request(method: Method, url: &str) -> Result<Request<Bytes>, Error> {
    let url = url::Url::parse(url)?;
    Request::builder(method, url).build()
}

fn json_request<T: serde::Serialize>(
    method: Method,
    url: &str,
    body: &T,
) -> Result<Request<Bytes>, Error> {
    let url = url::Url::parse(url)?;
    Request::builder(method, url).json(body)?.build()
}
