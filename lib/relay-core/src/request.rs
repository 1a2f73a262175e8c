//! HTTP request building.
//!
//! Requests are immutable once built. A pipeline step that needs a different
//! request produces a new value with [`Request::with_header`],
//! [`Request::with_headers`] or [`Request::into_builder`].
//!
//! # Example
//!
//! ```
//! use relay_core::{Request, Method};
//! use bytes::Bytes;
//!
//! let request = Request::<Bytes>::builder(Method::Get, "https://shop.example.com/api/products".parse().unwrap())
//!     .header("Accept", "application/json")
//!     .query("page", "1")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(request.url_with_params(), "https://shop.example.com/api/products?page=1");
//! ```

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::{Error, Method, Result};

/// An HTTP request with method, URL, headers, and optional body.
#[derive(Debug, Clone)]
pub struct Request<B = Bytes> {
    method: Method,
    url: url::Url,
    headers: HeaderMap,
    body: Option<B>,
}

impl<B> Request<B> {
    /// Creates a new [`RequestBuilder`].
    #[must_use]
    pub fn builder(method: Method, url: url::Url) -> RequestBuilder<B> {
        RequestBuilder::new(method, url)
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Request URL.
    #[must_use]
    pub fn url(&self) -> &url::Url {
        &self.url
    }

    /// Full URL including the query string.
    ///
    /// This is the identity of a request for caching purposes.
    #[must_use]
    pub fn url_with_params(&self) -> &str {
        self.url.as_str()
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if present and valid UTF-8.
    ///
    /// Header names are case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> Option<&B> {
        self.body.as_ref()
    }

    /// A request identical to this one with `name` set to `value`.
    ///
    /// Any existing values for `name` are replaced.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// A request identical to this one with `overrides` merged in.
    ///
    /// Headers named in `overrides` replace the existing ones; all other
    /// headers are preserved.
    #[must_use]
    pub fn with_headers(mut self, overrides: &HeaderMap) -> Self {
        for name in overrides.keys() {
            self.headers.remove(name);
        }
        for (name, value) in overrides {
            self.headers.append(name.clone(), value.clone());
        }
        self
    }

    /// Turn this request back into a builder, to derive a modified copy.
    #[must_use]
    pub fn into_builder(self) -> RequestBuilder<B> {
        RequestBuilder {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
            error: None,
        }
    }

    /// Consume into (method, url, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (Method, url::Url, HeaderMap, Option<B>) {
        (self.method, self.url, self.headers, self.body)
    }
}

/// Builder for constructing [`Request`] instances.
///
/// Invalid header names or values are recorded and reported by [`build`](Self::build).
#[derive(Debug)]
pub struct RequestBuilder<B = Bytes> {
    method: Method,
    url: url::Url,
    headers: HeaderMap,
    body: Option<B>,
    error: Option<Error>,
}

impl<B> RequestBuilder<B> {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, url: url::Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            error: None,
        }
    }

    /// Sets a header, replacing previous values with the same name.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            (Err(err), _) => {
                self.error = Some(Error::invalid_request(format!(
                    "invalid header name {name:?}: {err}"
                )));
            }
            (_, Err(err)) => {
                self.error = Some(Error::invalid_request(format!(
                    "invalid value for header {name:?}: {err}"
                )));
            }
        }
        self
    }

    /// Merges headers, replacing values with the same names.
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        for name in headers.keys() {
            self.headers.remove(name);
        }
        for (name, value) in &headers {
            self.headers.append(name.clone(), value.clone());
        }
        self
    }

    /// Appends a query parameter to the URL.
    #[must_use]
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(name, value);
        self
    }

    /// Appends a pre-encoded query string to the URL.
    #[must_use]
    pub fn raw_query(mut self, query: &str) -> Self {
        if query.is_empty() {
            return self;
        }
        let merged = match self.url.query() {
            Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
            _ => query.to_string(),
        };
        self.url.set_query(Some(&merged));
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: B) -> Self {
        self.body = Some(body);
        self
    }

    /// Builds the [`Request`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if an invalid header was supplied.
    pub fn build(self) -> Result<Request<B>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(Request {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
        })
    }
}

impl RequestBuilder<Bytes> {
    /// Set a JSON body.
    pub fn json<T: serde::Serialize>(self, value: &T) -> Result<Self> {
        let body = crate::to_json(value)?;
        Ok(self
            .header("Content-Type", crate::ContentType::Json.as_str())
            .body(body))
    }
}
