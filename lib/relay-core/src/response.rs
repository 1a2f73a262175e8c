//! HTTP response handling.
//!
//! [`Response`] gives access to status, headers, and body with JSON/text decoding.
//! Responses are immutable; cloning one is cheap because the body is a
//! reference-counted [`Bytes`] buffer.

use bytes::Bytes;
use http::HeaderMap;

/// HTTP response with status, headers, and body.
#[derive(Debug, Clone)]
pub struct Response<B = Bytes> {
    status: u16,
    headers: HeaderMap,
    body: B,
}

impl<B> Response<B> {
    /// Creates a new response.
    #[must_use]
    pub fn new(status: u16, headers: HeaderMap, body: B) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Response body.
    #[must_use]
    pub const fn body(&self) -> &B {
        &self.body
    }

    /// Consume into body.
    #[must_use]
    pub fn into_body(self) -> B {
        self.body
    }

    /// Status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Status is 400 or above.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.status >= 400
    }

    /// Status is 4xx.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    /// Status is 5xx.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }
}

impl Response<Bytes> {
    /// Deserialize the response body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        crate::from_json(&self.body)
    }

    /// Get the response body as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid UTF-8.
    pub fn text(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.to_vec())
    }

    /// Turn a failure status into an [`Error::Http`](crate::Error::Http).
    ///
    /// Successful and redirect responses are returned unchanged.
    pub fn error_for_status(self) -> crate::Result<Self> {
        if !self.is_failure() {
            return Ok(self);
        }
        let message = http::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("Unknown Status");
        Err(crate::Error::http_with_body(
            self.status,
            message,
            self.body,
        ))
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::*;

    #[test]
    fn response_basic() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );

        let response = Response::new(200, headers, Bytes::from(r#"{"id":"1"}"#));

        check!(response.status() == 200);
        check!(response.header("content-type") == Some("application/json"));
        check!(response.is_success());
        check!(!response.is_failure());
    }

    #[test]
    fn response_status_checks() {
        check!(Response::new(404, HeaderMap::new(), Bytes::new()).is_client_error());
        check!(Response::new(503, HeaderMap::new(), Bytes::new()).is_server_error());
        check!(!Response::new(304, HeaderMap::new(), Bytes::new()).is_failure());
    }

    #[test]
    fn response_json() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Product {
            id: String,
            name: String,
        }

        let body = Bytes::from(r#"{"id":"1","name":"Laptop"}"#);
        let response = Response::new(200, HeaderMap::new(), body);

        let product: Product = response.json().expect("deserialize");
        check!(
            product
                == Product {
                    id: "1".to_string(),
                    name: "Laptop".to_string()
                }
        );
    }

    #[test]
    fn error_for_status_keeps_body() {
        let response = Response::new(404, HeaderMap::new(), Bytes::from("missing"));

        let_assert!(Err(err) = response.error_for_status());
        check!(err.status() == Some(404));
        check!(err.to_string() == "HTTP error 404: Not Found");
        check!(err.body() == Some(&Bytes::from("missing")));
    }

    #[test]
    fn error_for_status_passes_success() {
        let response = Response::new(201, HeaderMap::new(), Bytes::new());
        check!(response.error_for_status().is_ok());
    }
}
