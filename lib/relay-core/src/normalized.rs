//! The single failure shape surfaced by the pipeline.

use derive_more::{Display, Error};

use crate::Error as TransportError;

/// Where a failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// No response reached the caller (network, TLS, timeout, bad request).
    #[display("client")]
    Client,
    /// The server answered with a status >= 400.
    #[display("server")]
    Server,
}

/// Normalized pipeline error.
///
/// Constructed once, where the failure is classified, and propagated
/// unchanged to the caller.
///
/// # Example
///
/// ```
/// use relay_core::{ErrorKind, NormalizedError};
///
/// let err = NormalizedError::server(401, "Unauthorized");
/// assert_eq!(err.kind(), ErrorKind::Server);
/// assert_eq!(err.status(), Some(401));
/// assert_eq!(err.to_string(), "Server Error: 401 - Unauthorized");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("{}", headline(*kind, *status, message))]
pub struct NormalizedError {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
}

fn headline(kind: ErrorKind, status: Option<u16>, message: &str) -> String {
    match (kind, status) {
        (ErrorKind::Server, Some(status)) => format!("Server Error: {status} - {message}"),
        (ErrorKind::Server, None) => format!("Server Error: {message}"),
        (ErrorKind::Client, _) => format!("Client Error: {message}"),
    }
}

impl NormalizedError {
    /// Create a client-side (network-origin) error.
    #[must_use]
    pub fn client(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Client,
            message: message.into(),
            status: None,
        }
    }

    /// Create a server-side error carrying the response status.
    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Server,
            message: message.into(),
            status: Some(status),
        }
    }

    /// Server-side error for a status, using its canonical reason phrase.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        let reason = http::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("Unknown Status");
        Self::server(status, reason)
    }

    /// Origin of the failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Status code, for server-side failures.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns `true` for client-side failures.
    #[must_use]
    pub const fn is_client(&self) -> bool {
        matches!(self.kind, ErrorKind::Client)
    }

    /// Returns `true` for server-side failures.
    #[must_use]
    pub const fn is_server(&self) -> bool {
        matches!(self.kind, ErrorKind::Server)
    }
}

impl From<TransportError> for NormalizedError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Http {
                status, message, ..
            } => Self::server(status, message),
            other => Self::client(other.to_string()),
        }
    }
}
