//! Data-access error types.

use derive_more::{Display, Error, From};
use relay::NormalizedError;

/// Errors raised by the CRUD client and the real-time sources.
#[derive(Debug, Display, Error, From)]
pub enum DataError {
    /// The request failed in the pipeline.
    #[display("{_0}")]
    #[from]
    Request(NormalizedError),

    /// The response body could not be decoded.
    #[display("decode error: {_0}")]
    #[from(skip)]
    Decode(relay::Error),

    /// The request body or query could not be encoded.
    #[display("encode error: {_0}")]
    #[from(skip)]
    Encode(relay::Error),

    /// WebSocket handshake or transport failure.
    #[display("WebSocket error: {_0}")]
    #[from(skip)]
    WebSocket(#[error(not(source))] String),

    /// A WebSocket operation was attempted without a live connection.
    #[display("WebSocket is not connected")]
    #[from(skip)]
    NotConnected,
}

impl DataError {
    /// The pipeline error, if this is a request failure.
    #[must_use]
    pub const fn as_request(&self) -> Option<&NormalizedError> {
        match self {
            Self::Request(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;
