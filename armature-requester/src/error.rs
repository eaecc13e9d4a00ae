//! Requester error types.

use std::time::Duration;
use thiserror::Error;

use crate::Response;

/// Result type for requester operations.
pub type Result<T> = std::result::Result<T, HttpClientError>;

/// Result of a terminal request verb.
pub type SendResult = std::result::Result<Response, SendError>;

/// Boxed error returned by hooks and codecs.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Requester errors.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The final URL could not be parsed.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The URL was structurally unusable (bad scheme, cannot carry a query, ...).
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The request body could not be encoded.
    #[error("Failed to encode request body: {0}")]
    Encode(String),

    /// Underlying HTTP client error (connect, send, redirect, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Connection error reported by a custom transport.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The request deadline elapsed.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The response body could not be read.
    #[error("Failed to read response body: {0}")]
    BodyRead(String),

    /// A before-request hook rejected the request.
    #[error("Before request hook error: {0}")]
    BeforeHook(#[source] BoxError),

    /// An after-response hook rejected the response.
    #[error("After response hook error: {0}")]
    AfterHook(#[source] BoxError),

    /// The success body could not be decoded into the registered result type.
    #[error("Failed to decode success result: {0}")]
    Decode(String),

    /// The request is missing a method or URL.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// I/O error (response output file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HttpClientError {
    /// Check if this error is caused by the network rather than by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connection(_) | Self::BodyRead(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_)) || matches!(self, Self::Http(e) if e.is_timeout())
    }

    /// Check if this is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_)) || matches!(self, Self::Http(e) if e.is_connect())
    }
}

/// Error returned by a terminal request verb.
///
/// Carries the response of the last attempt whenever a status line was
/// received.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct SendError {
    source: HttpClientError,
    response: Option<Box<Response>>,
}

impl SendError {
    pub(crate) fn new(source: HttpClientError, response: Option<Response>) -> Self {
        Self {
            source,
            response: response.map(Box::new),
        }
    }

    /// The terminal error of the last attempt.
    pub fn error(&self) -> &HttpClientError {
        &self.source
    }

    /// The response of the last attempt, if one was received.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_deref()
    }

    /// Split into the terminal error and the partial response.
    pub fn into_parts(self) -> (HttpClientError, Option<Response>) {
        (self.source, self.response.map(|r| *r))
    }
}

impl From<HttpClientError> for SendError {
    fn from(source: HttpClientError) -> Self {
        Self::new(source, None)
    }
}
