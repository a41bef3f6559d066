//! Upstream API errors and their classification.

use thiserror::Error;

/// A single failed upstream call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream connection failed: {0}")]
    Connection(String),

    #[error("invalid upstream response: {0}")]
    Decode(String),

    #[error("upstream error: {0}")]
    Other(String),
}

/// How the retry loop treats an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth another attempt after backing off.
    Retryable,
    /// The resource does not exist; not an error for the caller.
    NotFound,
    /// Give up immediately.
    Fatal,
}

impl ApiError {
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::Status(404) => ErrorClass::NotFound,
            Self::Status(429 | 500 | 502 | 503 | 504) => ErrorClass::Retryable,
            Self::Timeout | Self::Connection(_) => ErrorClass::Retryable,
            Self::Status(_) | Self::Decode(_) | Self::Other(_) => ErrorClass::Fatal,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_body() {
            Self::Connection(e.to_string())
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status(status.as_u16())
        } else if e.is_connect() || e.is_request() {
            Self::Connection(e.to_string())
        } else {
            Self::Other(e.to_string())
        }
    }
}

impl ApiError {
    /// Maps a failure while reading a response body.
    ///
    /// No parsing happens while the body is read, so anything short of a
    /// timeout is a dropped or reset connection.
    pub fn from_body(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Connection(e.to_string())
        }
    }
}

impl From<ApiError> for lake_core::Error {
    fn from(e: ApiError) -> Self {
        lake_core::Error::upstream(e.to_string())
    }
}
