//! Error kinds surfaced by the library

use thiserror::Error;

/// Realtime transport could not be opened or was lost.
///
/// Only `connect` returns this to callers. Once a channel exists, transport
/// failures are reported through its status instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("realtime endpoint is not configured")]
    MissingEndpoint,
    #[error("invalid realtime endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("realtime transport unavailable: {0}")]
    Unavailable(String),
    #[error("server rejected connection: {0}")]
    Rejected(String),
    #[error("realtime connection closed")]
    Closed,
}

/// Pricing quote is absent or malformed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("pricing quote is missing")]
    MissingQuote,
    #[error("pricing quote field `{0}` is missing")]
    MissingField(String),
    #[error("pricing quote field `{0}` is not a finite number")]
    NonFinite(String),
    #[error("pricing quote field `{0}` is out of range")]
    OutOfRange(String),
}

/// Backend REST request failed
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("API base URL {0} cannot carry a path")]
    InvalidBaseUrl(String),
}

impl ApiError {
    /// True for 401 responses; the session layer is expected to log out
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status: 401, .. })
    }
}
