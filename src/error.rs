//! Error types for the data access layer.
//!
//! Remote failures ([`GatewayError`]) never reach callers of the facade under
//! normal operation: they are converted into a fallback attempt. Only
//! [`FacadeError`] crosses the facade boundary.

use thiserror::Error;

/// Failure of a single remote call.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    /// Non-2xx answer other than 401.
    #[error("server answered {status}: {message}")]
    Status { status: u16, message: String },

    /// 401 answer. The local session has already been cleared when this is returned.
    #[error("session rejected by server: {0}")]
    Unauthorized(String),

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_connect() {
            GatewayError::Connection(err.to_string())
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Request(err.to_string())
        }
    }
}

/// Failure of the persistent key-value store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("lmdb error: {0}")]
    Lmdb(#[from] lmdb::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored value is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by [`crate::facade::DataFacade`].
#[derive(Error, Debug)]
pub enum FacadeError {
    /// Missing or malformed input. Shown to the user as-is, never retried.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Only raised while building the HTTP client.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FacadeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        FacadeError::Validation(msg.into())
    }
}
