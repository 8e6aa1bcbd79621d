//! Error types for the Questlog client.

use std::time::Duration;

/// Top-level error type for the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Transport and decode errors from the backend service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request to {endpoint} failed: {reason}")]
    Http { endpoint: String, reason: String },

    #[error("Unexpected status {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("Failed to decode response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("Request to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("Request to {endpoint} requires an authenticated session")]
    Unauthenticated { endpoint: String },
}

/// Session probe errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Sign-out call failed: {0}")]
    SignOutFailed(String),
}

/// Result type alias for the client.
pub type Result<T> = std::result::Result<T, Error>;
