//! Relay error types and their HTTP status mapping.

use crate::domain::config::ConfigError;
use crate::rotation::RotationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP status codes used by the relay surface
pub mod codes {
    pub const BAD_REQUEST: u16 = 400;
    pub const INTERNAL_ERROR: u16 = 500;
}

/// Error returned to an HTTP caller: a status code and a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// HTTP status code
    pub status: u16,
    /// Reason sent as the response body
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Caller sent something we cannot accept
    pub fn bad_request(details: impl Into<String>) -> Self {
        Self::new(codes::BAD_REQUEST, details)
    }

    /// Malformed request body
    pub fn invalid_json(details: impl fmt::Display) -> Self {
        Self::bad_request(format!("invalid JSON: {}", details))
    }

    /// Server-side failure, usually a backing store
    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL_ERROR, details)
    }

    /// True for 4xx statuses
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for HTTP handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Service-level errors (startup, serving, rotation)
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// HTTP server stopped with an error
    #[error("server error: {0}")]
    Serve(String),

    /// The rotation host could not erase a store
    #[error("rotation failed: {0}")]
    Rotation(#[from] RotationError),
}
