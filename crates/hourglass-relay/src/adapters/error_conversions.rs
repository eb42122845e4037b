//! Error conversions from and to infrastructure types.
//!
//! These conversions involve Redis and HTTP types and belong in the adapters layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::domain::error::ApiError;
use crate::domain::hour::HourError;
use crate::ports::store::StoreError;
use crate::registrar::RegistrationError;

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error()
            || e.is_connection_refusal()
            || e.is_connection_dropped()
            || e.is_timeout()
        {
            StoreError::Unavailable(e.to_string())
        } else {
            StoreError::Command(e.to_string())
        }
    }
}

impl From<HourError> for ApiError {
    fn from(e: HourError) -> Self {
        ApiError::bad_request(e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::internal(format!("failed to get store client: {}", e))
    }
}

impl From<RegistrationError> for ApiError {
    fn from(e: RegistrationError) -> Self {
        match e {
            RegistrationError::Store(store) => {
                ApiError::internal(format!("failed to register user: {}", store))
            }
            other => ApiError::bad_request(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, self.message).into_response()
    }
}
