//! Centralized error types for the Radiocast core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses
//!
//! Stale session reports have no variant here: the coordinator drops them
//! with a debug log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::renderer::soap::SoapError;
use crate::stream::StreamError;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for SoapError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::HttpStatus(_, _) => "http_error_status",
            Self::Upnp { .. } => "upnp_error",
            Self::Fault(_) => "soap_fault",
            Self::Parse => "soap_parse_error",
        }
    }
}

impl ErrorCode for StreamError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "stream_request_failed",
            Self::HttpStatus(_) => "stream_error_status",
            Self::Ended => "stream_ended",
        }
    }
}

/// Application-wide error type for Radiocast.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum CastError {
    /// A playback command was issued while no session is active.
    #[error("No active playback session")]
    NotReady,

    /// The requested rendering device is not currently visible.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The requested media identifier does not exist in the radio library.
    #[error("Media not found: {0}")]
    MediaNotFound(String),

    /// Client sent an invalid or malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error (coordinator gone, channel closed).
    #[error("Internal error: {0}")]
    Internal(String),

    /// Configuration error (invalid or missing settings).
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CastError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotReady => "not_ready",
            Self::DeviceNotFound(_) => "device_not_found",
            Self::MediaNotFound(_) => "media_not_found",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Internal(_) => "internal_error",
            Self::Configuration(_) => "configuration_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DeviceNotFound(_) | Self::MediaNotFound(_) => StatusCode::NOT_FOUND,
            Self::NotReady => StatusCode::CONFLICT,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type CastResult<T> = Result<T, CastError>;

// Re-export Result type aliases from their defining modules
pub use crate::renderer::soap::SoapResult;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for CastError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}
