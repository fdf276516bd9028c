//! # Error Handling
//!
//! This module defines custom error types and how they're converted to HTTP responses.
//!
//! ## Error Categories:
//! - **UnsupportedFormat**: Uploaded bytes are not decodable audio (415 errors)
//! - **ConnectionError**: The streaming backend handshake failed (502 errors)
//! - **TransmissionError**: A send failed mid-stream (502 errors)
//! - **BadRequest / ValidationError**: Client sent invalid data (400 errors)
//! - **Forbidden**: Client asked for a restricted message path (403 errors)
//! - **Internal / ConfigError**: Server-side problems (500 errors)
//!
//! ## Propagation policy:
//! Normalization and framing errors are structural and surface immediately.
//! Transport errors during a live session surface with no retry, since a
//! half-streamed utterance is unrecoverable. Per-message parse failures on
//! the receive side are the one case that is dropped rather than surfaced.

use actix_web::{HttpResponse, ResponseError};  // Web framework error handling
use serde_json::json;                          // For creating JSON error responses
use std::fmt;                                  // For implementing Display trait

/// Custom error types for the application.
///
/// ## Usage Example:
/// ```rust
/// return Err(AppError::UnsupportedFormat("not audio".to_string()));
/// ```
#[derive(Debug)]
pub enum AppError {
    /// Input bytes could not be identified or decoded as audio
    UnsupportedFormat(String),

    /// The WebSocket handshake with a backend did not complete
    ConnectionError(String),

    /// A send to the backend failed mid-stream; the session was aborted
    TransmissionError(String),

    /// Internal server errors (task failures, I/O issues, etc.)
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Client asked for a message path it may not use
    Forbidden(String),

    /// Requested resource was not found
    NotFound(String),

    /// Configuration file or environment variable problems
    ConfigError(String),

    /// User input failed validation rules
    ValidationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::UnsupportedFormat(msg) => write!(f, "Unsupported media type: {}", msg),
            AppError::ConnectionError(msg) => write!(f, "Connection error: {}", msg),
            AppError::TransmissionError(msg) => write!(f, "Transmission error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

/// Implementation of the ResponseError trait for AppError.
///
/// ## HTTP Status Code Mapping:
/// - UnsupportedFormat → 415 (Unsupported Media Type)
/// - ConnectionError/TransmissionError → 502 (Bad Gateway)
/// - BadRequest/ValidationError → 400 (Bad Request)
/// - Forbidden → 403 (Forbidden)
/// - NotFound → 404 (Not Found)
/// - Internal/ConfigError → 500 (Internal Server Error)
///
/// ## JSON Response Format:
/// All errors return JSON with a consistent structure:
/// ```json
/// {
///   "error": {
///     "type": "unsupported_format",
///     "message": "could not probe audio container",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        // Map each error type to HTTP status code, error type, and message
        let (status, error_type, message) = match self {
            AppError::UnsupportedFormat(msg) => (
                actix_web::http::StatusCode::UNSUPPORTED_MEDIA_TYPE,  // 415
                "unsupported_format",
                msg.clone(),
            ),
            AppError::ConnectionError(msg) => (
                actix_web::http::StatusCode::BAD_GATEWAY,  // 502
                "connection_error",
                msg.clone(),
            ),
            AppError::TransmissionError(msg) => (
                actix_web::http::StatusCode::BAD_GATEWAY,  // 502
                "transmission_error",
                msg.clone(),
            ),
            AppError::Internal(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,  // 500
                "internal_error",
                msg.clone(),
            ),
            AppError::BadRequest(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,  // 400
                "bad_request",
                msg.clone(),
            ),
            AppError::Forbidden(msg) => (
                actix_web::http::StatusCode::FORBIDDEN,  // 403
                "forbidden",
                msg.clone(),
            ),
            AppError::NotFound(msg) => (
                actix_web::http::StatusCode::NOT_FOUND,  // 404
                "not_found",
                msg.clone(),
            ),
            AppError::ConfigError(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,  // 500
                "config_error",
                msg.clone(),
            ),
            AppError::ValidationError(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,  // 400
                "validation_error",
                msg.clone(),
            ),
        };

        // Build the HTTP response with JSON body
        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,           // Machine-readable error type
                "message": message,           // Human-readable error message
                "timestamp": chrono::Utc::now().to_rfc3339()  // When the error occurred
            }
        }))
    }
}

/// Automatic conversion from anyhow::Error to AppError.
///
/// ## Usage:
/// When you use `?` with an anyhow::Error, it automatically becomes an AppError::Internal.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Automatic conversion from JSON parsing errors to AppError.
///
/// ## Why BadRequest:
/// JSON parsing errors are almost always due to the client sending malformed data,
/// so they should result in a 400 (Bad Request) response, not a 500 (Internal Server Error).
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

/// Automatic conversion from configuration errors to AppError.
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Type alias for Results that use our custom error type.
pub type AppResult<T> = Result<T, AppError>;
