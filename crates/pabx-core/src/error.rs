//! Unified error handling for the PABX backend
//!
//! This module provides the error type surfaced by the service layer, with
//! automatic HTTP response mapping for the read surface.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Main application error type
///
/// Errors raised inside the AMI and cache crates are converted to this type
/// at the service boundary. It implements `ResponseError` for automatic HTTP
/// response generation.
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Cache Errors ====================
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Cache connection failed: {0}")]
    CacheConnection(String),

    // ==================== Switch Errors ====================
    #[error("AMI connection error: {0}")]
    AmiConnection(String),

    #[error("AMI command failed: {0}")]
    AmiCommand(String),

    #[error("No healthy connection available")]
    NoHealthyConnection,

    // ==================== Validation Errors ====================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ==================== Internal Errors ====================
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,

            // 502 Bad Gateway
            AppError::AmiCommand(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::NoHealthyConnection
            | AppError::AmiConnection(_)
            | AppError::CacheConnection(_) => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Cache(_) => "cache_error",
            AppError::CacheConnection(_) => "cache_connection_error",
            AppError::AmiConnection(_) => "ami_connection_error",
            AppError::AmiCommand(_) => "ami_command_error",
            AppError::NoHealthyConnection => "no_healthy_connection",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Serialization(_) => "serialization_error",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}
