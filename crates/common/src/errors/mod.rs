//! Error types for Organa services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for each upstream failure mode (search index, inference service)
//! - HTTP status code mapping
//! - Structured error responses with a retryable hint
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ResponseEnvelope;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // Resource errors (4xxx)
    NotFound,
    ArticleNotFound,

    // Rate limiting (6xxx)
    RateLimited,

    // Search index errors (7xxx)
    SearchUnavailable,
    SearchTimeout,

    // Inference service errors (8xxx)
    ModelUnavailable,
    ModelTimeout,
    InvalidModel,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::ArticleNotFound => 4002,

            // Rate limits (6xxx)
            ErrorCode::RateLimited => 6001,

            // Search (7xxx)
            ErrorCode::SearchUnavailable => 7001,
            ErrorCode::SearchTimeout => 7002,

            // Inference (8xxx)
            ErrorCode::ModelUnavailable => 8001,
            ErrorCode::ModelTimeout => 8002,
            ErrorCode::InvalidModel => 8003,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>
    },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Article not found: {id}")]
    ArticleNotFound { id: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Search index errors
    #[error("Search service unavailable: {message}")]
    SearchUnavailable { message: String },

    #[error("Search timed out after {timeout_ms}ms")]
    SearchTimeout { timeout_ms: u64 },

    // Inference service errors
    #[error("Model service unavailable: {message}")]
    ModelUnavailable { message: String },

    #[error("Model generation timed out after {timeout_ms}ms")]
    ModelTimeout { timeout_ms: u64 },

    #[error("Model '{model}' is not available (available: {})", .available.join(", "))]
    InvalidModel { model: String, available: Vec<String> },

    /// Generation failed after search already produced results
    #[error("Answer generation failed: {source}")]
    GenerationStage {
        #[source]
        source: Box<AppError>,
        results: Box<ResponseEnvelope>,
    },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a validation error bound to a request field
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::ArticleNotFound { .. } => ErrorCode::ArticleNotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::SearchUnavailable { .. } => ErrorCode::SearchUnavailable,
            AppError::SearchTimeout { .. } => ErrorCode::SearchTimeout,
            AppError::ModelUnavailable { .. } => ErrorCode::ModelUnavailable,
            AppError::ModelTimeout { .. } => ErrorCode::ModelTimeout,
            AppError::InvalidModel { .. } => ErrorCode::InvalidModel,
            AppError::GenerationStage { source, .. } => source.code(),
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } |
            AppError::InvalidModel { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::NotFound { .. } |
            AppError::ArticleNotFound { .. } => StatusCode::NOT_FOUND,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Internal { .. } |
            AppError::Configuration { .. } |
            AppError::Serialization(_) |
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::ModelUnavailable { .. } => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::SearchUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,

            // 504 Gateway Timeout
            AppError::SearchTimeout { .. } |
            AppError::ModelTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,

            AppError::GenerationStage { source, .. } => source.status_code(),
        }
    }

    /// Whether a caller may retry the same request (with backoff).
    ///
    /// Search failures are retryable; inference failures are reported as-is
    /// because regeneration is expensive.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::SearchUnavailable { .. } |
            AppError::SearchTimeout { .. } |
            AppError::RateLimited { .. } => true,
            AppError::GenerationStage { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Structured details attached to the error body, if any
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Validation { field: Some(field), .. } => {
                Some(serde_json::json!({ "field": field }))
            }
            AppError::InvalidModel { available, .. } => {
                Some(serde_json::json!({ "available_models": available }))
            }
            AppError::GenerationStage { results, .. } => Some(serde_json::json!({
                "stage": "generation",
                "results": results,
            })),
            _ => None,
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                retryable: self.is_retryable(),
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string()
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let field = err.field_errors().keys().next().map(|f| f.to_string());
        AppError::Validation {
            message: err.to_string(),
            field,
        }
    }
}
