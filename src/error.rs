//! Error types for jobpulse
//!
//! This module provides error handling for the library, including:
//! - A single crate-wide [`Error`] covering provider, orchestration and storage failures
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for jobpulse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for jobpulse
///
/// Transport-level failures ([`Error::Remote`], [`Error::Network`]) are handled
/// per operation by the orchestrator; the remaining variants are fatal to the
/// call that produced them.
#[derive(Debug, Error)]
pub enum Error {
    /// No usable credential could be obtained (bad credentials, no refresh path)
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// The configured provider tier does not offer this operation
    #[error("{operation} requires the {required} API tier")]
    CapabilityDenied {
        /// Operation that was refused (e.g. "StartTask")
        operation: String,
        /// Tier that would allow the operation
        required: String,
    },

    /// The provider answered with a non-success status
    #[error("provider returned HTTP {status}: {body}")]
    Remote {
        /// HTTP status code returned by the provider
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Network error talking to the provider
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Caller supplied invalid input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Requested resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Tasks did not reach a terminal state before the deadline
    #[error("timed out after {elapsed_secs}s waiting for {pending} task(s) to finish")]
    WaitTimedOut {
        /// Seconds spent waiting
        elapsed_secs: u64,
        /// Number of tasks that were still not terminal
        pending: usize,
    },

    /// The run was cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "OCTOPARSE_API_TIER")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Workbook could not be assembled
    #[error("workbook error: {0}")]
    Workbook(String),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Workbook(e.to_string())
    }
}

impl Error {
    /// Build a [`Error::CapabilityDenied`] for an operation gated behind the Advanced tier
    pub fn advanced_only(operation: impl Into<String>) -> Self {
        Error::CapabilityDenied {
            operation: operation.into(),
            required: "advanced".to_string(),
        }
    }

    /// True for provider transport failures (non-2xx or network faults)
    ///
    /// These are the errors the orchestrator swallows per task.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Remote { .. } | Error::Network(_))
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "capability_denied",
///     "message": "StartTask requires the advanced API tier",
///     "details": { "operation": "StartTask" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "invalid_input")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("invalid_input", message)
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::InvalidInput(_) => 400,
            Error::Config { .. } => 400,
            Error::AuthFailure(_) => 401,
            Error::CapabilityDenied { .. } => 403,
            Error::NotFound(_) => 404,
            Error::Cancelled => 499,

            // Upstream client errors are forwarded, anything else is a bad gateway
            Error::Remote { status, .. } if (400..500).contains(status) => *status,
            Error::Remote { .. } => 502,
            Error::Network(_) => 502,

            Error::WaitTimedOut { .. } => 504,

            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::Workbook(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::AuthFailure(_) => "auth_failure",
            Error::CapabilityDenied { .. } => "capability_denied",
            Error::Remote { .. } => "remote_error",
            Error::Network(_) => "network_error",
            Error::InvalidInput(_) => "invalid_input",
            Error::NotFound(_) => "not_found",
            Error::WaitTimedOut { .. } => "wait_timed_out",
            Error::Cancelled => "cancelled",
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Workbook(_) => "workbook_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::CapabilityDenied {
                operation,
                required,
            } => Some(serde_json::json!({
                "operation": operation,
                "required_tier": required,
            })),
            Error::Remote { status, .. } => Some(serde_json::json!({
                "upstream_status": status,
            })),
            Error::WaitTimedOut {
                elapsed_secs,
                pending,
            } => Some(serde_json::json!({
                "elapsed_secs": elapsed_secs,
                "pending_tasks": pending,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
