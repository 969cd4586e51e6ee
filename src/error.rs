//! Application error types.
//!
//! These errors are serializable so the calling layer can hand them to a
//! frontend or API client as structured JSON without further mapping.

use serde::Serialize;
use thiserror::Error;

/// Application-level errors returned by every public operation.
///
/// All variants serialize to a structured JSON object.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        operation: Option<String>,
    },

    /// Requested resource not found.
    #[error("Not found: {resource}")]
    NotFound {
        resource: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Structural requirement violated (missing or invalid identifier).
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// The external summarizer failed while populating the cache.
    #[error("Computation failed for {key}: {message}")]
    ComputationFailed { key: String, message: String },

    /// Waiting on an in-flight computation exceeded the configured bound.
    #[error("Timed out after {timeout_ms}ms waiting for {key}")]
    Timeout { key: String, timeout_ms: u64 },

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a database error with optional operation context.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            operation: None,
        }
    }

    /// Create a database error with operation context.
    pub fn database_with_op(message: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            operation: Some(operation.into()),
        }
    }

    /// Create a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: None,
        }
    }

    /// Create a not found error with ID.
    pub fn not_found_with_id(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.into()),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a computation failure for a cache key.
    pub fn computation_failed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ComputationFailed {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this is a structural validation error.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    /// Check if this error came from a failed summarizer run.
    pub fn is_computation_failed(&self) -> bool {
        matches!(self, Self::ComputationFailed { .. })
    }

    /// Check if this is a bounded-wait timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

// Conversions from common error types

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", err))
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(err: crate::db::DbError) -> Self {
        Self::database(err.to_string())
    }
}

impl From<crate::services::artifact_cache::CacheError> for AppError {
    fn from(err: crate::services::artifact_cache::CacheError) -> Self {
        use crate::services::artifact_cache::CacheError;

        match err {
            CacheError::ComputationFailed { key, message } => Self::ComputationFailed { key, message },
            CacheError::Timeout { key, timeout_ms } => Self::Timeout { key, timeout_ms },
            CacheError::Poisoned => Self::internal("artifact cache lock poisoned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = AppError::database("connection failed");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"type\":\"Database\""));
        assert!(json.contains("connection failed"));
    }

    #[test]
    fn test_invalid_input_field() {
        let err = AppError::invalid_input_field("mr_id is required", "mr_id");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"type\":\"InvalidInput\""));
        assert!(json.contains("\"field\":\"mr_id\""));
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_not_found_with_id() {
        let err = AppError::not_found_with_id("MergeRequest", "123");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"resource\":\"MergeRequest\""));
        assert!(json.contains("\"id\":\"123\""));
    }

    #[test]
    fn test_optional_fields_not_serialized() {
        let err = AppError::database("error");
        let json = serde_json::to_string(&err).unwrap();
        // operation is None, so should not appear
        assert!(!json.contains("operation"));
    }

    #[test]
    fn test_cache_error_conversion() {
        use crate::services::artifact_cache::CacheError;

        let err: AppError = CacheError::Timeout {
            key: "mr:7@abc".to_string(),
            timeout_ms: 250,
        }
        .into();
        assert!(err.is_timeout());
        assert_eq!(format!("{}", err), "Timed out after 250ms waiting for mr:7@abc");

        let err: AppError = CacheError::ComputationFailed {
            key: "mr:7@abc".to_string(),
            message: "model unavailable".to_string(),
        }
        .into();
        assert!(err.is_computation_failed());
    }
}
