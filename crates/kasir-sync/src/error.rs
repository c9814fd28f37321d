//! # Client Error Types
//!
//! Error types for integrator client operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Client Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Validation    │  │   Transport     │  │     Configuration       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Required field │  │  Transport      │  │  InvalidConfig          │ │
//! │  │  RequiredAt[i]  │  │  HttpStatus     │  │  InvalidUrl             │ │
//! │  │  (no request    │  │                 │  │  ConfigLoadFailed       │ │
//! │  │   is sent)      │  │                 │  │  ConfigSaveFailed       │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Database     │  │     Codec       │                              │
//! │  │  local mirror   │  │  decode failed  │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## One Policy
//! Every client operation returns `ClientResult<T>`. A validation failure is
//! an `Err` just like a transport failure; callers match on the variant.

use kasir_core::{CodecError, ValidationError};
use kasir_db::DbError;
use thiserror::Error;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Integrator client error type.
#[derive(Debug, Error)]
pub enum ClientError {
    // =========================================================================
    // Input Errors
    // =========================================================================
    /// A required field was missing or empty.
    ///
    /// ## When This Occurs
    /// - `fetch_group_pos` without `group_pos`, `browser` or `waktu`
    /// - An update call with an empty id / status / token
    /// - A bulk item without `status` or `data`
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The request could not be completed.
    ///
    /// ## When This Occurs
    /// - Host unreachable / connection refused
    /// - Timeout
    /// - TLS failure
    #[error("Request failed: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("Integrator returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid integrator base URL.
    #[error("Invalid integrator URL: {0}")]
    InvalidUrl(String),

    /// Invalid application configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Data Errors
    // =========================================================================
    /// A request body could not be serialized.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// The local mirror write failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// A stored value could not be decoded.
    #[error("Decode failed: {0}")]
    Codec(#[from] CodecError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return ClientError::InvalidUrl(err.to_string());
        }
        if let Some(status) = err.status() {
            return ClientError::HttpStatus {
                status: status.as_u16(),
                body: err.to_string(),
            };
        }
        ClientError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ClientError {
    fn from(err: toml::ser::Error) -> Self {
        ClientError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl ClientError {
    /// Returns true if sending the same request again may succeed.
    ///
    /// ## Retryable Errors
    /// - Transport failures
    /// - 5xx responses
    /// - 429 Too Many Requests
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns true if the input was rejected before any request was sent.
    pub fn is_validation_error(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidConfig(_)
                | ClientError::InvalidUrl(_)
                | ClientError::ConfigLoadFailed(_)
                | ClientError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ClientError::Transport("connection refused".into()).is_retryable());
        assert!(ClientError::HttpStatus { status: 503, body: String::new() }.is_retryable());
        assert!(ClientError::HttpStatus { status: 429, body: String::new() }.is_retryable());

        assert!(!ClientError::HttpStatus { status: 404, body: String::new() }.is_retryable());
        assert!(!ClientError::InvalidConfig("bad".into()).is_retryable());
    }

    #[test]
    fn test_validation_error_display() {
        let err: ClientError = ValidationError::RequiredAt {
            index: 2,
            field: "data".into(),
        }
        .into();
        assert!(err.is_validation_error());
        assert!(err.to_string().contains("data"));
        assert!(err.to_string().contains('2'));
    }
}
