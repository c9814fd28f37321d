//! # Error Types
//!
//! Domain-specific error types for kasir-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kasir-core errors (this file)                                         │
//! │  ├── StatementError   - SQL could not be built / parameters mismatch   │
//! │  ├── CodecError       - Ciphertext could not be decoded                │
//! │  └── ValidationError  - Required input missing or empty                │
//! │                                                                         │
//! │  kasir-db errors (separate crate)                                      │
//! │  └── DbError          - Wraps StatementError + driver failures         │
//! │                                                                         │
//! │  kasir-sync errors (separate crate)                                    │
//! │  └── ClientError      - Wraps ValidationError + transport failures     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (table, column, index)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Statement Error
// =============================================================================

/// Failures while turning a structured request into SQL text and binds.
///
/// These are raised before anything reaches the driver, so a statement
/// error never leaves the database in a partially written state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatementError {
    /// A table or column name contains characters outside `[A-Za-z0-9_.]`.
    ///
    /// ## When This Occurs
    /// - Column names taken from untrusted input
    /// - Table names with spaces, quotes or SQL fragments
    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    /// An insert/update/delete was requested with no columns.
    ///
    /// An empty WHERE map is rejected too: the builder never emits an
    /// unconditional UPDATE or DELETE.
    #[error("{clause} requires at least one column")]
    EmptyFields { clause: &'static str },

    /// A row in a batch does not carry the same column set as the first row.
    #[error("Row {index} has columns {found:?}, expected {expected:?}")]
    MismatchedColumns {
        index: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// A `:name` reference in the SQL has no bound value.
    #[error("Missing value for named parameter ':{0}'")]
    MissingParameter(String),

    /// A named value was supplied but never referenced by the SQL.
    #[error("Named parameter ':{0}' is not used by the statement")]
    UnusedParameter(String),

    /// The number of `?` placeholders does not match the supplied values.
    #[error("Statement has {expected} placeholders but {actual} values were bound")]
    ParameterCount { expected: usize, actual: usize },
}

// =============================================================================
// Codec Error
// =============================================================================

/// Decode failures for the reversible string codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Input is not standard base64.
    #[error("Input is not valid base64: {0}")]
    InvalidBase64(String),

    /// Ciphertext length or padding is wrong (usually: different secret).
    #[error("Ciphertext could not be decrypted with the configured secret")]
    InvalidCiphertext,

    /// Decrypted bytes are not UTF-8.
    #[error("Decoded value is not valid UTF-8")]
    InvalidUtf8,
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These are produced before a request is sent, and are returned as values
/// so callers can match on them instead of losing them in a log line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// A required field is missing or empty on one item of a batch.
    #[error("{field} is required (item {index})")]
    RequiredAt { index: usize, field: String },
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::RequiredAt { field, .. } => field,
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result of building a statement.
pub type StatementResult<T> = Result<T, StatementError>;

/// Result of a validation check.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_error_messages() {
        let err = StatementError::EmptyFields { clause: "WHERE" };
        assert_eq!(err.to_string(), "WHERE requires at least one column");

        let err = StatementError::MissingParameter("id".to_string());
        assert_eq!(err.to_string(), "Missing value for named parameter ':id'");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "waktu".to_string(),
        };
        assert_eq!(err.to_string(), "waktu is required");
        assert_eq!(err.field(), "waktu");

        let err = ValidationError::RequiredAt {
            index: 2,
            field: "status".to_string(),
        };
        assert_eq!(err.to_string(), "status is required (item 2)");
    }
}
