//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  StatementError (kasir-core)     sqlx::Error (driver)                   │
//! │  bad identifier, empty WHERE     constraint, syntax, network            │
//! │       │                                │                                │
//! │       └──────────────┬─────────────────┘                                │
//! │                      ▼                                                  │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ClientError (kasir-sync) ← when the local mirror write fails          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use kasir_core::StatementError;
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Configuration is unusable.
    ///
    /// ## When This Occurs
    /// - Unknown driver name (`oracle`, typo)
    /// - DSN with an unsupported scheme
    /// - Option value that does not parse
    #[error("Invalid database configuration: {0}")]
    InvalidConfig(String),

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Host unreachable / refused
    /// - Authentication rejected
    /// - SQLite file cannot be created
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate primary key
    /// - Any UNIQUE index violation
    #[error("Unique constraint violated: {message}")]
    UniqueViolation { message: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// The structured request could not be turned into SQL.
    #[error("Invalid statement: {0}")]
    Statement(#[from] StatementError),

    /// Query execution failed.
    ///
    /// ## When This Occurs
    /// - SQL syntax error
    /// - Unknown table or column
    /// - Any other constraint (NOT NULL, CHECK)
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A column value could not be read back.
    #[error("Failed to decode column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Beginning or committing a transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// No connection became available within the acquire timeout.
    ///
    /// Also the symptom of calling the outer handle from inside a
    /// transaction callback on a single-connection handle.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Returns true for unique / foreign-key violations.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. }
        )
    }

    /// Returns true for errors raised while building the connection.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DbError::InvalidConfig(_) | DbError::ConnectionFailed(_) | DbError::PoolExhausted
        )
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → UniqueViolation / ForeignKeyViolation / QueryFailed
/// sqlx::Error::Configuration  → InvalidConfig
/// sqlx::Error::Io / Tls       → ConnectionFailed
/// sqlx::Error::PoolTimedOut   → PoolExhausted
/// sqlx::Error::ColumnDecode   → Decode
/// Other                       → Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                if db_err.is_unique_violation() {
                    DbError::UniqueViolation { message }
                } else if db_err.is_foreign_key_violation() {
                    DbError::ForeignKeyViolation { message }
                } else {
                    DbError::QueryFailed(message)
                }
            }

            sqlx::Error::Configuration(e) => DbError::InvalidConfig(e.to_string()),

            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),

            sqlx::Error::Tls(e) => DbError::ConnectionFailed(e.to_string()),

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::ColumnDecode { index, source } => DbError::Decode {
                column: index,
                message: source.to_string(),
            },

            sqlx::Error::RowNotFound => DbError::QueryFailed("no rows returned".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_map() {
        assert!(matches!(DbError::from(sqlx::Error::PoolTimedOut), DbError::PoolExhausted));
        assert!(DbError::from(sqlx::Error::PoolClosed).is_connection_error());
    }

    #[test]
    fn test_statement_error_converts() {
        let err: DbError = StatementError::EmptyFields { clause: "WHERE" }.into();
        assert!(matches!(err, DbError::Statement(_)));
        assert_eq!(
            err.to_string(),
            "Invalid statement: WHERE requires at least one column"
        );
    }
}
