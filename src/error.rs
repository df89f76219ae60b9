//! Error types for the adapter.
//!
//! All errors are defined with `thiserror`. Statement errors keep the
//! driver's machine-readable code (SQLSTATE or engine result code) because
//! higher layers distinguish failure kinds by it, e.g. duplicate key vs
//! missing table.

use thiserror::Error;

/// Classified kind of a failed statement, derived from the driver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementErrorKind {
    UniqueViolation,
    ForeignKeyViolation,
    NotNullViolation,
    CheckViolation,
    Other,
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("connection failed: {message}")]
    Connection { message: String },

    #[error("statement failed: {message}")]
    Statement {
        message: String,
        /// e.g. "23000" for a MySQL duplicate entry, "1555" for a SQLite
        /// primary-key constraint
        code: Option<String>,
        kind: StatementErrorKind,
    },

    #[error("invalid transaction isolation level [{code}]")]
    InvalidIsolationLevel { code: String },

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a statement error without driver metadata.
    pub fn statement(message: impl Into<String>) -> Self {
        Self::Statement {
            message: message.into(),
            code: None,
            kind: StatementErrorKind::Other,
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

    /// The driver's machine-readable code, if the underlying engine
    /// reported one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Statement { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// True when the statement failed on a unique/primary-key constraint.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::Statement {
                kind: StatementErrorKind::UniqueViolation,
                ..
            }
        )
    }

    /// True for errors raised before any I/O took place.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidIsolationLevel { .. } | Self::Config { .. }
        )
    }
}

fn classify(kind: sqlx::error::ErrorKind) -> StatementErrorKind {
    match kind {
        sqlx::error::ErrorKind::UniqueViolation => StatementErrorKind::UniqueViolation,
        sqlx::error::ErrorKind::ForeignKeyViolation => StatementErrorKind::ForeignKeyViolation,
        sqlx::error::ErrorKind::NotNullViolation => StatementErrorKind::NotNullViolation,
        sqlx::error::ErrorKind::CheckViolation => StatementErrorKind::CheckViolation,
        _ => StatementErrorKind::Other,
    }
}

/// Convert sqlx errors to DbError, preserving the driver code verbatim.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::config(msg.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                let kind = classify(db_err.kind());
                DbError::Statement {
                    message: db_err.message().to_string(),
                    code,
                    kind,
                }
            }
            sqlx::Error::PoolTimedOut => {
                DbError::connection("timed out waiting for a pooled connection")
            }
            sqlx::Error::PoolClosed => DbError::connection("connection pool is closed"),
            sqlx::Error::Io(io_err) => DbError::connection(format!("I/O error: {io_err}")),
            sqlx::Error::Tls(tls_err) => DbError::connection(format!("TLS error: {tls_err}")),
            sqlx::Error::Protocol(msg) => DbError::connection(format!("protocol error: {msg}")),
            other => DbError::internal(other.to_string()),
        }
    }
}

/// Result type alias for adapter operations.
pub type DbResult<T> = Result<T, DbError>;
