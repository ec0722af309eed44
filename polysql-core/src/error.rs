//! Error types shared by every backend.
//!
//! Errors fall into two groups:
//!
//! - **Misuse**: the caller broke a precondition (unknown driver, reopening an
//!   open connection, using an unprepared statement, binding out of range).
//!   These are never produced by the database and retrying cannot help.
//! - **Backend**: a native call failed. The error carries the backend's own
//!   message text (and SQLSTATE code when the backend reports one).

use thiserror::Error;

use crate::driver::Driver;

/// Result type for polysql operations.
pub type SqlResult<T> = Result<T, SqlError>;

/// Errors surfaced through the backend-agnostic API.
#[derive(Error, Debug)]
pub enum SqlError {
    /// The driver name in `OpenParams` is not recognized.
    #[error("unknown SQL driver: '{0}'")]
    UnknownDriver(String),

    /// `open` was called on a connection that is already open.
    #[error("connection is already open")]
    AlreadyOpen,

    /// The connection has not been opened, or was closed.
    #[error("connection is not open")]
    NotOpen,

    /// The statement has not been prepared, or was closed.
    #[error("statement is not prepared")]
    NotPrepared,

    /// A parameter index outside the prepared statement's slot range.
    #[error("parameter index {index} out of range (statement has {count} parameters)")]
    ParameterOutOfRange {
        /// Zero-based parameter index passed by the caller.
        index: usize,
        /// Number of parameter slots in the prepared statement.
        count: usize,
    },

    /// The statement was used in a state that does not allow the call.
    #[error("statement misuse: {0}")]
    Misuse(String),

    /// A native backend call failed.
    #[error("{driver} error: {message}")]
    Backend {
        /// The backend that produced the error.
        driver: Driver,
        /// The backend's own message text.
        message: String,
        /// SQLSTATE (PostgreSQL) or extended result code (SQLite), if known.
        code: Option<String>,
    },
}

impl SqlError {
    /// Create a misuse error.
    pub fn misuse(message: impl Into<String>) -> Self {
        Self::Misuse(message.into())
    }

    /// Create a backend error without a code.
    pub fn backend(driver: Driver, message: impl Into<String>) -> Self {
        Self::Backend {
            driver,
            message: message.into(),
            code: None,
        }
    }

    /// Create a backend error carrying a backend-specific code.
    pub fn backend_with_code(
        driver: Driver,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self::Backend {
            driver,
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// Check if this error is a broken precondition rather than a database failure.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            Self::UnknownDriver(_)
                | Self::AlreadyOpen
                | Self::NotOpen
                | Self::NotPrepared
                | Self::ParameterOutOfRange { .. }
                | Self::Misuse(_)
        )
    }

    /// Check if this error came from a backend.
    pub fn is_backend_error(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }

    /// The backend-specific error code, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Backend { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(SqlError::UnknownDriver("mysql".into()).is_misuse());
        assert!(SqlError::AlreadyOpen.is_misuse());
        assert!(SqlError::ParameterOutOfRange { index: 3, count: 2 }.is_misuse());

        let err = SqlError::backend(Driver::Sqlite, "no such table: t");
        assert!(!err.is_misuse());
        assert!(err.is_backend_error());
        assert_eq!(err.code(), None);
    }

    #[test]
    fn test_error_display() {
        let err = SqlError::UnknownDriver("oracle".into());
        assert_eq!(err.to_string(), "unknown SQL driver: 'oracle'");

        let err = SqlError::backend_with_code(
            Driver::Postgres,
            "relation \"t\" does not exist",
            "42P01",
        );
        assert_eq!(err.to_string(), "postgres error: relation \"t\" does not exist");
        assert_eq!(err.code(), Some("42P01"));
    }

    #[test]
    fn test_parameter_out_of_range_display() {
        let err = SqlError::ParameterOutOfRange { index: 5, count: 3 };
        assert!(err.to_string().contains("index 5"));
        assert!(err.to_string().contains("3 parameters"));
    }
}
