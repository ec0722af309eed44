//! Error types for PostgreSQL operations.

use polysql_core::{Driver, SqlError};
use thiserror::Error;

/// Result type for PostgreSQL operations.
pub type PgResult<T> = Result<T, PgError>;

/// Errors that can occur during PostgreSQL operations.
#[derive(Error, Debug)]
pub enum PgError {
    /// The server answered with an ErrorResponse.
    #[error("{severity}: {message}")]
    Server {
        /// Severity, e.g. `ERROR` or `FATAL`.
        severity: String,
        /// SQLSTATE code.
        code: String,
        /// Primary message.
        message: String,
        /// Optional detail line.
        detail: Option<String>,
    },

    /// Socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server sent something the session did not expect.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection or authentication error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Another statement's results are still being streamed.
    #[error("connection is busy streaming results of statement '{0}'")]
    Busy(String),

    /// A value does not match the type of its parameter slot.
    #[error("cannot bind {value} to a parameter of type {type_name}")]
    TypeMismatch {
        /// Host type of the value.
        value: &'static str,
        /// Name of the slot's type.
        type_name: String,
    },

    /// A value does not fit the target type.
    #[error("type conversion error: {0}")]
    TypeConversion(String),

    /// The slot's type has no binary encoding here.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// The connection is not open.
    #[error("connection is not open")]
    NotOpen,

    /// The connection is already open.
    #[error("connection is already open")]
    AlreadyOpen,

    /// Parameter index outside the statement's slots.
    #[error("parameter index {index} out of range (statement has {count} parameters)")]
    ParameterOutOfRange {
        /// Zero-based index.
        index: usize,
        /// Number of parameters.
        count: usize,
    },

    /// The statement was used in a state that does not allow the call.
    #[error("statement misuse: {0}")]
    Misuse(String),
}

impl PgError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a type conversion error.
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion(message.into())
    }

    /// Create a misuse error.
    pub fn misuse(message: impl Into<String>) -> Self {
        Self::Misuse(message.into())
    }

    /// Check if this is a connection error.
    ///
    /// After one of these the session can no longer be trusted.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Protocol(_) | Self::Connection(_))
    }

    /// The SQLSTATE code, if the server reported one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Server { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<PgError> for SqlError {
    fn from(err: PgError) -> Self {
        match err {
            PgError::NotOpen => SqlError::NotOpen,
            PgError::AlreadyOpen => SqlError::AlreadyOpen,
            PgError::ParameterOutOfRange { index, count } => {
                SqlError::ParameterOutOfRange { index, count }
            }
            PgError::Misuse(msg) => SqlError::Misuse(msg),
            err @ (PgError::Busy(_) | PgError::TypeMismatch { .. }) => {
                SqlError::Misuse(err.to_string())
            }
            PgError::Server {
                code,
                message,
                detail,
                ..
            } => {
                let message = match detail {
                    Some(detail) => format!("{message}\nDETAIL: {detail}"),
                    None => message,
                };
                SqlError::backend_with_code(Driver::Postgres, message, code)
            }
            other => SqlError::backend(Driver::Postgres, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PgError::config("invalid URL");
        assert!(matches!(err, PgError::Config(_)));

        let err = PgError::connection("connection refused");
        assert!(err.is_connection_error());

        let err = PgError::Busy("s1".to_string());
        assert!(!err.is_connection_error());
        assert!(err.to_string().contains("s1"));
    }

    #[test]
    fn test_server_error_into_sql_error() {
        let err = PgError::Server {
            severity: "ERROR".to_string(),
            code: "42P01".to_string(),
            message: "relation \"missing\" does not exist".to_string(),
            detail: None,
        };
        assert_eq!(err.code(), Some("42P01"));

        let err: SqlError = err.into();
        assert!(err.is_backend_error());
        assert_eq!(err.code(), Some("42P01"));
        assert!(err.to_string().contains("relation \"missing\" does not exist"));
    }

    #[test]
    fn test_precondition_errors_map_to_misuse() {
        let err: SqlError = PgError::ParameterOutOfRange { index: 3, count: 1 }.into();
        assert!(err.is_misuse());

        let err: SqlError = PgError::TypeMismatch {
            value: "f64",
            type_name: "int4".to_string(),
        }
        .into();
        assert!(err.is_misuse());

        let err: SqlError = PgError::Busy("s0".to_string()).into();
        assert!(err.is_misuse());
    }

    #[test]
    fn test_io_error_is_backend_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: SqlError = PgError::from(io).into();
        assert!(err.is_backend_error());
        assert!(err.code().is_none());
    }
}
