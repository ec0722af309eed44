//! Error types for SQLite operations.

use std::fmt;

use polysql_core::{Driver, SqlError};

/// Result type for SQLite operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Error type for SQLite operations.
#[derive(Debug)]
pub enum SqliteError {
    /// SQLite engine error.
    Sqlite(rusqlite::Error),
    /// Configuration error.
    Config(String),
    /// The connection is not open.
    NotOpen,
    /// The connection is already open.
    AlreadyOpen,
    /// Parameter index outside the statement's slots.
    ParameterOutOfRange {
        /// Zero-based index.
        index: usize,
        /// Number of parameters.
        count: usize,
    },
    /// The statement was used in a state that does not allow the call.
    Misuse(String),
}

impl SqliteError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a misuse error.
    pub fn misuse(msg: impl Into<String>) -> Self {
        Self::Misuse(msg.into())
    }

    /// The engine's extended result code, if this is an engine failure.
    pub fn extended_code(&self) -> Option<i32> {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => Some(err.extended_code),
            _ => None,
        }
    }
}

impl fmt::Display for SqliteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "{}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::NotOpen => write!(f, "connection is not open"),
            Self::AlreadyOpen => write!(f, "connection is already open"),
            Self::ParameterOutOfRange { index, count } => write!(
                f,
                "parameter index {} out of range (statement has {} parameters)",
                index, count
            ),
            Self::Misuse(msg) => write!(f, "statement misuse: {}", msg),
        }
    }
}

impl std::error::Error for SqliteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for SqliteError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(err)
    }
}

impl From<SqliteError> for SqlError {
    fn from(err: SqliteError) -> Self {
        let code = err.extended_code();
        match err {
            SqliteError::NotOpen => SqlError::NotOpen,
            SqliteError::AlreadyOpen => SqlError::AlreadyOpen,
            SqliteError::ParameterOutOfRange { index, count } => {
                SqlError::ParameterOutOfRange { index, count }
            }
            SqliteError::Misuse(msg) => SqlError::Misuse(msg),
            SqliteError::Config(msg) => SqlError::backend(Driver::Sqlite, msg),
            SqliteError::Sqlite(e) => match code {
                Some(code) => {
                    SqlError::backend_with_code(Driver::Sqlite, e.to_string(), code.to_string())
                }
                None => SqlError::backend(Driver::Sqlite, e.to_string()),
            },
        }
    }
}
