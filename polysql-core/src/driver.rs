//! Driver selection and open parameters.
//!
//! # Driver Names
//!
//! ```rust
//! use polysql_core::Driver;
//!
//! assert_eq!(Driver::from_name("").unwrap(), Driver::Sqlite);
//! assert_eq!(Driver::from_name("sqlite3").unwrap(), Driver::Sqlite);
//! assert_eq!(Driver::from_name("postgresql").unwrap(), Driver::Postgres);
//! assert!(Driver::from_name("mysql").is_err());
//! ```
//!
//! # Open Parameters
//!
//! ```rust
//! use polysql_core::OpenParams;
//!
//! let params = OpenParams::sqlite("/tmp/app.sqlite3")
//!     .exclusive_locking(true)
//!     .journal_size_limit(1 << 20);
//! assert_eq!(params.driver, "sqlite");
//!
//! let params = OpenParams::postgres("host=localhost dbname=app user=postgres");
//! assert_eq!(params.driver, "postgres");
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SqlError, SqlResult};

/// Database backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// Embedded SQLite engine.
    Sqlite,
    /// PostgreSQL server.
    Postgres,
}

impl Driver {
    /// Get the canonical driver name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }

    /// Parse a driver from the name given in [`OpenParams::driver`].
    ///
    /// An empty name selects SQLite.
    pub fn from_name(name: &str) -> SqlResult<Self> {
        let driver = match name.to_ascii_lowercase().as_str() {
            "" | "sqlite" | "sqlite3" => Self::Sqlite,
            "postgres" | "postgresql" => Self::Postgres,
            _ => return Err(SqlError::UnknownDriver(name.to_string())),
        };
        debug!(name = %name, driver = %driver, "Driver::from_name()");
        Ok(driver)
    }
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Driver {
    type Err = SqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// Parameters for opening a connection.
///
/// `driver` selects the backend. `path` and the pragma-style flags are used by
/// SQLite; `connection_string` is handed to PostgreSQL as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenParams {
    /// Backend selector: `""`, `"sqlite"`, `"sqlite3"`, `"postgres"` or `"postgresql"`.
    pub driver: String,
    /// Database file for SQLite. Empty opens an in-memory database.
    pub path: PathBuf,
    /// libpq-style connection string for PostgreSQL.
    pub connection_string: String,
    /// SQLite: hold the database lock for the life of the connection.
    pub exclusive_locking: bool,
    /// SQLite: open in serialized (full mutex) threading mode.
    pub multithreaded: bool,
    /// SQLite: `PRAGMA journal_size_limit`, -1 leaves the engine default.
    pub journal_size_limit: i32,
}

impl Default for OpenParams {
    fn default() -> Self {
        Self {
            driver: String::new(),
            path: PathBuf::new(),
            connection_string: String::new(),
            exclusive_locking: false,
            multithreaded: false,
            journal_size_limit: -1,
        }
    }
}

impl OpenParams {
    /// Parameters for a SQLite database file.
    pub fn sqlite(path: impl AsRef<Path>) -> Self {
        Self {
            driver: Driver::Sqlite.name().to_string(),
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Parameters for an in-memory SQLite database.
    pub fn sqlite_memory() -> Self {
        Self {
            driver: Driver::Sqlite.name().to_string(),
            ..Default::default()
        }
    }

    /// Parameters for a PostgreSQL server.
    pub fn postgres(connection_string: impl Into<String>) -> Self {
        Self {
            driver: Driver::Postgres.name().to_string(),
            connection_string: connection_string.into(),
            ..Default::default()
        }
    }

    /// Resolve the driver name.
    pub fn resolve_driver(&self) -> SqlResult<Driver> {
        Driver::from_name(&self.driver)
    }

    /// Set the driver name.
    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }

    /// Set the database path.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = path.as_ref().to_path_buf();
        self
    }

    /// Set the connection string.
    pub fn connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = connection_string.into();
        self
    }

    /// Enable or disable exclusive locking.
    pub fn exclusive_locking(mut self, enabled: bool) -> Self {
        self.exclusive_locking = enabled;
        self
    }

    /// Enable or disable serialized threading mode.
    pub fn multithreaded(mut self, enabled: bool) -> Self {
        self.multithreaded = enabled;
        self
    }

    /// Set the journal size limit in bytes.
    pub fn journal_size_limit(mut self, limit: i32) -> Self {
        self.journal_size_limit = limit;
        self
    }
}
