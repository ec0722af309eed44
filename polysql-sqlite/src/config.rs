//! SQLite configuration.

use std::path::{Path, PathBuf};

use polysql_core::OpenParams;
use rusqlite::OpenFlags;

/// Default capacity of the engine-side prepared statement cache.
pub const DEFAULT_STATEMENT_CACHE_CAPACITY: usize = 64;

/// SQLite database configuration.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database path (or ":memory:" for in-memory).
    pub path: DatabasePath,
    /// Hold the database lock for the life of the connection.
    pub exclusive_locking: bool,
    /// Open in serialized threading mode.
    pub multithreaded: bool,
    /// Journal size limit in bytes.
    pub journal_size_limit: Option<i32>,
    /// Capacity of the prepared statement cache.
    pub statement_cache_capacity: usize,
}

/// Database path configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DatabasePath {
    /// In-memory database.
    #[default]
    Memory,
    /// File-based database.
    File(PathBuf),
}

impl DatabasePath {
    /// Check if this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: DatabasePath::Memory,
            exclusive_locking: false,
            multithreaded: false,
            journal_size_limit: None,
            statement_cache_capacity: DEFAULT_STATEMENT_CACHE_CAPACITY,
        }
    }
}

impl SqliteConfig {
    /// Create a new configuration for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Create a new configuration for a file-based database.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            path: DatabasePath::File(path.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    /// Build the configuration from open parameters.
    ///
    /// An empty path, `:memory:` or `sqlite::memory:` selects an in-memory database.
    pub fn from_params(params: &OpenParams) -> Self {
        let path = match params.path.to_str() {
            Some("" | ":memory:" | "sqlite::memory:") => DatabasePath::Memory,
            _ => DatabasePath::File(params.path.clone()),
        };

        Self {
            path,
            exclusive_locking: params.exclusive_locking,
            multithreaded: params.multithreaded,
            journal_size_limit: (params.journal_size_limit != -1)
                .then_some(params.journal_size_limit),
            ..Default::default()
        }
    }

    /// Flags passed to the engine's open call.
    pub fn open_flags(&self) -> OpenFlags {
        let threading = if self.multithreaded {
            OpenFlags::SQLITE_OPEN_FULL_MUTEX
        } else {
            OpenFlags::SQLITE_OPEN_NO_MUTEX
        };

        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | threading
    }

    /// Generate the initialization SQL for this configuration.
    pub fn init_sql(&self) -> String {
        let mut sql = String::new();

        if self.exclusive_locking {
            sql.push_str("PRAGMA locking_mode=EXCLUSIVE;\n");
        }

        if let Some(limit) = self.journal_size_limit {
            sql.push_str(&format!("PRAGMA journal_size_limit={};\n", limit));
        }

        sql
    }

    /// Enable or disable exclusive locking.
    pub fn exclusive_locking(mut self, enabled: bool) -> Self {
        self.exclusive_locking = enabled;
        self
    }

    /// Set the journal size limit.
    pub fn journal_size_limit(mut self, limit: i32) -> Self {
        self.journal_size_limit = Some(limit);
        self
    }

    /// Set the prepared statement cache capacity.
    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_memory() {
        let config = SqliteConfig::memory();
        assert!(config.path.is_memory());
        assert!(config.init_sql().is_empty());
    }

    #[test]
    fn test_config_file() {
        let config = SqliteConfig::file("test.db");
        assert_eq!(config.path, DatabasePath::File(PathBuf::from("test.db")));
    }

    #[test]
    fn test_from_params_memory() {
        let config = SqliteConfig::from_params(&OpenParams::sqlite_memory());
        assert!(config.path.is_memory());

        let config = SqliteConfig::from_params(&OpenParams::sqlite(":memory:"));
        assert!(config.path.is_memory());
    }

    #[test]
    fn test_from_params_init_sql() {
        let params = OpenParams::sqlite("app.db")
            .exclusive_locking(true)
            .journal_size_limit(1024);
        let config = SqliteConfig::from_params(&params);

        assert_eq!(
            config.init_sql(),
            "PRAGMA locking_mode=EXCLUSIVE;\nPRAGMA journal_size_limit=1024;\n"
        );
    }

    #[test]
    fn test_journal_size_limit_unset() {
        let config = SqliteConfig::from_params(&OpenParams::sqlite("app.db"));
        assert_eq!(config.journal_size_limit, None);
    }

    #[test]
    fn test_open_flags_threading() {
        let config = SqliteConfig::memory();
        assert!(config.open_flags().contains(OpenFlags::SQLITE_OPEN_NO_MUTEX));

        let config = SqliteConfig::from_params(&OpenParams::sqlite_memory().multithreaded(true));
        assert!(config.open_flags().contains(OpenFlags::SQLITE_OPEN_FULL_MUTEX));
        assert!(!config.open_flags().contains(OpenFlags::SQLITE_OPEN_NO_MUTEX));
    }
}
