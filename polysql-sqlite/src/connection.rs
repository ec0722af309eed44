//! SQLite connection.

use polysql_core::{BackendConnection, Column, Driver, FieldAccess, OpenParams, SqlResult, Value};
use tracing::{debug, warn};

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::{SqliteError, SqliteResult};
use crate::row::SqliteField;
use crate::statement::{SqliteQuery, SqliteStatement};
use crate::types::declared_type;

/// Statements the connection prepares for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Helper {
    Begin,
    Commit,
    Rollback,
    TableExists,
    ColumnExists,
    IndexExists,
    TableColumns,
}

impl Helper {
    fn sql(self) -> &'static str {
        match self {
            Self::Begin => "BEGIN TRANSACTION",
            Self::Commit => "COMMIT",
            Self::Rollback => "ROLLBACK",
            Self::TableExists => "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
            Self::ColumnExists => "SELECT 1 FROM pragma_table_info(?1) WHERE name=?2",
            Self::IndexExists => "SELECT 1 FROM pragma_index_list(?1) WHERE name=?2",
            Self::TableColumns => "SELECT name, type FROM pragma_table_info(?1)",
        }
    }
}

/// A session with one SQLite database.
///
/// Helper statements (transactions and introspection) live in the
/// database's prepared statement cache alongside user statements and are
/// released when the connection closes.
#[derive(Debug, Default)]
pub struct SqliteConnection {
    db: Option<rusqlite::Connection>,
}

impl SqliteConnection {
    /// Create an unopened connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a database described by `config`.
    pub fn open_with_config(&mut self, config: &SqliteConfig) -> SqliteResult<()> {
        if self.db.is_some() {
            return Err(SqliteError::AlreadyOpen);
        }

        let db = match &config.path {
            DatabasePath::Memory => {
                rusqlite::Connection::open_in_memory_with_flags(config.open_flags())?
            }
            DatabasePath::File(path) => {
                rusqlite::Connection::open_with_flags(path, config.open_flags())?
            }
        };
        db.set_prepared_statement_cache_capacity(config.statement_cache_capacity);

        let init_sql = config.init_sql();
        if !init_sql.is_empty() {
            db.execute_batch(&init_sql)?;
        }

        debug!(path = ?config.path, "Opened SQLite database");
        self.db = Some(db);
        Ok(())
    }

    /// The native connection.
    pub fn db(&self) -> SqliteResult<&rusqlite::Connection> {
        self.db.as_ref().ok_or(SqliteError::NotOpen)
    }

    /// Bind `params` to a helper statement and run `f` over it.
    ///
    /// The helper is compiled on first use and served from the statement
    /// cache afterwards; it is reset when `f` returns.
    fn with_helper<T>(
        &self,
        helper: Helper,
        params: &[Value<'_>],
        f: impl FnOnce(&mut SqliteQuery<'_>) -> SqliteResult<T>,
    ) -> SqliteResult<T> {
        let mut query = SqliteQuery::prepare(self.db()?, helper.sql())?;
        for (i, value) in params.iter().enumerate() {
            query.bind(i, *value)?;
        }
        f(&mut query)
    }

    fn helper_has_row(&self, helper: Helper, params: &[Value<'_>]) -> SqlResult<bool> {
        Ok(self.with_helper(helper, params, |query| query.step())?)
    }

    fn run_helper(&self, helper: Helper) -> SqlResult<()> {
        Ok(self.with_helper(helper, &[], |query| query.run())?)
    }
}

impl BackendConnection for SqliteConnection {
    type Statement<'c> = SqliteStatement<'c>;

    const DRIVER: Driver = Driver::Sqlite;

    fn open(&mut self, params: &OpenParams) -> SqlResult<()> {
        Ok(self.open_with_config(&SqliteConfig::from_params(params))?)
    }

    fn close(&mut self) -> SqlResult<()> {
        if let Some(db) = self.db.take() {
            if let Err((db, err)) = db.close() {
                warn!(error = %err, "Failed to close SQLite database");
                self.db = Some(db);
                return Err(SqliteError::from(err).into());
            }
            debug!("Closed SQLite database");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.db.is_some()
    }

    fn execute(&self, sql: &str) -> SqlResult<()> {
        debug!(sql = %sql, "Executing SQL");
        self.db()?.execute_batch(sql).map_err(SqliteError::from)?;
        Ok(())
    }

    fn begin_transaction(&self) -> SqlResult<()> {
        self.run_helper(Helper::Begin)
    }

    fn commit_transaction(&self) -> SqlResult<()> {
        self.run_helper(Helper::Commit)
    }

    fn rollback_transaction(&self) -> SqlResult<()> {
        self.run_helper(Helper::Rollback)
    }

    fn last_change_count(&self) -> u64 {
        self.db
            .as_ref()
            .map_or(0, |db| u64::try_from(db.changes()).unwrap_or(0))
    }

    fn does_table_exist(&self, table_name: &str) -> SqlResult<bool> {
        self.helper_has_row(Helper::TableExists, &[Value::Text(table_name)])
    }

    fn does_column_exist(&self, table_name: &str, column_name: &str) -> SqlResult<bool> {
        self.helper_has_row(
            Helper::ColumnExists,
            &[Value::Text(table_name), Value::Text(column_name)],
        )
    }

    fn does_index_exist(&self, table_name: &str, index_name: &str) -> SqlResult<bool> {
        self.helper_has_row(
            Helper::IndexExists,
            &[Value::Text(table_name), Value::Text(index_name)],
        )
    }

    fn table_columns(&self, table_name: &str) -> SqlResult<Vec<Column>> {
        let columns = self.with_helper(
            Helper::TableColumns,
            &[Value::Text(table_name)],
            |query| {
                let mut columns = Vec::new();
                while query.step()? {
                    let field = |i| query.value(i).map(SqliteField::new);
                    let name = field(0).map(|f| f.as_string()).unwrap_or_default();
                    let decl = field(1).map(|f| f.as_string()).unwrap_or_default();
                    columns.push(Column::new(name, declared_type(&decl)));
                }
                Ok(columns)
            },
        )?;
        Ok(columns)
    }

    fn prepare<'c>(&'c self, sql: &str) -> SqlResult<SqliteStatement<'c>> {
        let query = SqliteQuery::prepare(self.db()?, sql)?;
        Ok(SqliteStatement::new(self, query))
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if let Err(err) = BackendConnection::close(self) {
            warn!(error = %err, "Error closing SQLite connection on drop");
        }
    }
}
