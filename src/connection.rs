//! The backend-agnostic connection.

use polysql_core::{Column, Driver, OpenParams, SqlError, SqlResult};
use tracing::{debug, info};

use crate::model::{ConnectionModel, new_connection_model};
use crate::statement::Statement;

/// A connection to a SQLite database or PostgreSQL server.
///
/// The backend is picked at runtime from [`OpenParams::driver`].
/// [`Statement`]s borrow the connection, so it cannot be closed or dropped
/// while one of them is alive.
///
/// ```rust
/// use polysql::{Connection, OpenParams};
///
/// let conn = Connection::connect(&OpenParams::sqlite_memory()).unwrap();
/// conn.execute("CREATE TABLE t(a INTEGER)").unwrap();
/// assert!(conn.does_table_exist("t").unwrap());
/// ```
#[derive(Default)]
pub struct Connection {
    model: Option<Box<dyn ConnectionModel>>,
}

impl Connection {
    /// Create an unopened connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and open a connection.
    pub fn connect(params: &OpenParams) -> SqlResult<Self> {
        let mut conn = Self::new();
        conn.open(params)?;
        Ok(conn)
    }

    /// Open the connection with the backend named in `params`.
    ///
    /// A failed open leaves the connection unopened.
    pub fn open(&mut self, params: &OpenParams) -> SqlResult<()> {
        if self.model.is_some() {
            return Err(SqlError::AlreadyOpen);
        }

        let driver = params.resolve_driver()?;
        let mut model = new_connection_model(driver);
        model.open(params)?;

        info!(driver = %driver, "Connection opened");
        self.model = Some(model);
        Ok(())
    }

    /// Close the connection. Closing an unopened connection does nothing.
    pub fn close(&mut self) -> SqlResult<()> {
        if let Some(mut model) = self.model.take() {
            if let Err(err) = model.close() {
                self.model = Some(model);
                return Err(err);
            }
            debug!(driver = %model.driver(), "Connection closed");
        }
        Ok(())
    }

    /// Check if the connection is open.
    pub fn is_open(&self) -> bool {
        self.model.as_ref().is_some_and(|model| model.is_open())
    }

    /// The backend in use, if open.
    pub fn driver(&self) -> Option<Driver> {
        self.model.as_ref().map(|model| model.driver())
    }

    pub(crate) fn model(&self) -> SqlResult<&dyn ConnectionModel> {
        self.model.as_deref().ok_or(SqlError::NotOpen)
    }

    /// Execute one or more SQL statements that produce no result set.
    pub fn execute(&self, sql: &str) -> SqlResult<()> {
        self.model()?.execute(sql)
    }

    /// Prepare a statement on this connection.
    pub fn prepare(&self, sql: &str) -> SqlResult<Statement<'_>> {
        Statement::new(self, sql)
    }

    /// Start a transaction.
    pub fn begin_transaction(&self) -> SqlResult<()> {
        self.model()?.begin_transaction()
    }

    /// Commit the current transaction.
    pub fn commit_transaction(&self) -> SqlResult<()> {
        self.model()?.commit_transaction()
    }

    /// Roll back the current transaction.
    pub fn rollback_transaction(&self) -> SqlResult<()> {
        self.model()?.rollback_transaction()
    }

    /// Rows changed by the most recently executed statement; 0 when unopened.
    pub fn last_change_count(&self) -> u64 {
        self.model
            .as_ref()
            .map_or(0, |model| model.last_change_count())
    }

    /// Check if a table exists.
    pub fn does_table_exist(&self, table_name: &str) -> SqlResult<bool> {
        self.model()?.does_table_exist(table_name)
    }

    /// Check if a column exists in a table.
    pub fn does_column_exist(&self, table_name: &str, column_name: &str) -> SqlResult<bool> {
        self.model()?.does_column_exist(table_name, column_name)
    }

    /// Check if an index exists on a table.
    pub fn does_index_exist(&self, table_name: &str, index_name: &str) -> SqlResult<bool> {
        self.model()?.does_index_exist(table_name, index_name)
    }

    /// List a table's columns with their coarse types.
    pub fn table_columns(&self, table_name: &str) -> SqlResult<Vec<Column>> {
        self.model()?.table_columns(table_name)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("driver", &self.driver())
            .field("is_open", &self.is_open())
            .finish()
    }
}
