//! Type erasure between the facade and the backends.
//!
//! Backends are statically typed (see [`BackendConnection`]); the facade
//! needs to pick one at runtime. [`ConnectionModel`] and [`StatementModel`]
//! are the object-safe versions of the backend contract, and the generic
//! adapters forward every call 1:1.
//!
//! Adding a backend means writing a new backend crate and one arm in
//! [`new_connection_model`].

use polysql_core::{
    BackendConnection, BackendStatement, Column, ColumnType, Driver, FieldAccess, OpenParams,
    SqlResult, Value,
};
use polysql_postgres::PgConnection;
use polysql_sqlite::SqliteConnection;
use tracing::debug;

/// Object-safe connection interface.
pub trait ConnectionModel {
    /// The backend behind this model.
    fn driver(&self) -> Driver;

    /// Open the native session.
    fn open(&mut self, params: &OpenParams) -> SqlResult<()>;

    /// Close the native session.
    fn close(&mut self) -> SqlResult<()>;

    /// Check if the native session is open.
    fn is_open(&self) -> bool;

    /// Execute SQL that produces no result set.
    fn execute(&self, sql: &str) -> SqlResult<()>;

    /// Start a transaction.
    fn begin_transaction(&self) -> SqlResult<()>;

    /// Commit the current transaction.
    fn commit_transaction(&self) -> SqlResult<()>;

    /// Roll back the current transaction.
    fn rollback_transaction(&self) -> SqlResult<()>;

    /// Rows changed by the most recent statement.
    fn last_change_count(&self) -> u64;

    /// Check if a table exists.
    fn does_table_exist(&self, table_name: &str) -> SqlResult<bool>;

    /// Check if a column exists.
    fn does_column_exist(&self, table_name: &str, column_name: &str) -> SqlResult<bool>;

    /// Check if an index exists.
    fn does_index_exist(&self, table_name: &str, index_name: &str) -> SqlResult<bool>;

    /// List a table's columns.
    fn table_columns(&self, table_name: &str) -> SqlResult<Vec<Column>>;

    /// Prepare a statement borrowing this model.
    fn create_statement_model<'c>(&'c self, sql: &str)
    -> SqlResult<Box<dyn StatementModel + 'c>>;
}

/// Object-safe statement interface.
///
/// Accessors read the current row and return zero values when there is none.
pub trait StatementModel {
    /// Check if the statement holds a live prepared handle.
    fn is_prepared(&self) -> bool;

    /// Bind SQL NULL.
    fn bind_null(&mut self, column: usize) -> SqlResult<()>;

    /// Bind a value.
    fn bind(&mut self, column: usize, value: Value<'_>) -> SqlResult<()>;

    /// Number of result columns.
    fn field_count(&self) -> usize;

    /// Coarse type of a column in the current row.
    fn field_type(&self, column: usize) -> ColumnType;

    /// Column as a boolean.
    fn get_bool(&self, column: usize) -> bool;

    /// Column as a 32-bit integer.
    fn get_int(&self, column: usize) -> i32;

    /// Column as a 64-bit integer.
    fn get_int64(&self, column: usize) -> i64;

    /// Column as a double.
    fn get_double(&self, column: usize) -> f64;

    /// Column as text.
    fn get_string(&self, column: usize) -> String;

    /// Column as UTF-16.
    fn get_string16(&self, column: usize) -> Vec<u16>;

    /// Column as bytes.
    fn get_blob(&self, column: usize) -> Vec<u8>;

    /// Execute without reading rows.
    fn run(&mut self) -> SqlResult<()>;

    /// Advance to the next row.
    fn step(&mut self) -> SqlResult<bool>;

    /// Drain results and clear bound values.
    fn reset(&mut self) -> SqlResult<()>;

    /// Release the prepared statement.
    fn close(&mut self) -> SqlResult<()>;
}

/// Adapts a [`BackendConnection`] to [`ConnectionModel`].
#[derive(Debug, Default)]
pub struct ConnectionModelImpl<C> {
    conn: C,
}

impl<C: BackendConnection> ConnectionModelImpl<C> {
    /// Wrap an unopened backend connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// The backend connection.
    pub fn inner(&self) -> &C {
        &self.conn
    }
}

impl<C> ConnectionModel for ConnectionModelImpl<C>
where
    C: BackendConnection + 'static,
{
    fn driver(&self) -> Driver {
        C::DRIVER
    }

    fn open(&mut self, params: &OpenParams) -> SqlResult<()> {
        self.conn.open(params)
    }

    fn close(&mut self) -> SqlResult<()> {
        self.conn.close()
    }

    fn is_open(&self) -> bool {
        self.conn.is_open()
    }

    fn execute(&self, sql: &str) -> SqlResult<()> {
        self.conn.execute(sql)
    }

    fn begin_transaction(&self) -> SqlResult<()> {
        self.conn.begin_transaction()
    }

    fn commit_transaction(&self) -> SqlResult<()> {
        self.conn.commit_transaction()
    }

    fn rollback_transaction(&self) -> SqlResult<()> {
        self.conn.rollback_transaction()
    }

    fn last_change_count(&self) -> u64 {
        self.conn.last_change_count()
    }

    fn does_table_exist(&self, table_name: &str) -> SqlResult<bool> {
        self.conn.does_table_exist(table_name)
    }

    fn does_column_exist(&self, table_name: &str, column_name: &str) -> SqlResult<bool> {
        self.conn.does_column_exist(table_name, column_name)
    }

    fn does_index_exist(&self, table_name: &str, index_name: &str) -> SqlResult<bool> {
        self.conn.does_index_exist(table_name, index_name)
    }

    fn table_columns(&self, table_name: &str) -> SqlResult<Vec<Column>> {
        self.conn.table_columns(table_name)
    }

    fn create_statement_model<'c>(
        &'c self,
        sql: &str,
    ) -> SqlResult<Box<dyn StatementModel + 'c>> {
        let stmt = self.conn.prepare(sql)?;
        Ok(Box::new(StatementModelImpl::new(stmt)))
    }
}

/// Adapts a [`BackendStatement`] to [`StatementModel`].
#[derive(Debug)]
pub struct StatementModelImpl<S> {
    stmt: S,
}

impl<S: BackendStatement> StatementModelImpl<S> {
    /// Wrap a prepared backend statement.
    pub fn new(stmt: S) -> Self {
        Self { stmt }
    }
}

impl<S: BackendStatement> StatementModel for StatementModelImpl<S> {
    fn is_prepared(&self) -> bool {
        self.stmt.is_prepared()
    }

    fn bind_null(&mut self, column: usize) -> SqlResult<()> {
        self.stmt.bind_null(column)
    }

    fn bind(&mut self, column: usize, value: Value<'_>) -> SqlResult<()> {
        self.stmt.bind(column, value)
    }

    fn field_count(&self) -> usize {
        self.stmt.field_count()
    }

    fn field_type(&self, column: usize) -> ColumnType {
        self.stmt
            .field(column)
            .map_or(ColumnType::Null, |field| field.column_type())
    }

    fn get_bool(&self, column: usize) -> bool {
        self.stmt
            .field(column)
            .is_some_and(|field| field.as_bool())
    }

    fn get_int(&self, column: usize) -> i32 {
        self.stmt
            .field(column)
            .map_or(0, |field| field.as_int())
    }

    fn get_int64(&self, column: usize) -> i64 {
        self.stmt
            .field(column)
            .map_or(0, |field| field.as_int64())
    }

    fn get_double(&self, column: usize) -> f64 {
        self.stmt
            .field(column)
            .map_or(0.0, |field| field.as_double())
    }

    fn get_string(&self, column: usize) -> String {
        self.stmt
            .field(column)
            .map(|field| field.as_string())
            .unwrap_or_default()
    }

    fn get_string16(&self, column: usize) -> Vec<u16> {
        self.stmt
            .field(column)
            .map(|field| field.as_string16())
            .unwrap_or_default()
    }

    fn get_blob(&self, column: usize) -> Vec<u8> {
        self.stmt
            .field(column)
            .map(|field| field.as_blob())
            .unwrap_or_default()
    }

    fn run(&mut self) -> SqlResult<()> {
        self.stmt.run()
    }

    fn step(&mut self) -> SqlResult<bool> {
        self.stmt.step()
    }

    fn reset(&mut self) -> SqlResult<()> {
        self.stmt.reset()
    }

    fn close(&mut self) -> SqlResult<()> {
        self.stmt.close()
    }
}

/// Construct an unopened model for `driver`.
pub fn new_connection_model(driver: Driver) -> Box<dyn ConnectionModel> {
    debug!(driver = %driver, "Creating connection model");
    match driver {
        Driver::Sqlite => Box::new(ConnectionModelImpl::<SqliteConnection>::new()),
        Driver::Postgres => Box::new(ConnectionModelImpl::<PgConnection>::new()),
    }
}
