//! The contract every backend implements.
//!
//! Backends are statically typed: a backend connection hands out statements
//! that borrow it, and a statement hands out field views that borrow the
//! current row. The root `polysql` crate erases these types behind trait
//! objects so applications can pick a backend at runtime.

use crate::driver::{Driver, OpenParams};
use crate::error::SqlResult;
use crate::types::{Column, ColumnType, Value};

/// Read-only access to one column of the current row.
///
/// Reading a column as an incompatible or narrower type yields a zero or
/// empty value instead of an error.
pub trait FieldAccess {
    /// Coarse type of the value, `ColumnType::Null` for SQL NULL.
    fn column_type(&self) -> ColumnType;

    /// Value as a 64-bit integer.
    fn as_int64(&self) -> i64;

    /// Value as a double.
    fn as_double(&self) -> f64;

    /// Value as text.
    fn as_string(&self) -> String;

    /// Value as raw bytes.
    fn as_blob(&self) -> Vec<u8>;

    /// Check if the value is SQL NULL.
    fn is_null(&self) -> bool {
        self.column_type() == ColumnType::Null
    }

    /// Value as a boolean (non-zero integer).
    fn as_bool(&self) -> bool {
        self.as_int64() != 0
    }

    /// Value as a 32-bit integer, zero if it does not fit.
    fn as_int(&self) -> i32 {
        i32::try_from(self.as_int64()).unwrap_or(0)
    }

    /// Value as UTF-16 code units.
    fn as_string16(&self) -> Vec<u16> {
        self.as_string().encode_utf16().collect()
    }
}

/// A prepared statement owned by one backend.
///
/// Column indices and parameter indices are zero-based.
pub trait BackendStatement {
    /// View over one column of the current row.
    type Field<'s>: FieldAccess
    where
        Self: 's;

    /// Check if the statement holds a live prepared handle.
    fn is_prepared(&self) -> bool;

    /// Bind SQL NULL to a parameter slot.
    fn bind_null(&mut self, column: usize) -> SqlResult<()>;

    /// Bind a value to a parameter slot.
    fn bind(&mut self, column: usize, value: Value<'_>) -> SqlResult<()>;

    /// Number of result columns.
    fn field_count(&self) -> usize;

    /// View a column of the current row, `None` without a current row or
    /// for an out-of-range index.
    fn field(&self, column: usize) -> Option<Self::Field<'_>>;

    /// Execute without reading rows.
    fn run(&mut self) -> SqlResult<()>;

    /// Advance to the next row, executing on the first call after prepare or reset.
    fn step(&mut self) -> SqlResult<bool>;

    /// Drain pending results and clear bound values.
    fn reset(&mut self) -> SqlResult<()>;

    /// Release the backend's prepared statement.
    fn close(&mut self) -> SqlResult<()>;
}

/// A session with one backend.
///
/// Everything except `open`/`close` takes `&self`: statements borrow the
/// connection for their whole life, so helper state is kept behind interior
/// mutability.
pub trait BackendConnection: Default {
    /// Statement type, borrowing the connection.
    type Statement<'c>: BackendStatement
    where
        Self: 'c;

    /// The backend this connection talks to.
    const DRIVER: Driver;

    /// Open the session.
    fn open(&mut self, params: &OpenParams) -> SqlResult<()>;

    /// Release helper statements and the native session. Idempotent.
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

    /// Rows changed by the most recently executed statement, as reported by the backend.
    fn last_change_count(&self) -> u64;

    /// Check if a table exists.
    fn does_table_exist(&self, table_name: &str) -> SqlResult<bool>;

    /// Check if a column exists in a table.
    fn does_column_exist(&self, table_name: &str, column_name: &str) -> SqlResult<bool>;

    /// Check if an index exists on a table.
    fn does_index_exist(&self, table_name: &str, index_name: &str) -> SqlResult<bool>;

    /// List a table's columns with their coarse types.
    fn table_columns(&self, table_name: &str) -> SqlResult<Vec<Column>>;

    /// Prepare a statement on this connection.
    fn prepare<'c>(&'c self, sql: &str) -> SqlResult<Self::Statement<'c>>;
}
