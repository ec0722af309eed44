//! The backend-agnostic prepared statement.

use std::ops::{Deref, DerefMut};

use polysql_core::{ColumnType, SqlError, SqlResult, Value};
use tracing::{trace, warn};

use crate::connection::Connection;
use crate::model::StatementModel;

/// A prepared statement borrowing its [`Connection`].
///
/// Parameter and column indices are zero-based. A default-constructed or
/// closed statement is unprepared: fallible calls fail with
/// [`SqlError::NotPrepared`] and accessors return zero values.
///
/// ```rust
/// use polysql::{Connection, OpenParams};
///
/// let conn = Connection::connect(&OpenParams::sqlite_memory()).unwrap();
/// conn.execute("CREATE TABLE t(a INTEGER, b TEXT)").unwrap();
///
/// let mut insert = conn.prepare("INSERT INTO t VALUES(?, ?)").unwrap();
/// insert.bind(0, 1).unwrap();
/// insert.bind(1, "one").unwrap();
/// insert.run().unwrap();
///
/// let mut select = conn.prepare("SELECT a, b FROM t").unwrap();
/// while select.step().unwrap() {
///     assert_eq!(select.get_int(0), 1);
///     assert_eq!(select.at(1).as_string(), "one");
/// }
/// ```
#[derive(Default)]
pub struct Statement<'c> {
    model: Option<Box<dyn StatementModel + 'c>>,
}

impl<'c> Statement<'c> {
    /// Prepare `sql` on `conn`.
    pub fn new(conn: &'c Connection, sql: &str) -> SqlResult<Self> {
        let mut stmt = Self::default();
        stmt.prepare(conn, sql)?;
        Ok(stmt)
    }

    /// Prepare `sql` on `conn`, closing any statement held before.
    pub fn prepare(&mut self, conn: &'c Connection, sql: &str) -> SqlResult<()> {
        self.close()?;
        trace!(sql = %sql, "Preparing statement");
        self.model = Some(conn.model()?.create_statement_model(sql)?);
        Ok(())
    }

    /// Check if the statement is prepared.
    pub fn is_prepared(&self) -> bool {
        self.model.as_ref().is_some_and(|model| model.is_prepared())
    }

    fn model_mut(&mut self) -> SqlResult<&mut (dyn StatementModel + 'c)> {
        self.model.as_deref_mut().ok_or(SqlError::NotPrepared)
    }

    /// Bind SQL NULL to a parameter.
    pub fn bind_null(&mut self, column: usize) -> SqlResult<()> {
        self.model_mut()?.bind_null(column)
    }

    /// Bind a value to a parameter.
    pub fn bind<'v>(&mut self, column: usize, value: impl Into<Value<'v>>) -> SqlResult<()> {
        self.model_mut()?.bind(column, value.into())
    }

    /// Bind UTF-16 text to a parameter. Unpaired surrogates become U+FFFD.
    pub fn bind_string16(&mut self, column: usize, value: &[u16]) -> SqlResult<()> {
        let text = String::from_utf16_lossy(value);
        self.model_mut()?.bind(column, Value::Text(&text))
    }

    /// Number of result columns; 0 when unprepared.
    pub fn field_count(&self) -> usize {
        self.model.as_ref().map_or(0, |model| model.field_count())
    }

    /// Coarse type of a column in the current row.
    pub fn field_type(&self, column: usize) -> ColumnType {
        self.model
            .as_ref()
            .map_or(ColumnType::Null, |model| model.field_type(column))
    }

    /// A view of one column of the current row.
    pub fn at(&self, column: usize) -> FieldView<'_, 'c> {
        FieldView {
            statement: self,
            column,
        }
    }

    /// Column as a boolean.
    pub fn get_bool(&self, column: usize) -> bool {
        self.model.as_ref().is_some_and(|model| model.get_bool(column))
    }

    /// Column as a 32-bit integer.
    pub fn get_int(&self, column: usize) -> i32 {
        self.model.as_ref().map_or(0, |model| model.get_int(column))
    }

    /// Column as a 64-bit integer.
    pub fn get_int64(&self, column: usize) -> i64 {
        self.model.as_ref().map_or(0, |model| model.get_int64(column))
    }

    /// Column as a double.
    pub fn get_double(&self, column: usize) -> f64 {
        self.model.as_ref().map_or(0.0, |model| model.get_double(column))
    }

    /// Column as text.
    pub fn get_string(&self, column: usize) -> String {
        self.model
            .as_ref()
            .map(|model| model.get_string(column))
            .unwrap_or_default()
    }

    /// Column as UTF-16 code units.
    pub fn get_string16(&self, column: usize) -> Vec<u16> {
        self.model
            .as_ref()
            .map(|model| model.get_string16(column))
            .unwrap_or_default()
    }

    /// Column as bytes.
    pub fn get_blob(&self, column: usize) -> Vec<u8> {
        self.model
            .as_ref()
            .map(|model| model.get_blob(column))
            .unwrap_or_default()
    }

    /// Execute without reading rows.
    pub fn run(&mut self) -> SqlResult<()> {
        self.model_mut()?.run()
    }

    /// Alias for [`Statement::run`].
    pub fn query(&mut self) -> SqlResult<()> {
        self.run()
    }

    /// Advance to the next row, executing on the first call after prepare or reset.
    pub fn step(&mut self) -> SqlResult<bool> {
        self.model_mut()?.step()
    }

    /// Alias for [`Statement::step`].
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> SqlResult<bool> {
        self.step()
    }

    /// Drain pending results and clear bound values.
    pub fn reset(&mut self) -> SqlResult<()> {
        self.model_mut()?.reset()
    }

    /// Reset when the returned guard drops.
    pub fn scoped_reset(&mut self) -> ScopedReset<'_, 'c> {
        ScopedReset { statement: self }
    }

    /// Release the prepared statement. Closing twice does nothing.
    pub fn close(&mut self) -> SqlResult<()> {
        match self.model.take() {
            Some(mut model) => model.close(),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("is_prepared", &self.is_prepared())
            .field("field_count", &self.field_count())
            .finish()
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "Error closing statement on drop");
        }
    }
}

/// One column of a statement's current row.
#[derive(Clone, Copy)]
pub struct FieldView<'s, 'c> {
    statement: &'s Statement<'c>,
    column: usize,
}

impl FieldView<'_, '_> {
    /// Column index.
    pub fn index(&self) -> usize {
        self.column
    }

    /// Coarse type of the value.
    pub fn column_type(&self) -> ColumnType {
        self.statement.field_type(self.column)
    }

    /// Check if the value is SQL NULL (or there is no current row).
    pub fn is_null(&self) -> bool {
        self.column_type() == ColumnType::Null
    }

    /// Value as a boolean.
    pub fn as_bool(&self) -> bool {
        self.statement.get_bool(self.column)
    }

    /// Value as a 32-bit integer.
    pub fn as_int(&self) -> i32 {
        self.statement.get_int(self.column)
    }

    /// Value as a 64-bit integer.
    pub fn as_int64(&self) -> i64 {
        self.statement.get_int64(self.column)
    }

    /// Value as a double.
    pub fn as_double(&self) -> f64 {
        self.statement.get_double(self.column)
    }

    /// Value as text.
    pub fn as_string(&self) -> String {
        self.statement.get_string(self.column)
    }

    /// Value as UTF-16 code units.
    pub fn as_string16(&self) -> Vec<u16> {
        self.statement.get_string16(self.column)
    }

    /// Value as bytes.
    pub fn as_blob(&self) -> Vec<u8> {
        self.statement.get_blob(self.column)
    }
}

impl std::fmt::Debug for FieldView<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldView")
            .field("column", &self.column)
            .field("column_type", &self.column_type())
            .finish()
    }
}

/// Resets a statement when dropped.
///
/// ```rust
/// use polysql::{Connection, OpenParams};
///
/// let conn = Connection::connect(&OpenParams::sqlite_memory()).unwrap();
/// conn.execute("CREATE TABLE t(a INTEGER)").unwrap();
/// let mut insert = conn.prepare("INSERT INTO t VALUES(?)").unwrap();
///
/// for a in 0..3 {
///     let mut stmt = insert.scoped_reset();
///     stmt.bind(0, a).unwrap();
///     stmt.run().unwrap();
/// }
/// ```
pub struct ScopedReset<'s, 'c> {
    statement: &'s mut Statement<'c>,
}

impl<'c> Deref for ScopedReset<'_, 'c> {
    type Target = Statement<'c>;

    fn deref(&self) -> &Self::Target {
        self.statement
    }
}

impl DerefMut for ScopedReset<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.statement
    }
}

impl Drop for ScopedReset<'_, '_> {
    fn drop(&mut self) {
        if !self.statement.is_prepared() {
            return;
        }
        if let Err(err) = self.statement.reset() {
            warn!(error = %err, "Error resetting statement");
        }
    }
}
