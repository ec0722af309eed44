//! SQLite prepared statements.
//!
//! A [`SqliteQuery`] checks a compiled statement out of the connection's
//! prepared statement cache and drives it one engine step per `step` call.
//! Only the current row is copied out of the engine. Dropping the query
//! resets the statement and hands it back to the cache.

use polysql_core::{BackendStatement, SqlError, SqlResult, Value};
use rusqlite::CachedStatement;
use rusqlite::types::Value as SqliteValue;
use tracing::{debug, trace};

use crate::connection::SqliteConnection;
use crate::error::{SqliteError, SqliteResult};
use crate::row::SqliteField;
use crate::types::{value_from_ref, value_to_sqlite};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Prepared or reset; the next `run`/`step` executes.
    Idle,
    /// The engine is positioned on a row.
    Stepping,
    /// Executed to completion, or failed.
    Done,
}

/// Execution state of one compiled SQL text.
pub struct SqliteQuery<'c> {
    stmt: CachedStatement<'c>,
    sql: String,
    column_count: usize,
    params: Vec<SqliteValue>,
    current: Option<Vec<SqliteValue>>,
    state: State,
}

impl<'c> SqliteQuery<'c> {
    /// Compile `sql`, or take it from the connection's statement cache.
    pub fn prepare(db: &'c rusqlite::Connection, sql: &str) -> SqliteResult<Self> {
        let stmt = db.prepare_cached(sql)?;
        let param_count = stmt.parameter_count();
        let column_count = stmt.column_count();

        debug!(sql = %sql, param_count, column_count, "Prepared statement");

        Ok(Self {
            stmt,
            sql: sql.to_string(),
            column_count,
            params: vec![SqliteValue::Null; param_count],
            current: None,
            state: State::Idle,
        })
    }

    /// The SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of parameter slots.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Number of result columns.
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Check if the statement ran since the last prepare or reset.
    pub fn is_executed(&self) -> bool {
        self.state != State::Idle
    }

    /// Set a parameter slot.
    pub fn bind(&mut self, index: usize, value: Value<'_>) -> SqliteResult<()> {
        if self.is_executed() {
            return Err(SqliteError::misuse("bind after execution; reset first"));
        }

        let count = self.params.len();
        let slot = self
            .params
            .get_mut(index)
            .ok_or(SqliteError::ParameterOutOfRange { index, count })?;
        *slot = value_to_sqlite(value);
        Ok(())
    }

    /// Execute to completion and discard any rows.
    pub fn run(&mut self) -> SqliteResult<()> {
        if self.is_executed() {
            return Err(SqliteError::misuse("statement already executed; reset first"));
        }

        self.start()?;
        let mut rows = self.stmt.raw_query();
        let result: SqliteResult<()> = loop {
            match rows.next() {
                Ok(Some(_)) => {}
                Ok(None) => break Ok(()),
                Err(err) => break Err(err.into()),
            }
        };
        drop(rows);

        self.state = State::Done;
        result
    }

    /// Advance the engine by one step.
    ///
    /// Executes on the first call after prepare or reset. An engine error
    /// ends the execution; later calls return `false` until reset.
    pub fn step(&mut self) -> SqliteResult<bool> {
        self.current = None;

        match self.state {
            State::Idle => {
                if let Err(err) = self.start() {
                    self.state = State::Done;
                    return Err(err);
                }
                self.state = State::Stepping;
            }
            State::Stepping => {}
            State::Done => return Ok(false),
        }

        match self.next_row() {
            Ok(Some(values)) => {
                self.current = Some(values);
                Ok(true)
            }
            Ok(None) => {
                self.state = State::Done;
                Ok(false)
            }
            Err(err) => {
                self.state = State::Done;
                Err(err)
            }
        }
    }

    /// A column of the current row.
    pub fn value(&self, column: usize) -> Option<&SqliteValue> {
        self.current.as_ref()?.get(column)
    }

    /// Rewind the engine and set every parameter back to NULL.
    pub fn reset(&mut self) {
        if self.state == State::Stepping {
            self.rewind();
        }
        self.current = None;
        self.state = State::Idle;
        self.params.fill(SqliteValue::Null);
    }

    /// Rewind, then bind every slot.
    fn start(&mut self) -> SqliteResult<()> {
        trace!(sql = %self.sql, "Executing statement");

        self.rewind();
        for (i, value) in self.params.iter().enumerate() {
            self.stmt.raw_bind_parameter(i + 1, value)?;
        }
        Ok(())
    }

    /// Step the engine once and copy out the row it lands on.
    fn next_row(&mut self) -> SqliteResult<Option<Vec<SqliteValue>>> {
        let column_count = self.column_count;
        let mut rows = self.stmt.raw_query();
        let values = match rows.next()? {
            Some(row) => (0..column_count)
                .map(|i| row.get_ref(i).map(value_from_ref))
                .collect::<Result<Vec<_>, _>>()?,
            None => return Ok(None),
        };

        // `Rows` resets the statement when dropped and holds nothing but
        // borrows; forgetting it leaves the engine on this row.
        std::mem::forget(rows);
        Ok(Some(values))
    }

    /// Put the engine statement back at its start.
    fn rewind(&mut self) {
        // A fresh `Rows` resets its statement on drop.
        drop(self.stmt.raw_query());
    }
}

impl Drop for SqliteQuery<'_> {
    fn drop(&mut self) {
        if self.state == State::Stepping {
            self.rewind();
        }
    }
}

impl std::fmt::Debug for SqliteQuery<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteQuery")
            .field("sql", &self.sql)
            .field("params", &self.params)
            .field("current", &self.current)
            .field("state", &self.state)
            .finish()
    }
}

/// A prepared statement borrowing its [`SqliteConnection`].
pub struct SqliteStatement<'c> {
    conn: &'c SqliteConnection,
    query: Option<SqliteQuery<'c>>,
}

impl<'c> SqliteStatement<'c> {
    pub(crate) fn new(conn: &'c SqliteConnection, query: SqliteQuery<'c>) -> Self {
        Self {
            conn,
            query: Some(query),
        }
    }

    /// The connection this statement was prepared on.
    pub fn connection(&self) -> &'c SqliteConnection {
        self.conn
    }

    /// The SQL text, if prepared.
    pub fn sql(&self) -> Option<&str> {
        self.query.as_ref().map(SqliteQuery::sql)
    }

    fn query_mut(&mut self) -> SqlResult<&mut SqliteQuery<'c>> {
        self.query.as_mut().ok_or(SqlError::NotPrepared)
    }
}

impl std::fmt::Debug for SqliteStatement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStatement")
            .field("query", &self.query)
            .finish()
    }
}

impl BackendStatement for SqliteStatement<'_> {
    type Field<'s>
        = SqliteField<'s>
    where
        Self: 's;

    fn is_prepared(&self) -> bool {
        self.query.is_some()
    }

    fn bind_null(&mut self, column: usize) -> SqlResult<()> {
        self.bind(column, Value::Null)
    }

    fn bind(&mut self, column: usize, value: Value<'_>) -> SqlResult<()> {
        Ok(self.query_mut()?.bind(column, value)?)
    }

    fn field_count(&self) -> usize {
        self.query.as_ref().map_or(0, SqliteQuery::column_count)
    }

    fn field(&self, column: usize) -> Option<SqliteField<'_>> {
        self.query.as_ref()?.value(column).map(SqliteField::new)
    }

    fn run(&mut self) -> SqlResult<()> {
        Ok(self.query_mut()?.run()?)
    }

    fn step(&mut self) -> SqlResult<bool> {
        Ok(self.query_mut()?.step()?)
    }

    fn reset(&mut self) -> SqlResult<()> {
        self.query_mut()?.reset();
        Ok(())
    }

    fn close(&mut self) -> SqlResult<()> {
        if let Some(query) = self.query.take() {
            debug!(sql = %query.sql(), "Closed statement");
        }
        Ok(())
    }
}
