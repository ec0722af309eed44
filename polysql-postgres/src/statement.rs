//! PostgreSQL prepared statements.
//!
//! A [`PgQuery`] is a named server-side statement plus its parameter slots
//! and the row currently being read. Like the SQLite backend it does not
//! borrow the connection: every call takes the [`Session`] explicitly, so
//! the same type backs user statements and the connection's helpers.
//!
//! Rows are streamed: each `step` reads one DataRow off the socket. While a
//! stream is open no other statement may execute on the session.

use polysql_core::{BackendStatement, SqlError, SqlResult, Value};
use tracing::{debug, warn};

use crate::connection::PgConnection;
use crate::conversions::{BINARY_FORMAT, ParamSlot, TEXT_FORMAT};
use crate::error::{PgError, PgResult};
use crate::oid;
use crate::placeholders;
use crate::row::PgField;
use crate::session::{ColumnDesc, DataRow, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Prepared or reset; the next `run`/`step` executes.
    Idle,
    /// Results are being streamed.
    Streaming,
    /// Executed to completion.
    Done,
}

/// Execution state of one named server-side statement.
#[derive(Debug)]
pub struct PgQuery {
    name: String,
    sql: String,
    params: Vec<ParamSlot>,
    columns: Vec<ColumnDesc>,
    result_formats: Vec<i16>,
    row: Option<DataRow>,
    state: State,
}

impl PgQuery {
    /// Rewrite placeholders, then parse and describe `sql` as statement `name`.
    pub fn prepare(session: &mut Session, name: String, sql: &str) -> PgResult<Self> {
        let (sql, placeholder_count) = placeholders::rewrite(sql);
        let (param_oids, columns) = session.prepare(&name, &sql)?;

        if param_oids.len() != placeholder_count {
            debug!(
                name = %name,
                placeholders = placeholder_count,
                params = param_oids.len(),
                "Server reported a different parameter count"
            );
        }

        let result_formats = columns
            .iter()
            .map(|column| {
                if oid::is_supported(column.oid) {
                    BINARY_FORMAT
                } else {
                    TEXT_FORMAT
                }
            })
            .collect();

        debug!(
            name = %name,
            sql = %sql,
            param_count = param_oids.len(),
            column_count = columns.len(),
            "Prepared statement"
        );

        Ok(Self {
            name,
            sql,
            params: param_oids.into_iter().map(ParamSlot::new).collect(),
            columns,
            result_formats,
            row: None,
            state: State::Idle,
        })
    }

    /// Server-side statement name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// SQL text as sent to the server.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of parameter slots.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Parameter slots.
    pub fn params(&self) -> &[ParamSlot] {
        &self.params
    }

    /// Number of result columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Result column descriptions.
    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    /// Check if results are being streamed.
    pub fn is_streaming(&self) -> bool {
        self.state == State::Streaming
    }

    /// Encode a value into a parameter slot.
    pub fn bind(&mut self, index: usize, value: Value<'_>) -> PgResult<()> {
        if self.state != State::Idle {
            return Err(PgError::misuse("bind after execution; reset first"));
        }

        let count = self.params.len();
        self.params
            .get_mut(index)
            .ok_or(PgError::ParameterOutOfRange { index, count })?
            .set(value)
    }

    /// Execute to completion, discarding rows, and return the affected-row count.
    pub fn run(&mut self, session: &mut Session) -> PgResult<u64> {
        if self.state != State::Idle {
            return Err(PgError::misuse("statement already executed; reset first"));
        }

        let changes = session.run(&self.name, &self.params, &self.result_formats)?;
        self.state = State::Done;
        Ok(changes)
    }

    /// Advance to the next row, executing on the first call.
    pub fn step(&mut self, session: &mut Session) -> PgResult<bool> {
        self.row = None;

        match self.state {
            State::Idle => {
                session.start(&self.name, &self.params, &self.result_formats)?;
                self.state = State::Streaming;
            }
            State::Streaming => {}
            State::Done => return Ok(false),
        }

        match session.next_row() {
            Ok(Some(row)) => {
                self.row = Some(row);
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
    pub fn field(&self, column: usize) -> Option<PgField<'_>> {
        let row = self.row.as_ref()?;
        let desc = self.columns.get(column)?;
        if column >= row.len() {
            return None;
        }
        let format = self.result_formats.get(column).copied().unwrap_or(BINARY_FORMAT);
        Some(PgField::new(desc.oid, format, row.value(column)))
    }

    /// Drain pending results and set every parameter back to NULL.
    pub fn reset(&mut self, session: &mut Session) -> PgResult<()> {
        self.row = None;
        self.params.iter_mut().for_each(ParamSlot::clear);

        let streaming = self.state == State::Streaming;
        self.state = State::Idle;
        if streaming && session.in_flight() == Some(self.name.as_str()) {
            session.drain()?;
        }
        Ok(())
    }

    /// Drain pending results and deallocate the server-side statement.
    pub fn close(mut self, session: &mut Session) -> PgResult<()> {
        self.reset(session)?;
        session.close_statement(&self.name)?;
        debug!(name = %self.name, "Closed statement");
        Ok(())
    }
}

/// A prepared statement borrowing its [`PgConnection`].
pub struct PgStatement<'c> {
    conn: &'c PgConnection,
    query: Option<PgQuery>,
}

impl<'c> PgStatement<'c> {
    pub(crate) fn new(conn: &'c PgConnection, query: PgQuery) -> Self {
        Self {
            conn,
            query: Some(query),
        }
    }

    /// Server-side statement name, if prepared.
    pub fn name(&self) -> Option<&str> {
        self.query.as_ref().map(PgQuery::name)
    }

    /// SQL text as sent to the server, if prepared.
    pub fn sql(&self) -> Option<&str> {
        self.query.as_ref().map(PgQuery::sql)
    }

    /// The underlying query state, if prepared.
    pub fn query(&self) -> Option<&PgQuery> {
        self.query.as_ref()
    }

    fn with_query<T>(
        &mut self,
        f: impl FnOnce(&mut PgQuery, &mut Session) -> PgResult<T>,
    ) -> SqlResult<T> {
        let query = self.query.as_mut().ok_or(SqlError::NotPrepared)?;
        Ok(self.conn.with_session(|session| f(query, session))?)
    }
}

impl std::fmt::Debug for PgStatement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStatement")
            .field("query", &self.query)
            .finish()
    }
}

impl BackendStatement for PgStatement<'_> {
    type Field<'s>
        = PgField<'s>
    where
        Self: 's;

    fn is_prepared(&self) -> bool {
        self.query.is_some()
    }

    fn bind_null(&mut self, column: usize) -> SqlResult<()> {
        self.bind(column, Value::Null)
    }

    fn bind(&mut self, column: usize, value: Value<'_>) -> SqlResult<()> {
        let query = self.query.as_mut().ok_or(SqlError::NotPrepared)?;
        Ok(query.bind(column, value)?)
    }

    fn field_count(&self) -> usize {
        self.query.as_ref().map_or(0, PgQuery::column_count)
    }

    fn field(&self, column: usize) -> Option<PgField<'_>> {
        self.query.as_ref()?.field(column)
    }

    fn run(&mut self) -> SqlResult<()> {
        self.with_query(|query, session| {
            let changes = query.run(session)?;
            session.record_change_count(changes);
            Ok(())
        })
    }

    fn step(&mut self) -> SqlResult<bool> {
        self.with_query(|query, session| query.step(session))
    }

    fn reset(&mut self) -> SqlResult<()> {
        self.with_query(|query, session| query.reset(session))
    }

    fn close(&mut self) -> SqlResult<()> {
        match self.query.take() {
            Some(query) => Ok(self.conn.with_session(|session| query.close(session))?),
            None => Ok(()),
        }
    }
}

impl Drop for PgStatement<'_> {
    fn drop(&mut self) {
        if self.query.is_none() || !self.conn.is_session_open() {
            return;
        }
        if let Err(err) = BackendStatement::close(self) {
            warn!(error = %err, "Error closing statement on drop");
        }
    }
}
