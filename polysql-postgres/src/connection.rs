//! PostgreSQL connection.

use std::cell::{Cell, RefCell};

use polysql_core::{
    BackendConnection, Column, ColumnType, Driver, FieldAccess, OpenParams, SqlResult, Value,
};
use tracing::{debug, warn};

use crate::config::{PgConfig, StdEnvSource};
use crate::error::{PgError, PgResult};
use crate::session::Session;
use crate::statement::{PgQuery, PgStatement};

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
    const COUNT: usize = 7;

    fn sql(self) -> &'static str {
        match self {
            Self::Begin => "BEGIN TRANSACTION",
            Self::Commit => "COMMIT",
            Self::Rollback => "ROLLBACK",
            Self::TableExists => {
                "SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name::text = ?"
            }
            Self::ColumnExists => {
                "SELECT 1 FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name::text = ? \
                 AND column_name::text = ?"
            }
            Self::IndexExists => {
                "SELECT 1 FROM pg_indexes \
                 WHERE schemaname = current_schema() AND tablename::text = ? \
                 AND indexname::text = ?"
            }
            Self::TableColumns => {
                "SELECT column_name::text, data_type::text FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name::text = ? \
                 ORDER BY ordinal_position"
            }
        }
    }
}

#[derive(Debug, Default)]
struct Helpers {
    slots: [Option<PgQuery>; Helper::COUNT],
}

/// A session with one PostgreSQL server.
///
/// Statement names are generated per connection as `s0`, `s1`, ... and are
/// never reused while the connection is open.
#[derive(Debug, Default)]
pub struct PgConnection {
    session: RefCell<Option<Session>>,
    helpers: RefCell<Helpers>,
    next_statement_id: Cell<u64>,
}

impl PgConnection {
    /// Create an unopened connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect using an already parsed configuration.
    pub fn open_with_config(&mut self, config: &PgConfig) -> PgResult<()> {
        if self.session.get_mut().is_some() {
            return Err(PgError::AlreadyOpen);
        }

        let session = Session::connect(config)?;
        *self.session.get_mut() = Some(session);
        Ok(())
    }

    /// Parse a connection string, fill gaps from `PG*` environment variables and connect.
    pub fn open_with_connection_string(&mut self, connection_string: &str) -> PgResult<()> {
        if self.session.get_mut().is_some() {
            return Err(PgError::AlreadyOpen);
        }

        let config = PgConfig::parse(connection_string)?.with_env(&StdEnvSource)?;
        self.open_with_config(&config)
    }

    /// A server parameter reported at startup, e.g. `server_version`.
    pub fn server_parameter(&self, name: &str) -> Option<String> {
        self.session
            .borrow()
            .as_ref()
            .and_then(|session| session.parameter(name).map(str::to_string))
    }

    /// Run `f` with the open session.
    pub(crate) fn with_session<T>(
        &self,
        f: impl FnOnce(&mut Session) -> PgResult<T>,
    ) -> PgResult<T> {
        let mut guard = self.session.borrow_mut();
        let session = guard.as_mut().ok_or(PgError::NotOpen)?;
        f(session)
    }

    pub(crate) fn is_session_open(&self) -> bool {
        self.session
            .try_borrow()
            .map(|session| session.is_some())
            .unwrap_or(false)
    }

    /// Next statement name, unique for the life of the connection.
    fn next_statement_name(&self) -> String {
        let id = self.next_statement_id.get();
        self.next_statement_id.set(id + 1);
        format!("s{}", id)
    }

    /// Bind `params` to a helper statement, run `f` over it, and reset it.
    ///
    /// The helper is prepared on first use and kept until the connection closes.
    fn with_helper<T>(
        &self,
        helper: Helper,
        params: &[Value<'_>],
        f: impl FnOnce(&mut PgQuery, &mut Session) -> PgResult<T>,
    ) -> PgResult<T> {
        self.with_session(|session| {
            let mut helpers = self.helpers.borrow_mut();
            let slot = &mut helpers.slots[helper as usize];

            let query = match slot {
                Some(query) => query,
                None => {
                    let name = self.next_statement_name();
                    slot.insert(PgQuery::prepare(session, name, helper.sql())?)
                }
            };

            let result = params
                .iter()
                .enumerate()
                .try_for_each(|(i, value)| query.bind(i, *value))
                .and_then(|()| f(query, session));
            let reset = query.reset(session);
            result.and_then(|value| reset.map(|()| value))
        })
    }

    fn helper_has_row(&self, helper: Helper, params: &[Value<'_>]) -> SqlResult<bool> {
        Ok(self.with_helper(helper, params, |query, session| query.step(session))?)
    }

    fn run_helper(&self, helper: Helper) -> SqlResult<()> {
        self.with_helper(helper, &[], |query, session| query.run(session))?;
        Ok(())
    }
}

impl BackendConnection for PgConnection {
    type Statement<'c> = PgStatement<'c>;

    const DRIVER: Driver = Driver::Postgres;

    fn open(&mut self, params: &OpenParams) -> SqlResult<()> {
        Ok(self.open_with_connection_string(&params.connection_string)?)
    }

    fn close(&mut self) -> SqlResult<()> {
        *self.helpers.get_mut() = Helpers::default();

        if let Some(session) = self.session.get_mut().take() {
            session.terminate();
            debug!("Closed PostgreSQL connection");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.is_session_open()
    }

    fn execute(&self, sql: &str) -> SqlResult<()> {
        debug!(sql = %sql, "Executing SQL");
        Ok(self.with_session(|session| session.simple_query(sql))?)
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
        self.session
            .borrow()
            .as_ref()
            .map_or(0, Session::last_change_count)
    }

    fn does_table_exist(&self, table_name: &str) -> SqlResult<bool> {
        let table = table_name.to_lowercase();
        self.helper_has_row(Helper::TableExists, &[Value::Text(&table)])
    }

    fn does_column_exist(&self, table_name: &str, column_name: &str) -> SqlResult<bool> {
        let table = table_name.to_lowercase();
        let column = column_name.to_lowercase();
        self.helper_has_row(
            Helper::ColumnExists,
            &[Value::Text(&table), Value::Text(&column)],
        )
    }

    fn does_index_exist(&self, table_name: &str, index_name: &str) -> SqlResult<bool> {
        let table = table_name.to_lowercase();
        let index = index_name.to_lowercase();
        self.helper_has_row(
            Helper::IndexExists,
            &[Value::Text(&table), Value::Text(&index)],
        )
    }

    fn table_columns(&self, table_name: &str) -> SqlResult<Vec<Column>> {
        let table = table_name.to_lowercase();
        let columns = self.with_helper(
            Helper::TableColumns,
            &[Value::Text(&table)],
            |query, session| {
                let mut columns = Vec::new();
                while query.step(session)? {
                    let name = query.field(0).map(|f| f.as_string()).unwrap_or_default();
                    let data_type = query.field(1).map(|f| f.as_string()).unwrap_or_default();
                    columns.push(Column::new(name, data_type_to_column_type(&data_type)));
                }
                Ok(columns)
            },
        )?;
        Ok(columns)
    }

    fn prepare<'c>(&'c self, sql: &str) -> SqlResult<PgStatement<'c>> {
        let query = self.with_session(|session| {
            PgQuery::prepare(session, self.next_statement_name(), sql)
        })?;
        Ok(PgStatement::new(self, query))
    }
}

impl Drop for PgConnection {
    fn drop(&mut self) {
        if let Err(err) = BackendConnection::close(self) {
            warn!(error = %err, "Error closing PostgreSQL connection on drop");
        }
    }
}

/// Map an `information_schema` data type name to a coarse column type.
pub fn data_type_to_column_type(data_type: &str) -> ColumnType {
    match data_type.trim().to_ascii_lowercase().as_str() {
        "smallint" | "integer" | "bigint" | "boolean" => ColumnType::Integer,
        "real" | "double precision" | "numeric" => ColumnType::Float,
        "text" | "character varying" | "character" | "name" | "\"char\"" => ColumnType::Text,
        "bytea" => ColumnType::Blob,
        _ => ColumnType::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_mapping() {
        assert_eq!(data_type_to_column_type("integer"), ColumnType::Integer);
        assert_eq!(data_type_to_column_type("bigint"), ColumnType::Integer);
        assert_eq!(data_type_to_column_type("boolean"), ColumnType::Integer);
        assert_eq!(data_type_to_column_type("double precision"), ColumnType::Float);
        assert_eq!(data_type_to_column_type("character varying"), ColumnType::Text);
        assert_eq!(data_type_to_column_type("TEXT"), ColumnType::Text);
        assert_eq!(data_type_to_column_type("bytea"), ColumnType::Blob);
        assert_eq!(
            data_type_to_column_type("timestamp without time zone"),
            ColumnType::Null
        );
    }

    #[test]
    fn test_statement_names_are_unique() {
        let conn = PgConnection::new();
        assert_eq!(conn.next_statement_name(), "s0");
        assert_eq!(conn.next_statement_name(), "s1");
        assert_eq!(conn.next_statement_name(), "s2");
    }

    #[test]
    fn test_unopened_connection() {
        let conn = PgConnection::new();
        assert!(!conn.is_open());
        assert_eq!(conn.last_change_count(), 0);
        assert!(matches!(
            conn.execute("SELECT 1"),
            Err(polysql_core::SqlError::NotOpen)
        ));
        assert!(matches!(
            conn.prepare("SELECT 1"),
            Err(polysql_core::SqlError::NotOpen)
        ));
        assert!(matches!(
            conn.does_table_exist("t"),
            Err(polysql_core::SqlError::NotOpen)
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut conn = PgConnection::new();
        conn.close().unwrap();
        conn.close().unwrap();
    }
}
