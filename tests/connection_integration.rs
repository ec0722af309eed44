//! Integration tests for the backend-agnostic facade.
//!
//! Every scenario runs against a SQLite file database. When
//! `POLYSQL_TEST_POSTGRES` holds a connection string, the same scenarios run
//! against that server as well.

use std::collections::HashSet;

use polysql::prelude::*;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// An open connection plus whatever keeps its database alive.
struct Backend {
    conn: Connection,
    _dir: Option<TempDir>,
}

fn backends() -> Vec<Backend> {
    polysql::logging::init();

    let dir = tempfile::tempdir().unwrap();
    let params = OpenParams::sqlite(dir.path().join("test.sqlite3")).journal_size_limit(1 << 20);
    let mut backends = vec![Backend {
        conn: Connection::connect(&params).unwrap(),
        _dir: Some(dir),
    }];

    if let Ok(cs) = std::env::var("POLYSQL_TEST_POSTGRES") {
        backends.push(Backend {
            conn: Connection::connect(&OpenParams::postgres(cs)).unwrap(),
            _dir: None,
        });
    }
    backends
}

fn column_ddl(driver: Driver) -> &'static str {
    match driver {
        Driver::Sqlite => "a INTEGER, b BIGINT, c TEXT, d REAL, e BLOB",
        Driver::Postgres => "a INTEGER, b BIGINT, c TEXT, d DOUBLE PRECISION, e BYTEA",
    }
}

fn recreate(conn: &Connection, table: &str, columns: &str) {
    conn.execute(&format!("DROP TABLE IF EXISTS {}", table))
        .unwrap();
    conn.execute(&format!("CREATE TABLE {}({})", table, columns))
        .unwrap();
}

#[test]
fn concrete_scenario_yields_rows_in_insertion_order() {
    for backend in backends() {
        let conn = &backend.conn;
        recreate(conn, "polysql_t", "A INTEGER, B BIGINT, C TEXT");

        let mut insert = conn.prepare("INSERT INTO polysql_t VALUES(?, ?, ?)").unwrap();
        for (a, b, c) in [(10, 100_i64, "A"), (20, 200, "B"), (30, 300, "C")] {
            let mut stmt = insert.scoped_reset();
            stmt.bind(0, a).unwrap();
            stmt.bind(1, b).unwrap();
            stmt.bind(2, c).unwrap();
            stmt.run().unwrap();
            assert_eq!(conn.last_change_count(), 1);
        }
        drop(insert);

        let mut select = conn.prepare("SELECT * FROM polysql_t ORDER BY 1").unwrap();
        assert_eq!(select.field_count(), 3);

        let mut rows = Vec::new();
        while select.step().unwrap() {
            let types: Vec<_> = (0..3).map(|i| select.field_type(i)).collect();
            assert_eq!(
                types,
                vec![ColumnType::Integer, ColumnType::Integer, ColumnType::Text]
            );
            rows.push((select.get_int(0), select.get_int64(1), select.get_string(2)));
        }
        assert_eq!(
            rows,
            vec![
                (10, 100, "A".to_string()),
                (20, 200, "B".to_string()),
                (30, 300, "C".to_string()),
            ]
        );
        assert!(!select.step().unwrap());
    }
}

#[test]
fn table_existence_follows_create_and_drop() {
    for backend in backends() {
        let conn = &backend.conn;
        recreate(conn, "polysql_exists", "id INTEGER");
        assert!(conn.does_table_exist("polysql_exists").unwrap());
        assert!(!conn.does_table_exist("polysql_missing").unwrap());

        conn.execute("DROP TABLE polysql_exists").unwrap();
        assert!(!conn.does_table_exist("polysql_exists").unwrap());
    }
}

#[test]
fn column_and_index_introspection() {
    for backend in backends() {
        let conn = &backend.conn;
        let driver = conn.driver().unwrap();
        recreate(conn, "polysql_cols", column_ddl(driver));
        conn.execute("CREATE INDEX polysql_cols_a ON polysql_cols(a)")
            .unwrap();

        for column in ["a", "b", "c", "d", "e"] {
            assert!(conn.does_column_exist("polysql_cols", column).unwrap());
        }
        assert!(!conn.does_column_exist("polysql_cols", "z").unwrap());
        assert!(conn.does_index_exist("polysql_cols", "polysql_cols_a").unwrap());
        assert!(!conn.does_index_exist("polysql_cols", "polysql_cols_b").unwrap());

        match driver {
            // PostgreSQL folds unquoted identifiers to lower case.
            Driver::Postgres => {
                assert!(conn.does_column_exist("POLYSQL_COLS", "A").unwrap());
                assert!(conn.does_table_exist("Polysql_Cols").unwrap());
            }
            // SQLite compares catalog names as stored.
            Driver::Sqlite => {
                assert!(!conn.does_column_exist("polysql_cols", "A").unwrap());
            }
        }

        let columns: HashSet<Column> = conn
            .table_columns("polysql_cols")
            .unwrap()
            .into_iter()
            .collect();
        let expected: HashSet<Column> = [
            Column::new("a", ColumnType::Integer),
            Column::new("b", ColumnType::Integer),
            Column::new("c", ColumnType::Text),
            Column::new("d", ColumnType::Float),
            Column::new("e", ColumnType::Blob),
        ]
        .into_iter()
        .collect();
        assert_eq!(columns, expected);
    }
}

#[test]
fn null_and_concrete_bindings_filter_rows() {
    for backend in backends() {
        let conn = &backend.conn;
        let driver = conn.driver().unwrap();
        recreate(conn, "polysql_bind", column_ddl(driver));

        let values = [
            (1, i64::MAX, "one", 0.1_f64, vec![0_u8, 1, 2]),
            (2, i64::MIN, "twö", -1.0e300, vec![255]),
            (3, 0, "", f64::MIN_POSITIVE, vec![]),
        ];

        let mut insert = conn
            .prepare("INSERT INTO polysql_bind VALUES(?, ?, ?, ?, ?)")
            .unwrap();
        for (a, b, c, d, e) in &values {
            insert.bind(0, *a).unwrap();
            insert.bind(1, *b).unwrap();
            insert.bind(2, *c).unwrap();
            insert.bind(3, *d).unwrap();
            insert.bind(4, e).unwrap();
            insert.run().unwrap();
            assert_eq!(conn.last_change_count(), 1);
            insert.reset().unwrap();
        }
        drop(insert);

        let mut select = conn
            .prepare("SELECT a, b, c, d, e FROM polysql_bind WHERE a = ? OR c = ?")
            .unwrap();

        // All-NULL parameters match nothing.
        select.bind_null(0).unwrap();
        select.bind(1, Value::Null).unwrap();
        assert!(!select.step().unwrap());
        select.reset().unwrap();

        for (a, b, c, d, e) in &values {
            select.bind(0, *a).unwrap();
            select.bind_null(1).unwrap();
            assert!(select.step().unwrap());
            assert_eq!(select.get_int(0), *a);
            assert_eq!(select.get_int64(1), *b);
            assert_eq!(select.get_string(2), *c);
            assert_eq!(select.get_double(3).to_bits(), d.to_bits());
            assert_eq!(select.get_blob(4), *e);
            assert!(!select.step().unwrap());
            select.reset().unwrap();
        }

        // Rebinding after reset re-executes the same prepared statement.
        select.bind(0, 1).unwrap();
        select.bind(1, "twö").unwrap();
        let mut found = Vec::new();
        while select.step().unwrap() {
            found.push(select.get_int(0));
        }
        found.sort_unstable();
        assert_eq!(found, vec![1, 2]);
    }
}

#[test]
fn change_count_comes_from_the_backend() {
    for backend in backends() {
        let conn = &backend.conn;
        recreate(conn, "polysql_changes", "a INTEGER, b TEXT");
        conn.execute("INSERT INTO polysql_changes VALUES (1, 'x'), (2, 'x'), (3, 'y')")
            .unwrap();
        assert_eq!(conn.last_change_count(), 3);

        let mut update = conn
            .prepare("UPDATE polysql_changes SET b = ? WHERE a = ?")
            .unwrap();
        update.bind(0, "z").unwrap();
        update.bind(1, 1).unwrap();
        update.run().unwrap();
        assert_eq!(conn.last_change_count(), 1);
        update.reset().unwrap();

        update.bind(0, "z").unwrap();
        update.bind(1, 99).unwrap();
        update.run().unwrap();
        assert_eq!(conn.last_change_count(), 0);
        drop(update);

        let mut delete = conn
            .prepare("DELETE FROM polysql_changes WHERE b = ?")
            .unwrap();
        delete.bind(0, "x").unwrap();
        delete.run().unwrap();
        assert_eq!(conn.last_change_count(), 1);
        drop(delete);

        // Introspection, row streams and transaction control are not changes.
        assert!(!conn.does_table_exist("polysql_missing").unwrap());
        assert_eq!(conn.last_change_count(), 1);
        assert_eq!(conn.table_columns("polysql_changes").unwrap().len(), 2);
        assert_eq!(conn.last_change_count(), 1);

        let mut select = conn.prepare("SELECT a FROM polysql_changes").unwrap();
        let mut rows = 0;
        while select.step().unwrap() {
            rows += 1;
        }
        assert_eq!(rows, 2);
        drop(select);
        assert_eq!(conn.last_change_count(), 1);

        conn.begin_transaction().unwrap();
        conn.commit_transaction().unwrap();
        assert_eq!(conn.last_change_count(), 1);
    }
}

#[test]
fn transactions_commit_and_roll_back() {
    for backend in backends() {
        let conn = &backend.conn;
        recreate(conn, "polysql_txn", "a INTEGER");

        let count = || {
            let mut stmt = conn.prepare("SELECT COUNT(*) FROM polysql_txn").unwrap();
            assert!(stmt.step().unwrap());
            stmt.get_int64(0)
        };

        conn.begin_transaction().unwrap();
        conn.execute("INSERT INTO polysql_txn VALUES (1)").unwrap();
        conn.rollback_transaction().unwrap();
        assert_eq!(count(), 0);

        conn.begin_transaction().unwrap();
        conn.execute("INSERT INTO polysql_txn VALUES (1)").unwrap();
        conn.commit_transaction().unwrap();
        assert_eq!(count(), 1);
    }
}

#[test]
fn misuse_is_distinguished_from_backend_errors() {
    for backend in backends() {
        let conn = &backend.conn;
        recreate(conn, "polysql_errors", "a INTEGER");

        let err = conn.prepare("SELEC nonsense").unwrap_err();
        assert!(err.is_backend_error());
        assert!(!err.is_misuse());

        let mut stmt = conn
            .prepare("SELECT a FROM polysql_errors WHERE a = ?")
            .unwrap();
        let err = stmt.bind(5, 1).unwrap_err();
        assert!(matches!(err, SqlError::ParameterOutOfRange { index: 5, .. }));
        assert!(err.is_misuse());

        stmt.close().unwrap();
        assert!(matches!(stmt.step(), Err(SqlError::NotPrepared)));

        // The connection keeps working after both kinds of errors.
        conn.execute("INSERT INTO polysql_errors VALUES (1)").unwrap();
        assert_eq!(conn.last_change_count(), 1);
    }
}

#[test]
fn open_params_deserialize_with_defaults() {
    let params: OpenParams =
        serde_json::from_str(r#"{"driver": "sqlite3", "journal_size_limit": 4096}"#).unwrap();
    assert_eq!(params.resolve_driver().unwrap(), Driver::Sqlite);
    assert_eq!(params.journal_size_limit, 4096);
    assert!(params.path.as_os_str().is_empty());
    assert!(!params.exclusive_locking);

    let conn = Connection::connect(&params).unwrap();
    assert!(conn.is_open());
    assert_eq!(conn.driver(), Some(Driver::Sqlite));
}
