//! SQLite backend for polysql.
//!
//! This crate implements the polysql backend contract on top of `rusqlite`
//! with the engine bundled.
//!
//! # Features
//!
//! - In-memory and file-based databases
//! - Prepared statements reused through the engine-side statement cache
//! - Transactions and schema introspection through cached helper statements
//!
//! # Example
//!
//! ```rust
//! use polysql_core::{BackendConnection, BackendStatement, FieldAccess, OpenParams, Value};
//! use polysql_sqlite::SqliteConnection;
//!
//! let mut conn = SqliteConnection::new();
//! conn.open(&OpenParams::sqlite_memory()).unwrap();
//! conn.execute("CREATE TABLE t(a INTEGER)").unwrap();
//!
//! let mut insert = conn.prepare("INSERT INTO t VALUES(?)").unwrap();
//! insert.bind(0, Value::Int(7)).unwrap();
//! insert.run().unwrap();
//! assert_eq!(conn.last_change_count(), 1);
//! drop(insert);
//!
//! let mut select = conn.prepare("SELECT a FROM t").unwrap();
//! assert!(select.step().unwrap());
//! assert_eq!(select.field(0).unwrap().as_int(), 7);
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod row;
pub mod statement;
pub mod types;

pub use config::{DatabasePath, SqliteConfig};
pub use connection::SqliteConnection;
pub use error::{SqliteError, SqliteResult};
pub use row::SqliteField;
pub use statement::{SqliteQuery, SqliteStatement};
