//! PostgreSQL backend for polysql.
//!
//! This crate implements the polysql backend contract with a blocking
//! client for the PostgreSQL frontend/backend protocol. Messages are encoded
//! and decoded by `postgres-protocol`; values travel in binary format.
//!
//! # Features
//!
//! - libpq-style keyword/value and `postgres://` connection strings, with
//!   gaps filled from the `PG*` environment variables
//! - Cleartext, MD5 and SCRAM-SHA-256 authentication
//! - Named prepared statements (`s0`, `s1`, ...) with `?` placeholders
//!   rewritten to `$n`
//! - Single-row streaming: each `step` reads one row off the socket
//! - Transactions and schema introspection through cached helper statements
//!
//! # Type Mapping
//!
//! | Host value     | Parameter types                  |
//! |----------------|----------------------------------|
//! | bool, i32, i64 | `bool`, `int2`, `int4`, `int8`   |
//! | f64            | `float4`, `float8`               |
//! | text           | `text`, `varchar`, `bpchar`, `name`, any other type in text format |
//! | blob           | `bytea`                          |
//!
//! Result columns of other types are requested in text format and read as text.
//!
//! # Example
//!
//! ```rust,no_run
//! use polysql_core::{BackendConnection, BackendStatement, FieldAccess, OpenParams, Value};
//! use polysql_postgres::PgConnection;
//!
//! let mut conn = PgConnection::new();
//! conn.open(&OpenParams::postgres("host=localhost user=postgres dbname=app")).unwrap();
//!
//! let mut stmt = conn.prepare("SELECT name FROM users WHERE id = ?").unwrap();
//! stmt.bind(0, Value::Int64(1)).unwrap();
//! while stmt.step().unwrap() {
//!     println!("{}", stmt.field(0).unwrap().as_string());
//! }
//! ```

pub mod config;
pub mod connection;
pub mod conversions;
pub mod error;
pub mod oid;
pub mod placeholders;
pub mod row;
pub mod session;
pub mod statement;

pub use config::{Address, EnvSource, MapEnvSource, PgConfig, PgConfigBuilder, SslMode, StdEnvSource};
pub use connection::PgConnection;
pub use error::{PgError, PgResult};
pub use row::PgField;
pub use session::{ColumnDesc, Session};
pub use statement::{PgQuery, PgStatement};
