//! # polysql
//!
//! One blocking `Connection`/`Statement` API over SQLite and PostgreSQL.
//!
//! The backend is chosen at runtime by the `driver` field of [`OpenParams`];
//! everything else (preparing, binding, stepping through rows, transactions
//! and schema introspection) looks the same for both.
//!
//! polysql provides:
//! - [`Connection`] and [`Statement`], the backend-agnostic facade
//! - [`FieldView`] and [`ScopedReset`] helpers for reading rows and reusing statements
//! - An embedded SQLite backend (`polysql-sqlite`, over `rusqlite`)
//! - A PostgreSQL backend speaking the binary wire protocol (`polysql-postgres`)
//!
//! ## Quick Start
//!
//! ```rust
//! use polysql::prelude::*;
//!
//! fn main() -> SqlResult<()> {
//!     let conn = Connection::connect(&OpenParams::sqlite_memory())?;
//!     conn.execute("CREATE TABLE users(id INTEGER, name TEXT)")?;
//!
//!     conn.begin_transaction()?;
//!     let mut insert = conn.prepare("INSERT INTO users VALUES(?, ?)")?;
//!     for (id, name) in [(1, "ada"), (2, "grace")] {
//!         let mut stmt = insert.scoped_reset();
//!         stmt.bind(0, id)?;
//!         stmt.bind(1, name)?;
//!         stmt.run()?;
//!     }
//!     conn.commit_transaction()?;
//!
//!     let mut select = conn.prepare("SELECT name FROM users WHERE id = ?")?;
//!     select.bind(0, 2)?;
//!     assert!(select.step()?);
//!     assert_eq!(select.get_string(0), "grace");
//!     Ok(())
//! }
//! ```
//!
//! ## Drivers
//!
//! | `driver`                  | Backend    | Uses                                  |
//! |---------------------------|------------|---------------------------------------|
//! | `""`, `sqlite`, `sqlite3` | SQLite     | `path`, `exclusive_locking`, `multithreaded`, `journal_size_limit` |
//! | `postgres`, `postgresql`  | PostgreSQL | `connection_string`                   |

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod connection;
pub mod logging;
pub mod model;
pub mod statement;

pub use connection::Connection;
pub use statement::{FieldView, ScopedReset, Statement};

pub use polysql_core::{Column, ColumnType, Driver, OpenParams, SqlError, SqlResult, Value};

/// The SQLite backend.
pub mod sqlite {
    pub use polysql_sqlite::*;
}

/// The PostgreSQL backend.
pub mod postgres {
    pub use polysql_postgres::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::connection::Connection;
    pub use crate::statement::{FieldView, ScopedReset, Statement};
    pub use polysql_core::{Column, ColumnType, Driver, OpenParams, SqlError, SqlResult, Value};
}
