//! # polysql-core
//!
//! Shared vocabulary for the polysql backends.
//!
//! This crate provides:
//! - [`Driver`] and [`OpenParams`] for selecting and opening a backend
//! - [`ColumnType`], [`Column`] and [`Value`] for introspection and binding
//! - [`SqlError`], the one error type surfaced to applications
//! - The backend contract: [`BackendConnection`], [`BackendStatement`], [`FieldAccess`]

pub mod backend;
pub mod driver;
pub mod error;
pub mod types;

pub use backend::{BackendConnection, BackendStatement, FieldAccess};
pub use driver::{Driver, OpenParams};
pub use error::{SqlError, SqlResult};
pub use types::{Column, ColumnType, Value};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::backend::{BackendConnection, BackendStatement, FieldAccess};
    pub use crate::driver::{Driver, OpenParams};
    pub use crate::error::{SqlError, SqlResult};
    pub use crate::types::{Column, ColumnType, Value};
}
