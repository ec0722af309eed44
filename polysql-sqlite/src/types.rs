//! Type conversion utilities for SQLite.

use polysql_core::{ColumnType, Value};
use rusqlite::types::{Value as SqliteValue, ValueRef};

/// Convert a bind value to an owned SQLite value.
pub fn value_to_sqlite(value: Value<'_>) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(b) => SqliteValue::Integer(i64::from(b)),
        Value::Int(i) => SqliteValue::Integer(i64::from(i)),
        Value::Int64(i) => SqliteValue::Integer(i),
        Value::Double(f) => SqliteValue::Real(f),
        Value::Text(s) => SqliteValue::Text(s.to_string()),
        Value::Blob(b) => SqliteValue::Blob(b.to_vec()),
    }
}

/// Copy a borrowed engine value out of the current row.
pub fn value_from_ref(value: ValueRef<'_>) -> SqliteValue {
    SqliteValue::from(value)
}

/// Coarse type of a stored value.
pub fn value_type(value: &SqliteValue) -> ColumnType {
    match value {
        SqliteValue::Null => ColumnType::Null,
        SqliteValue::Integer(_) => ColumnType::Integer,
        SqliteValue::Real(_) => ColumnType::Float,
        SqliteValue::Text(_) => ColumnType::Text,
        SqliteValue::Blob(_) => ColumnType::Blob,
    }
}

/// Map a declared column type to a coarse type using SQLite's affinity rules.
///
/// `INT` anywhere gives integer; `CHAR`, `CLOB` or `TEXT` give text; `BLOB`
/// or an empty declaration give blob; `REAL`, `FLOA` or `DOUB` give float.
/// Everything else has numeric affinity and is reported as `Null`.
pub fn declared_type(decl: &str) -> ColumnType {
    let decl = decl.to_ascii_uppercase();

    if decl.contains("INT") {
        ColumnType::Integer
    } else if decl.contains("CHAR") || decl.contains("CLOB") || decl.contains("TEXT") {
        ColumnType::Text
    } else if decl.is_empty() || decl.contains("BLOB") {
        ColumnType::Blob
    } else if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
        ColumnType::Float
    } else {
        ColumnType::Null
    }
}
