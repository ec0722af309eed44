//! Field access for the current SQLite row.

use polysql_core::{ColumnType, FieldAccess};
use rusqlite::types::Value;

use crate::types::value_type;

/// One column of the current row.
///
/// Conversions follow the engine's own column accessors: numbers render as
/// text, text is parsed as a number (zero if it is not one), and NULL reads
/// as zero or empty.
#[derive(Debug, Clone, Copy)]
pub struct SqliteField<'s> {
    value: &'s Value,
}

impl<'s> SqliteField<'s> {
    /// Create a field over a stored value.
    pub fn new(value: &'s Value) -> Self {
        Self { value }
    }

    /// The underlying engine value.
    pub fn value(&self) -> &'s Value {
        self.value
    }
}

impl FieldAccess for SqliteField<'_> {
    fn column_type(&self) -> ColumnType {
        value_type(self.value)
    }

    fn as_int64(&self) -> i64 {
        match self.value {
            Value::Integer(i) => *i,
            Value::Real(f) => *f as i64,
            Value::Text(s) => parse_int(s),
            Value::Null | Value::Blob(_) => 0,
        }
    }

    fn as_double(&self) -> f64 {
        match self.value {
            Value::Integer(i) => *i as f64,
            Value::Real(f) => *f,
            Value::Text(s) => s.trim().parse().unwrap_or(0.0),
            Value::Null | Value::Blob(_) => 0.0,
        }
    }

    fn as_string(&self) -> String {
        match self.value {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Blob(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }

    fn as_blob(&self) -> Vec<u8> {
        match self.value {
            Value::Null => Vec::new(),
            Value::Blob(b) => b.clone(),
            Value::Text(s) => s.as_bytes().to_vec(),
            Value::Integer(_) | Value::Real(_) => self.as_string().into_bytes(),
        }
    }
}

fn parse_int(s: &str) -> i64 {
    let s = s.trim();
    s.parse::<i64>()
        .or_else(|_| s.parse::<f64>().map(|f| f as i64))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_field() {
        let value = Value::Integer(42);
        let field = SqliteField::new(&value);
        assert_eq!(field.column_type(), ColumnType::Integer);
        assert_eq!(field.as_int(), 42);
        assert_eq!(field.as_int64(), 42);
        assert_eq!(field.as_double(), 42.0);
        assert_eq!(field.as_string(), "42");
        assert!(field.as_bool());
    }

    #[test]
    fn test_text_field() {
        let value = Value::Text("12".to_string());
        let field = SqliteField::new(&value);
        assert_eq!(field.column_type(), ColumnType::Text);
        assert_eq!(field.as_int64(), 12);
        assert_eq!(field.as_string16(), "12".encode_utf16().collect::<Vec<_>>());
        assert_eq!(field.as_blob(), b"12".to_vec());

        let value = Value::Text("abc".to_string());
        assert_eq!(SqliteField::new(&value).as_int64(), 0);
        assert_eq!(SqliteField::new(&value).as_double(), 0.0);
    }

    #[test]
    fn test_null_field() {
        let value = Value::Null;
        let field = SqliteField::new(&value);
        assert!(field.is_null());
        assert_eq!(field.as_int64(), 0);
        assert_eq!(field.as_string(), "");
        assert!(field.as_blob().is_empty());
        assert!(!field.as_bool());
    }

    #[test]
    fn test_narrowing_out_of_range() {
        let value = Value::Integer(i64::from(i32::MAX) + 1);
        let field = SqliteField::new(&value);
        assert_eq!(field.as_int(), 0);
        assert_eq!(field.as_int64(), i64::from(i32::MAX) + 1);
    }

    #[test]
    fn test_blob_field() {
        let value = Value::Blob(vec![1, 2, 3]);
        let field = SqliteField::new(&value);
        assert_eq!(field.column_type(), ColumnType::Blob);
        assert_eq!(field.as_blob(), vec![1, 2, 3]);
        assert_eq!(field.as_int64(), 0);
    }
}
