//! Field access for the current PostgreSQL row.

use polysql_core::{ColumnType, FieldAccess};

use crate::conversions::{TEXT_FORMAT, decode_float, decode_integer};
use crate::oid::{self, Oid};

/// One column of the current row, borrowing the row buffer.
///
/// Values of the supported types arrive in binary format. Anything else is
/// requested in text format and reads as text.
#[derive(Debug, Clone, Copy)]
pub struct PgField<'s> {
    oid: Oid,
    format: i16,
    raw: Option<&'s [u8]>,
}

impl<'s> PgField<'s> {
    /// Create a field over a raw value; `raw` is `None` for SQL NULL.
    pub fn new(oid: Oid, format: i16, raw: Option<&'s [u8]>) -> Self {
        Self { oid, format, raw }
    }

    /// Type OID of the column.
    pub fn oid(&self) -> Oid {
        self.oid
    }

    /// Raw bytes as sent by the server.
    pub fn raw(&self) -> Option<&'s [u8]> {
        self.raw
    }

    fn is_textual(&self) -> bool {
        self.format == TEXT_FORMAT || oid::is_text(self.oid)
    }

    fn text(&self) -> Option<String> {
        self.raw.map(|raw| String::from_utf8_lossy(raw).into_owned())
    }
}

impl FieldAccess for PgField<'_> {
    fn column_type(&self) -> ColumnType {
        match self.raw {
            None => ColumnType::Null,
            Some(_) if self.is_textual() => ColumnType::Text,
            Some(_) if oid::is_integer(self.oid) => ColumnType::Integer,
            Some(_) if oid::is_float(self.oid) => ColumnType::Float,
            Some(_) if self.oid == oid::BYTEA => ColumnType::Blob,
            Some(_) => ColumnType::Null,
        }
    }

    fn as_int64(&self) -> i64 {
        let Some(raw) = self.raw else { return 0 };
        if self.is_textual() {
            let text = String::from_utf8_lossy(raw);
            let text = text.trim();
            return text
                .parse::<i64>()
                .or_else(|_| text.parse::<f64>().map(|f| f as i64))
                .unwrap_or(0);
        }
        decode_integer(self.oid, raw)
            .or_else(|| decode_float(self.oid, raw).map(|f| f as i64))
            .unwrap_or(0)
    }

    fn as_double(&self) -> f64 {
        let Some(raw) = self.raw else { return 0.0 };
        if self.is_textual() {
            return String::from_utf8_lossy(raw).trim().parse().unwrap_or(0.0);
        }
        decode_float(self.oid, raw)
            .or_else(|| decode_integer(self.oid, raw).map(|i| i as f64))
            .unwrap_or(0.0)
    }

    fn as_string(&self) -> String {
        let Some(raw) = self.raw else {
            return String::new();
        };
        if self.is_textual() || self.oid == oid::BYTEA {
            return self.text().unwrap_or_default();
        }
        if let Some(i) = decode_integer(self.oid, raw) {
            return i.to_string();
        }
        decode_float(self.oid, raw)
            .map(|f| f.to_string())
            .unwrap_or_default()
    }

    fn as_blob(&self) -> Vec<u8> {
        match self.raw {
            None => Vec::new(),
            Some(raw) if self.is_textual() || self.oid == oid::BYTEA => raw.to_vec(),
            Some(_) => self.as_string().into_bytes(),
        }
    }
}
