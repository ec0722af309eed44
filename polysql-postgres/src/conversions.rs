//! Binary encoding of parameters and decoding of result values.
//!
//! Parameters travel in binary format, big-endian, with the exception of text
//! bound to a type that has no binary encoding here: that is sent in text
//! format and parsed by the server.

use bytes::BytesMut;
use polysql_core::Value;
use postgres_protocol::types;

use crate::error::{PgError, PgResult};
use crate::oid::{self, Oid};

/// Text wire format code.
pub const TEXT_FORMAT: i16 = 0;
/// Binary wire format code.
pub const BINARY_FORMAT: i16 = 1;

/// One parameter of a prepared statement.
///
/// `buffer` is `None` for SQL NULL. The OID is fixed by the server's
/// parameter description, or by the first bind when the server left it
/// unspecified.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSlot {
    /// Type of the parameter.
    pub oid: Oid,
    /// Wire format of `buffer`.
    pub format: i16,
    /// Encoded value.
    pub buffer: Option<BytesMut>,
}

impl ParamSlot {
    /// Create a NULL slot of the given type.
    pub fn new(oid: Oid) -> Self {
        Self {
            oid,
            format: BINARY_FORMAT,
            buffer: None,
        }
    }

    /// Check if the slot holds SQL NULL.
    pub fn is_null(&self) -> bool {
        self.buffer.is_none()
    }

    /// Reset the value to NULL, keeping the type.
    pub fn clear(&mut self) {
        self.format = BINARY_FORMAT;
        self.buffer = None;
    }

    /// Encode `value` into the slot.
    pub fn set(&mut self, value: Value<'_>) -> PgResult<()> {
        if value.is_null() {
            self.clear();
            return Ok(());
        }

        if self.oid == oid::UNSPECIFIED {
            self.oid = default_oid(&value);
        }

        let mut buffer = BytesMut::new();
        self.format = encode(self.oid, value, &mut buffer)?;
        self.buffer = Some(buffer);
        Ok(())
    }
}

/// The type a value takes when the server did not specify one.
pub fn default_oid(value: &Value<'_>) -> Oid {
    match value {
        Value::Null => oid::UNSPECIFIED,
        Value::Bool(_) => oid::BOOL,
        Value::Int(_) => oid::INT4,
        Value::Int64(_) => oid::INT8,
        Value::Double(_) => oid::FLOAT8,
        Value::Text(_) => oid::TEXT,
        Value::Blob(_) => oid::BYTEA,
    }
}

/// Encode a non-NULL value for a parameter of type `oid`, returning the format code.
pub fn encode(oid: Oid, value: Value<'_>, buf: &mut BytesMut) -> PgResult<i16> {
    match value {
        Value::Null => Ok(BINARY_FORMAT),
        Value::Bool(b) => encode_integer(oid, i64::from(b), &value, buf),
        Value::Int(i) => encode_integer(oid, i64::from(i), &value, buf),
        Value::Int64(i) => encode_integer(oid, i, &value, buf),
        Value::Double(f) => match oid {
            oid::FLOAT8 => {
                types::float8_to_sql(f, buf);
                Ok(BINARY_FORMAT)
            }
            oid::FLOAT4 => {
                let narrowed = f as f32;
                if f.is_finite() && !narrowed.is_finite() {
                    return Err(PgError::type_conversion(format!(
                        "{} does not fit in float4",
                        f
                    )));
                }
                types::float4_to_sql(narrowed, buf);
                Ok(BINARY_FORMAT)
            }
            _ => Err(mismatch(oid, &value)),
        },
        Value::Text(s) => {
            if oid::is_text(oid) {
                types::text_to_sql(s, buf);
                Ok(BINARY_FORMAT)
            } else if !oid::is_supported(oid) {
                buf.extend_from_slice(s.as_bytes());
                Ok(TEXT_FORMAT)
            } else {
                Err(mismatch(oid, &value))
            }
        }
        Value::Blob(b) => match oid {
            oid::BYTEA => {
                types::bytea_to_sql(b, buf);
                Ok(BINARY_FORMAT)
            }
            _ => Err(mismatch(oid, &value)),
        },
    }
}

fn encode_integer(oid: Oid, v: i64, value: &Value<'_>, buf: &mut BytesMut) -> PgResult<i16> {
    let out_of_range = |type_name: &str| {
        PgError::type_conversion(format!("{} does not fit in {}", v, type_name))
    };

    match oid {
        oid::BOOL => types::bool_to_sql(v != 0, buf),
        oid::INT2 => types::int2_to_sql(i16::try_from(v).map_err(|_| out_of_range("int2"))?, buf),
        oid::INT4 => types::int4_to_sql(i32::try_from(v).map_err(|_| out_of_range("int4"))?, buf),
        oid::INT8 => types::int8_to_sql(v, buf),
        _ if !oid::is_supported(oid) => {
            return Err(PgError::UnsupportedType(oid::type_name(oid)));
        }
        _ => return Err(mismatch(oid, value)),
    }
    Ok(BINARY_FORMAT)
}

fn mismatch(oid: Oid, value: &Value<'_>) -> PgError {
    PgError::TypeMismatch {
        value: value.kind(),
        type_name: oid::type_name(oid),
    }
}

/// Decode a binary integer (or boolean) column.
pub fn decode_integer(oid: Oid, raw: &[u8]) -> Option<i64> {
    match oid {
        oid::BOOL => types::bool_from_sql(raw).ok().map(i64::from),
        oid::INT2 => types::int2_from_sql(raw).ok().map(i64::from),
        oid::INT4 => types::int4_from_sql(raw).ok().map(i64::from),
        oid::INT8 => types::int8_from_sql(raw).ok(),
        _ => None,
    }
}

/// Decode a binary float column.
pub fn decode_float(oid: Oid, raw: &[u8]) -> Option<f64> {
    match oid {
        oid::FLOAT4 => types::float4_from_sql(raw).ok().map(f64::from),
        oid::FLOAT8 => types::float8_from_sql(raw).ok(),
        _ => None,
    }
}
