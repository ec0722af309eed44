//! Type OIDs understood by the binary conversions.

use postgres_types::Type;

/// A PostgreSQL type OID.
pub type Oid = u32;

/// Unspecified type; assigned by the first bind.
pub const UNSPECIFIED: Oid = 0;
/// `bool`
pub const BOOL: Oid = 16;
/// `bytea`
pub const BYTEA: Oid = 17;
/// `name`
pub const NAME: Oid = 19;
/// `int8`
pub const INT8: Oid = 20;
/// `int2`
pub const INT2: Oid = 21;
/// `int4`
pub const INT4: Oid = 23;
/// `text`
pub const TEXT: Oid = 25;
/// `float4`
pub const FLOAT4: Oid = 700;
/// `float8`
pub const FLOAT8: Oid = 701;
/// `unknown`
pub const UNKNOWN: Oid = 705;
/// `bpchar`
pub const BPCHAR: Oid = 1042;
/// `varchar`
pub const VARCHAR: Oid = 1043;

/// Check if values of this type travel as raw UTF-8.
pub fn is_text(oid: Oid) -> bool {
    matches!(oid, TEXT | VARCHAR | BPCHAR | NAME | UNKNOWN)
}

/// Check if this type is an integer (booleans included).
pub fn is_integer(oid: Oid) -> bool {
    matches!(oid, BOOL | INT2 | INT4 | INT8)
}

/// Check if this type is a float.
pub fn is_float(oid: Oid) -> bool {
    matches!(oid, FLOAT4 | FLOAT8)
}

/// Check if this type has a binary encoding here.
pub fn is_supported(oid: Oid) -> bool {
    is_text(oid) || is_integer(oid) || is_float(oid) || oid == BYTEA
}

/// Human readable type name for messages.
pub fn type_name(oid: Oid) -> String {
    match Type::from_oid(oid) {
        Some(ty) => ty.name().to_string(),
        None if oid == UNSPECIFIED => "unspecified".to_string(),
        None => format!("oid {}", oid),
    }
}
