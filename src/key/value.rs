//! Native value model for key components and indexed columns.
//!
//! Mirrors the row store's native column types. Each type has a total
//! native ordering that the comparators and the sortable codec share:
//!
//! - integers and timestamps: numeric order
//! - floats: `-0.0 < +0.0`, NaN sorts after every other value
//! - text: UTF-8 byte order
//! - blobs: byte order
//! - booleans: `false < true`
//!
//! `Null` sorts before any non-null value.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Native column type of the row store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeType {
    Boolean,
    Int,
    BigInt,
    Float,
    Double,
    Text,
    Blob,
    /// Milliseconds since the Unix epoch.
    Timestamp,
}

impl NativeType {
    pub fn name(&self) -> &'static str {
        match self {
            NativeType::Boolean => "boolean",
            NativeType::Int => "int",
            NativeType::BigInt => "bigint",
            NativeType::Float => "float",
            NativeType::Double => "double",
            NativeType::Text => "text",
            NativeType::Blob => "blob",
            NativeType::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single native value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
    Timestamp(i64),
}

impl Value {
    /// Native type of this value, `None` for `Null`.
    pub fn native_type(&self) -> Option<NativeType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(NativeType::Boolean),
            Value::Int(_) => Some(NativeType::Int),
            Value::BigInt(_) => Some(NativeType::BigInt),
            Value::Float(_) => Some(NativeType::Float),
            Value::Double(_) => Some(NativeType::Double),
            Value::Text(_) => Some(NativeType::Text),
            Value::Blob(_) => Some(NativeType::Blob),
            Value::Timestamp(_) => Some(NativeType::Timestamp),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True when the value is null or of type `ty`.
    pub fn conforms_to(&self, ty: NativeType) -> bool {
        self.native_type().map_or(true, |t| t == ty)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Compare two values using native ordering.
    ///
    /// Values of different types order by type rank. Callers only compare
    /// values of one column, so cross-type ordering exists only to keep the
    /// relation total.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::BigInt(a), Value::BigInt(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => sortable_f32(*a).cmp(&sortable_f32(*b)),
            (Value::Double(a), Value::Double(b)) => sortable_f64(*a).cmp(&sortable_f64(*b)),
            (Value::Text(a), Value::Text(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
            (a, b) => a.type_rank().cmp(&b.type_rank()),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Int(_) => 2,
            Value::BigInt(_) => 3,
            Value::Float(_) => 4,
            Value::Double(_) => 5,
            Value::Text(_) => 6,
            Value::Blob(_) => 7,
            Value::Timestamp(_) => 8,
        }
    }
}

/// Order-preserving bit pattern of an `f64`. All NaNs map to the maximum.
pub(crate) fn sortable_f64(v: f64) -> u64 {
    const SIGN: u64 = 0x8000_0000_0000_0000;
    if v.is_nan() {
        return u64::MAX;
    }
    let bits = v.to_bits();
    if bits & SIGN != 0 {
        !bits
    } else {
        bits ^ SIGN
    }
}

/// Order-preserving bit pattern of an `f32`. All NaNs map to the maximum.
pub(crate) fn sortable_f32(v: f32) -> u32 {
    const SIGN: u32 = 0x8000_0000;
    if v.is_nan() {
        return u32::MAX;
    }
    let bits = v.to_bits();
    if bits & SIGN != 0 {
        !bits
    } else {
        bits ^ SIGN
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v:?}"),
            Value::Blob(v) => {
                f.write_str("0x")?;
                for byte in v {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::Timestamp(v) => write!(f, "ts:{v}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}
