//! Column mappers: how a native column is projected into an indexed field.
//!
//! A mapper knows which native types it can index, which of those it can
//! index *faithfully for clustering* (single-valued, order-preserving), and
//! how to turn a native value into its indexed base value.

use std::fmt;
use std::sync::Arc;

use crate::error::{IndexError, Result};
use crate::key::{NativeType, NativeType as T, Value};
use crate::search::SortField;

/// Extension point for mappers that are not built in.
///
/// Plugins are registered explicitly with a `MapperRegistry`; nothing is
/// looked up by name at query time.
pub trait MapperPlugin: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Native types this plugin can index at all.
    fn supports(&self, ty: NativeType) -> bool;

    /// Whether indexing `ty` preserves native order and is single-valued.
    fn supports_clustering(&self, ty: NativeType) -> bool;

    /// Convert a native value into the indexed representation.
    fn base(&self, field: &str, value: &Value) -> Result<Value>;
}

#[derive(Debug, Clone)]
pub enum Mapper {
    Boolean,
    Integer,
    BigInteger,
    Float,
    Double,
    /// Untokenized string.
    String,
    /// Analyzed text. Multi-valued after tokenization, so never usable for
    /// clustering.
    Text { analyzer: String },
    Blob,
    Date,
    Plugin(Arc<dyn MapperPlugin>),
}

impl Mapper {
    pub fn name(&self) -> &str {
        match self {
            Mapper::Boolean => "boolean",
            Mapper::Integer => "integer",
            Mapper::BigInteger => "big_integer",
            Mapper::Float => "float",
            Mapper::Double => "double",
            Mapper::String => "string",
            Mapper::Text { .. } => "text",
            Mapper::Blob => "blob",
            Mapper::Date => "date",
            Mapper::Plugin(p) => p.name(),
        }
    }

    fn supported_types(&self) -> &'static [NativeType] {
        match self {
            Mapper::Boolean => &[T::Boolean],
            Mapper::Integer => &[T::Int],
            Mapper::BigInteger => &[T::Int, T::BigInt, T::Timestamp],
            Mapper::Float => &[T::Float],
            Mapper::Double => &[T::Int, T::Float, T::Double],
            Mapper::String => &[T::Text, T::Boolean, T::Int, T::BigInt, T::Timestamp],
            Mapper::Text { .. } => &[T::Text],
            Mapper::Blob => &[T::Blob],
            Mapper::Date => &[T::Timestamp, T::BigInt],
            Mapper::Plugin(_) => &[],
        }
    }

    /// Whether this mapper can index values of `ty` at all.
    pub fn supports(&self, ty: NativeType) -> bool {
        match self {
            Mapper::Plugin(p) => p.supports(ty),
            _ => self.supported_types().contains(&ty),
        }
    }

    /// Whether projecting `ty` through this mapper keeps native order.
    ///
    /// Strings built from numbers or booleans do not sort like their
    /// source values, and analyzed text is multi-valued.
    pub fn supports_clustering(&self, ty: NativeType) -> bool {
        match self {
            Mapper::Plugin(p) => p.supports_clustering(ty),
            Mapper::Text { .. } => false,
            Mapper::String => ty == T::Text,
            _ => self.supports(ty),
        }
    }

    /// Convert `value` into the representation stored in the index.
    pub fn base(&self, field: &str, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        if let Mapper::Plugin(p) = self {
            return p.base(field, value);
        }
        let base = match (self, value) {
            (Mapper::Boolean, Value::Boolean(v)) => Value::Boolean(*v),
            (Mapper::Integer, Value::Int(v)) => Value::Int(*v),
            (Mapper::BigInteger, Value::Int(v)) => Value::BigInt(i64::from(*v)),
            (Mapper::BigInteger, Value::BigInt(v) | Value::Timestamp(v)) => Value::BigInt(*v),
            (Mapper::Float, Value::Float(v)) => Value::Float(*v),
            (Mapper::Double, Value::Int(v)) => Value::Double(f64::from(*v)),
            (Mapper::Double, Value::Float(v)) => Value::Double(f64::from(*v)),
            (Mapper::Double, Value::Double(v)) => Value::Double(*v),
            (Mapper::String | Mapper::Text { .. }, Value::Text(v)) => Value::Text(v.clone()),
            (Mapper::String, Value::Boolean(v)) => Value::Text(v.to_string()),
            (Mapper::String, Value::Int(v)) => Value::Text(v.to_string()),
            (Mapper::String, Value::BigInt(v) | Value::Timestamp(v)) => Value::Text(v.to_string()),
            (Mapper::Blob, Value::Blob(v)) => Value::Blob(v.clone()),
            (Mapper::Date, Value::Timestamp(v) | Value::BigInt(v)) => Value::Timestamp(*v),
            _ => {
                return Err(IndexError::Schema(format!(
                    "{} mapper for field '{}' cannot index value {}",
                    self.name(),
                    field,
                    value
                )))
            }
        };
        Ok(base)
    }

    /// Native sort field over this mapper's indexed values.
    pub fn native_sort(&self, field: &str, reverse: bool) -> SortField {
        SortField::field(field, reverse)
    }
}
