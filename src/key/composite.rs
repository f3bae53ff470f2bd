//! Composite keys, key types and range boundaries.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::key::codec::{SortableCodec, ValueCodec};
use crate::key::value::{NativeType, Value};

/// Per-component clustering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringOrder {
    #[default]
    Asc,
    Desc,
}

/// One named, typed component of a composite key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyComponent {
    pub name: String,
    pub native_type: NativeType,
    #[serde(default)]
    pub order: ClusteringOrder,
}

impl KeyComponent {
    pub fn new(name: impl Into<String>, native_type: NativeType) -> Self {
        Self {
            name: name.into(),
            native_type,
            order: ClusteringOrder::Asc,
        }
    }

    pub fn descending(mut self) -> Self {
        self.order = ClusteringOrder::Desc;
        self
    }

    pub fn is_descending(&self) -> bool {
        self.order == ClusteringOrder::Desc
    }
}

/// An ordered tuple of component values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompositeKey(Vec<Value>);

impl CompositeKey {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Value> {
        self.0.get(i)
    }
}

impl From<Vec<Value>> for CompositeKey {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str("]")
    }
}

/// One side of a key range: a key prefix plus an inclusion flag.
///
/// An inclusive boundary admits every key that shares the prefix, an
/// exclusive one admits none of them. An empty prefix is unbounded.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBoundary {
    prefix: CompositeKey,
    inclusive: bool,
}

impl RangeBoundary {
    pub fn inclusive(values: Vec<Value>) -> Self {
        Self {
            prefix: CompositeKey(values),
            inclusive: true,
        }
    }

    pub fn exclusive(values: Vec<Value>) -> Self {
        Self {
            prefix: CompositeKey(values),
            inclusive: false,
        }
    }

    pub fn unbounded() -> Self {
        Self::inclusive(Vec::new())
    }

    pub fn values(&self) -> &[Value] {
        self.prefix.values()
    }

    pub fn len(&self) -> usize {
        self.prefix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty()
    }

    pub fn is_inclusive(&self) -> bool {
        self.inclusive
    }
}

impl fmt::Display for RangeBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.inclusive { "incl" } else { "excl" };
        write!(f, "{} {}", self.prefix, marker)
    }
}

/// Fixed-arity description of a table's clustering key.
///
/// Immutable for the lifetime of a schema; shared behind an `Arc` by the
/// translator, comparators and queries.
pub struct KeyType {
    components: Vec<KeyComponent>,
    codec: Arc<dyn ValueCodec>,
}

impl fmt::Debug for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyType")
            .field("components", &self.components)
            .finish_non_exhaustive()
    }
}

impl KeyType {
    /// Create a key type using the default sortable codec.
    ///
    /// # Panics
    ///
    /// Panics if `components` is empty or names repeat.
    pub fn new(components: Vec<KeyComponent>) -> Self {
        Self::with_codec(components, Arc::new(SortableCodec))
    }

    /// Create a key type with an explicit component codec.
    ///
    /// # Panics
    ///
    /// Panics if `components` is empty or names repeat.
    pub fn with_codec(components: Vec<KeyComponent>, codec: Arc<dyn ValueCodec>) -> Self {
        assert!(!components.is_empty(), "key type needs at least one component");
        for (i, c) in components.iter().enumerate() {
            assert!(
                components[..i].iter().all(|o| o.name != c.name),
                "duplicate key component '{}'",
                c.name
            );
        }
        Self { components, codec }
    }

    pub fn arity(&self) -> usize {
        self.components.len()
    }

    pub fn components(&self) -> &[KeyComponent] {
        &self.components
    }

    pub fn component(&self, i: usize) -> Option<&KeyComponent> {
        self.components.get(i)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.components.iter().position(|c| c.name == name)
    }

    pub fn codec(&self) -> &dyn ValueCodec {
        self.codec.as_ref()
    }

    // -- Validation -----------------------------------------------------------

    /// Check a full key: exact arity, every component present and of its
    /// declared type. Clustering components are never null.
    pub fn validate_key(&self, key: &CompositeKey) -> Result<()> {
        if key.len() != self.arity() {
            return Err(IndexError::InvalidKey(format!(
                "key {} has {} components, expected {}",
                key,
                key.len(),
                self.arity()
            )));
        }
        for (value, component) in key.values().iter().zip(&self.components) {
            if value.is_null() {
                return Err(IndexError::InvalidKey(format!(
                    "component '{}' is null",
                    component.name
                )));
            }
            if !value.conforms_to(component.native_type) {
                return Err(IndexError::InvalidKey(format!(
                    "component '{}' expects {}, got {}",
                    component.name, component.native_type, value
                )));
            }
        }
        Ok(())
    }

    /// Check a boundary before any query is built from it.
    ///
    /// Rejects prefixes longer than the key, null components and values of
    /// the wrong type.
    pub fn validate_boundary(&self, boundary: &RangeBoundary) -> Result<()> {
        if boundary.len() > self.arity() {
            return Err(IndexError::InvalidBoundary(format!(
                "boundary {} has {} components, key arity is {}",
                boundary,
                boundary.len(),
                self.arity()
            )));
        }
        for (value, component) in boundary.values().iter().zip(&self.components) {
            if value.is_null() {
                return Err(IndexError::InvalidBoundary(format!(
                    "null value for component '{}'",
                    component.name
                )));
            }
            if !value.conforms_to(component.native_type) {
                return Err(IndexError::InvalidBoundary(format!(
                    "component '{}' expects {}, got {}",
                    component.name, component.native_type, value
                )));
            }
        }
        Ok(())
    }

    /// Build a boundary from named component values.
    ///
    /// Names must form a prefix of the key in declaration order.
    pub fn boundary_from_columns(
        &self,
        columns: &[(&str, Value)],
        inclusive: bool,
    ) -> Result<RangeBoundary> {
        let mut values = Vec::with_capacity(columns.len());
        for (i, (name, value)) in columns.iter().enumerate() {
            match self.position(name) {
                Some(pos) if pos == i => values.push(value.clone()),
                Some(pos) => {
                    return Err(IndexError::InvalidBoundary(format!(
                        "component '{}' is at position {}, found at {}",
                        name, pos, i
                    )))
                }
                None => {
                    return Err(IndexError::InvalidBoundary(format!(
                        "unknown key component '{}'",
                        name
                    )))
                }
            }
        }
        let boundary = RangeBoundary {
            prefix: CompositeKey(values),
            inclusive,
        };
        self.validate_boundary(&boundary)?;
        Ok(boundary)
    }

    // -- Encoding -------------------------------------------------------------

    /// Encode a full key into its opaque byte form.
    pub fn encode(&self, key: &CompositeKey) -> Result<Vec<u8>> {
        self.validate_key(key)?;
        let mut buf = Vec::with_capacity(self.arity() * 9);
        for (value, component) in key.values().iter().zip(&self.components) {
            self.codec.encode_into(value, component.native_type, &mut buf)?;
        }
        Ok(buf)
    }

    /// Decode an opaque key. The input must hold exactly `arity` components.
    pub fn decode(&self, bytes: &[u8]) -> Result<CompositeKey> {
        let mut values = Vec::with_capacity(self.arity());
        let mut offset = 0;
        for component in &self.components {
            let (value, used) = self
                .codec
                .decode_prefix(&bytes[offset..], component.native_type)
                .map_err(|e| match e {
                    IndexError::Decode(msg) => {
                        IndexError::Decode(format!("component '{}': {}", component.name, msg))
                    }
                    other => other,
                })?;
            if value.is_null() {
                return Err(IndexError::Decode(format!(
                    "component '{}': null clustering component",
                    component.name
                )));
            }
            values.push(value);
            offset += used;
        }
        if offset != bytes.len() {
            return Err(IndexError::Decode(format!(
                "{} trailing bytes after composite key",
                bytes.len() - offset
            )));
        }
        Ok(CompositeKey(values))
    }
}
