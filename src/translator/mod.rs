//! Composite-key range translation.
//!
//! Turns clustering-key slices of the row store into search queries and
//! sorts that reproduce the store's ordering and inclusion rules exactly.
//! Two strategies exist:
//!
//! - `columns` -- one field per key component, boolean query tree, native
//!   field sorts. Fast, but needs a clustering-capable mapper for every
//!   component.
//! - `generic` -- the encoded key in one opaque field, comparator-driven
//!   range matching and sorting. Always available.
//!
//! The strategy is chosen once per index by `RangeTranslator::for_schema`.

pub mod columns;
pub mod generic;

pub use columns::ColumnsStrategy;
pub use generic::{GenericStrategy, KEY_FIELD};

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::key::{CompositeKey, KeyType, RangeBoundary};
use crate::schema::IndexSchema;
use crate::search::{Document, Query, Sort, SortField};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Columns,
    Generic,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Columns => f.write_str("columns"),
            StrategyKind::Generic => f.write_str("generic"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RangeTranslator {
    Columns(ColumnsStrategy),
    Generic(GenericStrategy),
}

impl RangeTranslator {
    /// Pick the columns strategy when every key component is mapped with
    /// clustering support, the generic strategy otherwise.
    pub fn for_schema(key_type: Arc<KeyType>, schema: &IndexSchema) -> Self {
        let translator = match ColumnsStrategy::new(Arc::clone(&key_type), schema) {
            Some(columns) => RangeTranslator::Columns(columns),
            None => RangeTranslator::Generic(GenericStrategy::new(key_type)),
        };
        tracing::debug!(strategy = %translator.kind(), "range translator selected");
        translator
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            RangeTranslator::Columns(_) => StrategyKind::Columns,
            RangeTranslator::Generic(_) => StrategyKind::Generic,
        }
    }

    pub fn key_type(&self) -> &Arc<KeyType> {
        match self {
            RangeTranslator::Columns(s) => s.key_type(),
            RangeTranslator::Generic(s) => s.key_type(),
        }
    }

    /// Translate a key slice into a query.
    ///
    /// Both boundaries are validated before anything is built. Returns
    /// `None` when neither side constrains the key (full scan).
    pub fn query(
        &self,
        start: Option<&RangeBoundary>,
        stop: Option<&RangeBoundary>,
    ) -> Result<Option<Query>> {
        for boundary in start.iter().chain(stop.iter()) {
            self.key_type().validate_boundary(boundary)?;
        }
        match self {
            RangeTranslator::Columns(s) => s.query(start, stop),
            RangeTranslator::Generic(s) => s.query(start, stop),
        }
    }

    /// Sort fields reproducing clustering order.
    pub fn sort_fields(&self) -> Vec<SortField> {
        match self {
            RangeTranslator::Columns(s) => s.sort_fields(),
            RangeTranslator::Generic(s) => s.sort_fields(),
        }
    }

    pub fn sort(&self) -> Sort {
        Sort::new(self.sort_fields())
    }

    /// Add the clustering key fields of `key` to `doc`.
    pub fn add_fields(&self, doc: &mut Document, key: &CompositeKey) -> Result<()> {
        match self {
            RangeTranslator::Columns(s) => s.add_fields(doc, key),
            RangeTranslator::Generic(s) => s.add_fields(doc, key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{KeyComponent, NativeType, Value};
    use crate::schema::Mapper;

    fn key_type() -> Arc<KeyType> {
        Arc::new(KeyType::new(vec![
            KeyComponent::new("a", NativeType::Int),
            KeyComponent::new("b", NativeType::Text),
        ]))
    }

    #[test]
    fn test_selects_columns_when_fully_mapped() {
        let schema = IndexSchema::new()
            .with_mapper("a", Mapper::Integer)
            .with_mapper("b", Mapper::String);
        let t = RangeTranslator::for_schema(key_type(), &schema);
        assert_eq!(t.kind(), StrategyKind::Columns);
        assert_eq!(t.sort_fields().len(), 2);
    }

    #[test]
    fn test_falls_back_to_generic() {
        let schema = IndexSchema::new().with_mapper("a", Mapper::Integer);
        let t = RangeTranslator::for_schema(key_type(), &schema);
        assert_eq!(t.kind(), StrategyKind::Generic);
        assert_eq!(t.sort_fields().len(), 1);
        assert_eq!(t.sort_fields()[0].name(), KEY_FIELD);
    }

    #[test]
    fn test_invalid_boundary_rejected_by_both_strategies() {
        let too_long = RangeBoundary::inclusive(vec![Value::Int(1), Value::from("x"), Value::Int(2)]);
        let wrong_type = RangeBoundary::inclusive(vec![Value::from("1")]);
        let mapped = IndexSchema::new()
            .with_mapper("a", Mapper::Integer)
            .with_mapper("b", Mapper::String);
        for schema in [IndexSchema::new(), mapped] {
            let t = RangeTranslator::for_schema(key_type(), &schema);
            let err = t.query(Some(&too_long), None).unwrap_err();
            assert_eq!(err.code(), "INVALID_BOUNDARY");
            assert!(t.query(None, Some(&wrong_type)).is_err());
        }
    }
}
