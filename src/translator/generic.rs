//! Generic strategy: the whole clustering key in one opaque field.
//!
//! Always applicable. Indexing costs one encode per row; every range
//! candidate is decoded and compared at query time.

use std::sync::Arc;

use crate::error::Result;
use crate::key::{CompositeKey, KeyComparator, KeyType, RangeBoundary, Value};
use crate::search::{Document, KeyRangeQuery, Query, SortField};

/// Field holding the encoded clustering key.
pub const KEY_FIELD: &str = "_key";

#[derive(Debug, Clone)]
pub struct GenericStrategy {
    comparator: KeyComparator,
}

impl GenericStrategy {
    pub fn new(key_type: Arc<KeyType>) -> Self {
        Self {
            comparator: KeyComparator::new(key_type),
        }
    }

    pub fn key_type(&self) -> &Arc<KeyType> {
        self.comparator.key_type()
    }

    pub fn comparator(&self) -> &KeyComparator {
        &self.comparator
    }

    pub fn add_fields(&self, doc: &mut Document, key: &CompositeKey) -> Result<()> {
        let bytes = self.key_type().encode(key)?;
        doc.insert(KEY_FIELD, Value::Blob(bytes));
        Ok(())
    }

    /// Build the key-range query. Boundaries must already be validated.
    pub fn query(
        &self,
        start: Option<&RangeBoundary>,
        stop: Option<&RangeBoundary>,
    ) -> Result<Option<Query>> {
        let start = start.filter(|b| !b.is_empty()).cloned();
        let stop = stop.filter(|b| !b.is_empty()).cloned();
        if start.is_none() && stop.is_none() {
            return Ok(None);
        }
        Ok(Some(Query::KeyRange(KeyRangeQuery {
            field: KEY_FIELD.to_string(),
            comparator: self.comparator.clone(),
            start,
            stop,
        })))
    }

    pub fn sort_fields(&self) -> Vec<SortField> {
        vec![SortField::Key {
            field: KEY_FIELD.to_string(),
            comparator: self.comparator.clone(),
            reverse: false,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{KeyComponent, NativeType};

    fn strategy() -> GenericStrategy {
        GenericStrategy::new(Arc::new(KeyType::new(vec![
            KeyComponent::new("day", NativeType::Text),
            KeyComponent::new("seq", NativeType::BigInt).descending(),
        ])))
    }

    fn doc(s: &GenericStrategy, day: &str, seq: i64) -> Document {
        let mut d = Document::new();
        s.add_fields(&mut d, &CompositeKey::new(vec![Value::from(day), Value::BigInt(seq)]))
            .unwrap();
        d
    }

    #[test]
    fn test_key_range_with_descending_component() {
        let s = strategy();
        let start = RangeBoundary::inclusive(vec![Value::from("mon"), Value::BigInt(50)]);
        let stop = RangeBoundary::exclusive(vec![Value::from("tue")]);
        let q = s.query(Some(&start), Some(&stop)).unwrap().unwrap();

        assert!(q.matches(&doc(&s, "mon", 50)));
        assert!(q.matches(&doc(&s, "mon", 1)));
        assert!(!q.matches(&doc(&s, "mon", 51)));
        assert!(q.matches(&doc(&s, "sat", 7)));
        assert!(!q.matches(&doc(&s, "tue", 7)));
    }

    #[test]
    fn test_corrupt_key_never_matches() {
        let s = strategy();
        let q = s
            .query(Some(&RangeBoundary::inclusive(vec![Value::from("a")])), None)
            .unwrap()
            .unwrap();
        let corrupt = Document::new().with_field(KEY_FIELD, Value::Blob(vec![0x06, b'z']));
        assert!(!q.matches(&corrupt));
        assert!(!q.matches(&Document::new()));
    }

    #[test]
    fn test_empty_boundaries_mean_no_query() {
        let s = strategy();
        let empty = RangeBoundary::unbounded();
        assert!(s.query(Some(&empty), None).unwrap().is_none());
        assert!(s.query(None, None).unwrap().is_none());
    }

    #[test]
    fn test_sort_uses_key_comparator() {
        let s = strategy();
        let sort = &s.sort_fields()[0];
        let a = doc(&s, "mon", 9);
        let b = doc(&s, "mon", 3);
        // seq is descending, so 9 sorts before 3
        assert_eq!(sort.compare(&a, &b), std::cmp::Ordering::Less);
    }
}
