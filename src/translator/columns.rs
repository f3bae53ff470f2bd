//! Columns strategy: one indexed field per clustering key component.
//!
//! A key range `[start, stop]` over components `c0..ck` becomes, per side,
//! a disjunction over prefix depths. For a start boundary `[v0, v1, v2]`:
//!
//! ```text
//!    (c0 > v0)
//! OR (c0 = v0 AND c1 > v1)
//! OR (c0 = v0 AND c1 = v1 AND c2 >= v2)   -- '>=' only when inclusive
//! ```
//!
//! Shallower levels are strict: a key that only ties on a shallower
//! component is decided by the deeper levels. Stop boundaries mirror this
//! with upper bounds, and a descending component swaps the direction of its
//! range. Both sides are then intersected.

use std::sync::Arc;

use crate::error::Result;
use crate::key::{CompositeKey, KeyType, RangeBoundary};
use crate::schema::{IndexSchema, Mapper};
use crate::search::{Document, Query, SortField};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Start,
    Stop,
}

#[derive(Debug, Clone)]
pub struct ColumnsStrategy {
    key_type: Arc<KeyType>,
    /// One mapper per key component, in component order.
    mappers: Vec<Mapper>,
}

impl ColumnsStrategy {
    /// Build the strategy if every key component has a mapper that supports
    /// clustering for its native type. Returns `None` otherwise.
    pub fn new(key_type: Arc<KeyType>, schema: &IndexSchema) -> Option<Self> {
        let mut mappers = Vec::with_capacity(key_type.arity());
        for component in key_type.components() {
            match schema.mapping(&component.name) {
                Some(mapper) if mapper.supports_clustering(component.native_type) => {
                    mappers.push(mapper.clone());
                }
                Some(mapper) => {
                    tracing::debug!(
                        component = %component.name,
                        mapper = mapper.name(),
                        "mapper does not support clustering for {}",
                        component.native_type
                    );
                    return None;
                }
                None => {
                    tracing::debug!(component = %component.name, "no mapping for key component");
                    return None;
                }
            }
        }
        Some(Self { key_type, mappers })
    }

    pub fn key_type(&self) -> &Arc<KeyType> {
        &self.key_type
    }

    /// Index every key component as its own field.
    pub fn add_fields(&self, doc: &mut Document, key: &CompositeKey) -> Result<()> {
        self.key_type.validate_key(key)?;
        for ((component, mapper), value) in self
            .key_type
            .components()
            .iter()
            .zip(&self.mappers)
            .zip(key.values())
        {
            doc.insert(component.name.clone(), mapper.base(&component.name, value)?);
        }
        Ok(())
    }

    /// Build the range query. Boundaries must already be validated.
    pub fn query(
        &self,
        start: Option<&RangeBoundary>,
        stop: Option<&RangeBoundary>,
    ) -> Result<Option<Query>> {
        let mut sides = Vec::with_capacity(2);
        if let Some(q) = start.map(|b| self.side_query(b, Side::Start)).transpose()?.flatten() {
            sides.push(q);
        }
        if let Some(q) = stop.map(|b| self.side_query(b, Side::Stop)).transpose()?.flatten() {
            sides.push(q);
        }
        if sides.is_empty() {
            return Ok(None);
        }
        Ok(Some(Query::and(sides)))
    }

    fn side_query(&self, boundary: &RangeBoundary, side: Side) -> Result<Option<Query>> {
        if boundary.is_empty() {
            return Ok(None);
        }
        let depth = boundary.len();
        let values = boundary.values();
        let mut clauses = Vec::with_capacity(depth);
        for i in 0..depth {
            let mut must = Vec::with_capacity(i + 1);
            for j in 0..i {
                let name = &self.key_type.components()[j].name;
                must.push(Query::term(name.clone(), self.mappers[j].base(name, &values[j])?));
            }

            let component = &self.key_type.components()[i];
            let value = self.mappers[i].base(&component.name, &values[i])?;
            let inclusive = i == depth - 1 && boundary.is_inclusive();
            let lower = matches!(
                (side, component.is_descending()),
                (Side::Start, false) | (Side::Stop, true)
            );
            must.push(if lower {
                Query::lower_bound(component.name.clone(), value, inclusive)
            } else {
                Query::upper_bound(component.name.clone(), value, inclusive)
            });
            clauses.push(Query::and(must));
        }
        Ok(Some(Query::or(clauses)))
    }

    /// Native per-component sorts, in component order.
    pub fn sort_fields(&self) -> Vec<SortField> {
        self.key_type
            .components()
            .iter()
            .zip(&self.mappers)
            .map(|(c, m)| m.native_sort(&c.name, c.is_descending()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{KeyComponent, NativeType, Value};

    fn int_key_type(desc: &[bool]) -> Arc<KeyType> {
        let components = desc
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let c = KeyComponent::new(format!("c{i}"), NativeType::Int);
                if *d {
                    c.descending()
                } else {
                    c
                }
            })
            .collect();
        Arc::new(KeyType::new(components))
    }

    fn schema_for(kt: &KeyType) -> IndexSchema {
        kt.components()
            .iter()
            .fold(IndexSchema::new(), |s, c| s.with_mapper(c.name.clone(), Mapper::Integer))
    }

    fn doc(strategy: &ColumnsStrategy, values: &[i32]) -> Document {
        let key = CompositeKey::new(values.iter().map(|v| Value::Int(*v)).collect());
        let mut d = Document::new();
        strategy.add_fields(&mut d, &key).unwrap();
        d
    }

    fn ints(values: &[i32]) -> Vec<Value> {
        values.iter().map(|v| Value::Int(*v)).collect()
    }

    #[test]
    fn test_unsupported_without_every_mapping() {
        let kt = int_key_type(&[false, false]);
        let partial = IndexSchema::new().with_mapper("c0", Mapper::Integer);
        assert!(ColumnsStrategy::new(kt.clone(), &partial).is_none());

        let non_clustering = IndexSchema::new()
            .with_mapper("c0", Mapper::Integer)
            .with_mapper("c1", Mapper::String);
        assert!(ColumnsStrategy::new(kt.clone(), &non_clustering).is_none());

        assert!(ColumnsStrategy::new(kt.clone(), &schema_for(&kt)).is_some());
    }

    #[test]
    fn test_query_shape() {
        let kt = int_key_type(&[false, false, false]);
        let s = ColumnsStrategy::new(kt.clone(), &schema_for(&kt)).unwrap();
        let start = RangeBoundary::inclusive(ints(&[5, 2]));
        let q = s.query(Some(&start), None).unwrap().unwrap();
        assert_eq!(q.to_string(), "(c0:{5 TO *} OR (c0:5 AND c1:[2 TO *}))");
    }

    #[test]
    fn test_no_boundaries_means_no_query() {
        let kt = int_key_type(&[false]);
        let s = ColumnsStrategy::new(kt.clone(), &schema_for(&kt)).unwrap();
        assert!(s.query(None, None).unwrap().is_none());
        let empty = RangeBoundary::unbounded();
        assert!(s.query(Some(&empty), Some(&empty)).unwrap().is_none());
    }

    #[test]
    fn test_start_inclusive_stop_exclusive() {
        let kt = int_key_type(&[false, false, false]);
        let s = ColumnsStrategy::new(kt.clone(), &schema_for(&kt)).unwrap();
        let start = RangeBoundary::inclusive(ints(&[5, 2]));
        let stop = RangeBoundary::exclusive(ints(&[5, 9]));
        let q = s.query(Some(&start), Some(&stop)).unwrap().unwrap();

        for accepted in [[5, 2, 0], [5, 2, 99], [5, 8, 0]] {
            assert!(q.matches(&doc(&s, &accepted)), "{accepted:?} should match");
        }
        for rejected in [[5, 1, 999], [5, 9, 0], [4, 9, 0]] {
            assert!(!q.matches(&doc(&s, &rejected)), "{rejected:?} should not match");
        }
    }

    #[test]
    fn test_full_key_boundaries() {
        let kt = int_key_type(&[false, false]);
        let s = ColumnsStrategy::new(kt.clone(), &schema_for(&kt)).unwrap();
        let start = RangeBoundary::exclusive(ints(&[1, 1]));
        let stop = RangeBoundary::inclusive(ints(&[2, 0]));
        let q = s.query(Some(&start), Some(&stop)).unwrap().unwrap();

        assert!(!q.matches(&doc(&s, &[1, 1])));
        assert!(q.matches(&doc(&s, &[1, 2])));
        assert!(q.matches(&doc(&s, &[2, -5])));
        assert!(q.matches(&doc(&s, &[2, 0])));
        assert!(!q.matches(&doc(&s, &[2, 1])));
    }

    #[test]
    fn test_descending_component_flips_range() {
        // c1 is descending: within c0 = 1, larger c1 sorts first
        let kt = int_key_type(&[false, true]);
        let s = ColumnsStrategy::new(kt.clone(), &schema_for(&kt)).unwrap();
        let start = RangeBoundary::inclusive(ints(&[1, 10]));
        let q = s.query(Some(&start), None).unwrap().unwrap();

        assert!(q.matches(&doc(&s, &[1, 10])));
        assert!(q.matches(&doc(&s, &[1, 3])));
        assert!(!q.matches(&doc(&s, &[1, 11])));
        assert!(q.matches(&doc(&s, &[2, 100])));
    }

    #[test]
    fn test_sort_fields_follow_components() {
        let kt = int_key_type(&[false, true]);
        let s = ColumnsStrategy::new(kt.clone(), &schema_for(&kt)).unwrap();
        let sorts = s.sort_fields();
        assert_eq!(sorts.len(), 2);
        assert_eq!(sorts[0].name(), "c0");
        assert!(!sorts[0].is_reverse());
        assert!(sorts[1].is_reverse());
    }
}
