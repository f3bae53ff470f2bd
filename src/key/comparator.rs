//! Native-order comparator for composite keys.
//!
//! Compares component by component, left to right, stopping at the first
//! difference. Descending components reverse their native ordering. Encoded
//! keys are decoded first, so a corrupt key surfaces as a decode error
//! instead of a silently wrong order.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::Result;
use crate::key::composite::{CompositeKey, KeyType, RangeBoundary};
use crate::key::value::Value;

/// Comparator bound to one key type. Cheap to clone.
#[derive(Debug, Clone)]
pub struct KeyComparator {
    key_type: Arc<KeyType>,
}

impl KeyComparator {
    pub fn new(key_type: Arc<KeyType>) -> Self {
        Self { key_type }
    }

    pub fn key_type(&self) -> &Arc<KeyType> {
        &self.key_type
    }

    /// Compare one component value at position `i`, honouring its order.
    pub fn compare_component(&self, i: usize, a: &Value, b: &Value) -> Ordering {
        let ord = a.compare(b);
        match self.key_type.component(i) {
            Some(c) if c.is_descending() => ord.reverse(),
            _ => ord,
        }
    }

    /// Lexicographic comparison of two structured keys.
    ///
    /// When one key is a prefix of the other, the shorter one sorts first.
    pub fn compare(&self, a: &CompositeKey, b: &CompositeKey) -> Ordering {
        for (i, (x, y)) in a.values().iter().zip(b.values()).enumerate() {
            let ord = self.compare_component(i, x, y);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.len().cmp(&b.len())
    }

    /// Compare two encoded keys. An absent key sorts before any present key.
    pub fn compare_encoded(&self, a: Option<&[u8]>, b: Option<&[u8]>) -> Result<Ordering> {
        match (a, b) {
            (None, None) => Ok(Ordering::Equal),
            (None, Some(_)) => Ok(Ordering::Less),
            (Some(_), None) => Ok(Ordering::Greater),
            (Some(a), Some(b)) => {
                let a = self.key_type.decode(a)?;
                let b = self.key_type.decode(b)?;
                Ok(self.compare(&a, &b))
            }
        }
    }

    /// Compare a key against a boundary prefix, looking only at the
    /// components the prefix carries.
    pub fn compare_prefix(&self, key: &CompositeKey, prefix: &[Value]) -> Ordering {
        for (i, p) in prefix.iter().enumerate() {
            let Some(v) = key.get(i) else {
                return Ordering::Less;
            };
            let ord = self.compare_component(i, v, p);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// True when `key` lies at or after `start` (prefix semantics).
    pub fn after_start(&self, key: &CompositeKey, start: &RangeBoundary) -> bool {
        if start.is_empty() {
            return true;
        }
        match self.compare_prefix(key, start.values()) {
            Ordering::Greater => true,
            Ordering::Equal => start.is_inclusive(),
            Ordering::Less => false,
        }
    }

    /// True when `key` lies at or before `stop` (prefix semantics).
    pub fn before_stop(&self, key: &CompositeKey, stop: &RangeBoundary) -> bool {
        if stop.is_empty() {
            return true;
        }
        match self.compare_prefix(key, stop.values()) {
            Ordering::Less => true,
            Ordering::Equal => stop.is_inclusive(),
            Ordering::Greater => false,
        }
    }

    pub fn in_range(
        &self,
        key: &CompositeKey,
        start: Option<&RangeBoundary>,
        stop: Option<&RangeBoundary>,
    ) -> bool {
        start.map_or(true, |s| self.after_start(key, s))
            && stop.map_or(true, |s| self.before_stop(key, s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::composite::KeyComponent;
    use crate::key::value::NativeType;

    fn comparator(desc_second: bool) -> KeyComparator {
        let second = KeyComponent::new("b", NativeType::Text);
        let second = if desc_second { second.descending() } else { second };
        KeyComparator::new(Arc::new(KeyType::new(vec![
            KeyComponent::new("a", NativeType::BigInt),
            second,
        ])))
    }

    fn key(a: i64, b: &str) -> CompositeKey {
        CompositeKey::new(vec![Value::BigInt(a), Value::from(b)])
    }

    #[test]
    fn test_lexicographic_short_circuit() {
        let cmp = comparator(false);
        assert_eq!(cmp.compare(&key(1, "z"), &key(2, "a")), Ordering::Less);
        assert_eq!(cmp.compare(&key(2, "a"), &key(2, "b")), Ordering::Less);
        assert_eq!(cmp.compare(&key(2, "b"), &key(2, "b")), Ordering::Equal);
    }

    #[test]
    fn test_descending_component_reverses() {
        let cmp = comparator(true);
        assert_eq!(cmp.compare(&key(2, "a"), &key(2, "b")), Ordering::Greater);
        assert_eq!(cmp.compare(&key(1, "a"), &key(2, "b")), Ordering::Less);
    }

    #[test]
    fn test_encoded_null_handling() {
        let cmp = comparator(false);
        let bytes = cmp.key_type().encode(&key(1, "x")).unwrap();
        assert_eq!(cmp.compare_encoded(None, None).unwrap(), Ordering::Equal);
        assert_eq!(cmp.compare_encoded(None, Some(&bytes)).unwrap(), Ordering::Less);
        assert_eq!(cmp.compare_encoded(Some(&bytes), None).unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_encoded_decode_failure_reported() {
        let cmp = comparator(false);
        let good = cmp.key_type().encode(&key(1, "x")).unwrap();
        let err = cmp.compare_encoded(Some(&good), Some(&[0xff, 0x00])).unwrap_err();
        assert_eq!(err.code(), "DECODE_ERROR");
    }

    #[test]
    fn test_null_component_sorts_first() {
        let cmp = comparator(false);
        let with_null = CompositeKey::new(vec![Value::BigInt(1), Value::Null]);
        assert_eq!(cmp.compare(&with_null, &key(1, "")), Ordering::Less);
        assert_eq!(cmp.compare(&key(1, ""), &with_null), Ordering::Greater);
    }

    #[test]
    fn test_prefix_range_semantics() {
        let cmp = comparator(false);
        let start = RangeBoundary::inclusive(vec![Value::BigInt(5)]);
        let stop = RangeBoundary::exclusive(vec![Value::BigInt(7)]);
        assert!(cmp.in_range(&key(5, "a"), Some(&start), Some(&stop)));
        assert!(cmp.in_range(&key(6, "zzz"), Some(&start), Some(&stop)));
        assert!(!cmp.in_range(&key(7, ""), Some(&start), Some(&stop)));
        assert!(!cmp.in_range(&key(4, "zzz"), Some(&start), Some(&stop)));

        let excl_start = RangeBoundary::exclusive(vec![Value::BigInt(5)]);
        assert!(!cmp.in_range(&key(5, "zzz"), Some(&excl_start), None));
        assert!(cmp.in_range(&key(5, "zzz"), None, None));
    }
}
