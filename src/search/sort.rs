//! Result ordering: native per-field sorts and the opaque key sort.

use std::cmp::Ordering;

use crate::error::IndexError;
use crate::key::{KeyComparator, Value};
use crate::search::document::Document;

#[derive(Debug, Clone)]
pub enum SortField {
    /// Native sort on one indexed field. Missing or null values sort first.
    Field { field: String, reverse: bool },
    /// Custom sort on an encoded composite key field.
    ///
    /// Rows whose key fails to decode are ordered after every valid row.
    /// Comparison stays silent; `Sort::corrupt_key` lets the caller report
    /// each such row once.
    Key {
        field: String,
        comparator: KeyComparator,
        reverse: bool,
    },
}

impl SortField {
    pub fn field(name: impl Into<String>, reverse: bool) -> Self {
        SortField::Field {
            field: name.into(),
            reverse,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SortField::Field { field, .. } | SortField::Key { field, .. } => field,
        }
    }

    pub fn is_reverse(&self) -> bool {
        match self {
            SortField::Field { reverse, .. } | SortField::Key { reverse, .. } => *reverse,
        }
    }

    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ord = match self {
            SortField::Field { field, .. } => {
                let a = a.get(field).unwrap_or(&Value::Null);
                let b = b.get(field).unwrap_or(&Value::Null);
                a.compare(b)
            }
            SortField::Key {
                field, comparator, ..
            } => compare_keys(comparator, field, a, b),
        };
        if self.is_reverse() {
            ord.reverse()
        } else {
            ord
        }
    }
}

fn compare_keys(comparator: &KeyComparator, field: &str, a: &Document, b: &Document) -> Ordering {
    let a = a.get(field).and_then(Value::as_bytes);
    let b = b.get(field).and_then(Value::as_bytes);
    match comparator.compare_encoded(a, b) {
        Ok(ord) => ord,
        Err(_) => {
            // Corrupt keys sort last and tie among themselves
            let key_type = comparator.key_type();
            let a_ok = a.map_or(true, |bytes| key_type.decode(bytes).is_ok());
            let b_ok = b.map_or(true, |bytes| key_type.decode(bytes).is_ok());
            match (a_ok, b_ok) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            }
        }
    }
}

/// Ordered list of sort fields, compared left to right.
#[derive(Debug, Clone, Default)]
pub struct Sort {
    fields: Vec<SortField>,
}

impl Sort {
    pub fn new(fields: Vec<SortField>) -> Self {
        Self { fields }
    }

    pub fn then(mut self, field: SortField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First key-sort field of `doc` whose encoded key fails to decode,
    /// with the decode error.
    pub fn corrupt_key(&self, doc: &Document) -> Option<(&str, IndexError)> {
        self.fields.iter().find_map(|sort_field| match sort_field {
            SortField::Key {
                field, comparator, ..
            } => {
                let bytes = doc.get(field).and_then(Value::as_bytes)?;
                comparator
                    .key_type()
                    .decode(bytes)
                    .err()
                    .map(|e| (field.as_str(), e))
            }
            SortField::Field { .. } => None,
        })
    }

    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for field in &self.fields {
            let ord = field.compare(a, b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{CompositeKey, KeyComponent, KeyType, NativeType};
    use std::sync::Arc;

    fn key_doc(kt: &KeyType, a: i32) -> Document {
        let bytes = kt.encode(&CompositeKey::new(vec![Value::Int(a)])).unwrap();
        Document::new().with_field("_key", Value::Blob(bytes))
    }

    #[test]
    fn test_field_sort_with_reverse() {
        let a = Document::new().with_field("n", Value::Int(1));
        let b = Document::new().with_field("n", Value::Int(2));
        let missing = Document::new();

        let asc = SortField::field("n", false);
        assert_eq!(asc.compare(&a, &b), Ordering::Less);
        assert_eq!(asc.compare(&missing, &a), Ordering::Less);

        let desc = SortField::field("n", true);
        assert_eq!(desc.compare(&a, &b), Ordering::Greater);
    }

    #[test]
    fn test_key_sort_places_corrupt_rows_last() {
        let kt = Arc::new(KeyType::new(vec![KeyComponent::new("a", NativeType::Int)]));
        let sort = SortField::Key {
            field: "_key".to_string(),
            comparator: KeyComparator::new(kt.clone()),
            reverse: false,
        };
        let corrupt = Document::new().with_field("_key", Value::Blob(vec![0xee]));
        let mut docs = vec![corrupt.clone(), key_doc(&kt, 3), key_doc(&kt, -1)];
        docs.sort_by(|a, b| sort.compare(a, b));

        assert_eq!(docs[0], key_doc(&kt, -1));
        assert_eq!(docs[1], key_doc(&kt, 3));
        assert_eq!(docs[2], corrupt);
    }

    #[test]
    fn test_corrupt_key_lookup() {
        let kt = Arc::new(KeyType::new(vec![KeyComponent::new("a", NativeType::Int)]));
        let sort = Sort::new(vec![SortField::field("n", false)]).then(SortField::Key {
            field: "_key".to_string(),
            comparator: KeyComparator::new(kt.clone()),
            reverse: false,
        });
        let corrupt = Document::new().with_field("_key", Value::Blob(vec![0xee]));

        let (field, err) = sort.corrupt_key(&corrupt).unwrap();
        assert_eq!(field, "_key");
        assert_eq!(err.code(), "DECODE_ERROR");
        assert!(sort.corrupt_key(&key_doc(&kt, 3)).is_none());
        assert!(sort.corrupt_key(&Document::new()).is_none());
    }

    #[test]
    fn test_multi_field_sort() {
        let sort = Sort::new(vec![SortField::field("a", false)]).then(SortField::field("b", true));
        let x = Document::new().with_field("a", Value::Int(1)).with_field("b", Value::Int(1));
        let y = Document::new().with_field("a", Value::Int(1)).with_field("b", Value::Int(2));
        assert_eq!(sort.compare(&x, &y), Ordering::Greater);
    }
}
