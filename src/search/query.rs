//! Boolean query tree of the embedded search engine.
//!
//! Provides the capability set the range translator builds on:
//! equality (`Term`), one- or two-sided ranges (`Range`), conjunction
//! (`And`), disjunction (`Or`), plus the opaque key-range primitive
//! (`KeyRange`) used when the whole clustering key lives in one field.
//!
//! `Query::matches` evaluates a query against a single document.

use std::fmt;
use std::ops::Bound;

use crate::key::{CompositeKey, KeyComparator, RangeBoundary, Value};
use crate::search::document::Document;

/// Key-range primitive over an opaque encoded key field.
///
/// Candidates are decoded and compared with the key comparator in prefix
/// mode. Undecodable keys never match and are reported as data-integrity
/// warnings.
#[derive(Debug, Clone)]
pub struct KeyRangeQuery {
    pub field: String,
    pub comparator: KeyComparator,
    pub start: Option<RangeBoundary>,
    pub stop: Option<RangeBoundary>,
}

impl KeyRangeQuery {
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(bytes) = doc.get(&self.field).and_then(Value::as_bytes) else {
            return false;
        };
        match self.comparator.key_type().decode(bytes) {
            Ok(key) => self.matches_key(&key),
            Err(e) => {
                tracing::warn!(field = %self.field, "skipping row with corrupt clustering key: {}", e);
                false
            }
        }
    }

    pub fn matches_key(&self, key: &CompositeKey) -> bool {
        self.comparator
            .in_range(key, self.start.as_ref(), self.stop.as_ref())
    }
}

#[derive(Debug, Clone)]
pub enum Query {
    MatchAll,
    Term {
        field: String,
        value: Value,
    },
    Range {
        field: String,
        lower: Bound<Value>,
        upper: Bound<Value>,
    },
    KeyRange(KeyRangeQuery),
    And(Vec<Query>),
    Or(Vec<Query>),
}

impl Query {
    pub fn term(field: impl Into<String>, value: Value) -> Self {
        Query::Term {
            field: field.into(),
            value,
        }
    }

    /// `field >= value` (or `>` when not inclusive).
    pub fn lower_bound(field: impl Into<String>, value: Value, inclusive: bool) -> Self {
        let lower = if inclusive {
            Bound::Included(value)
        } else {
            Bound::Excluded(value)
        };
        Query::Range {
            field: field.into(),
            lower,
            upper: Bound::Unbounded,
        }
    }

    /// `field <= value` (or `<` when not inclusive).
    pub fn upper_bound(field: impl Into<String>, value: Value, inclusive: bool) -> Self {
        let upper = if inclusive {
            Bound::Included(value)
        } else {
            Bound::Excluded(value)
        };
        Query::Range {
            field: field.into(),
            lower: Bound::Unbounded,
            upper,
        }
    }

    /// Conjunction. A single clause is returned as is.
    pub fn and(mut clauses: Vec<Query>) -> Self {
        if clauses.len() == 1 {
            return clauses.remove(0);
        }
        Query::And(clauses)
    }

    /// Disjunction. A single clause is returned as is.
    pub fn or(mut clauses: Vec<Query>) -> Self {
        if clauses.len() == 1 {
            return clauses.remove(0);
        }
        Query::Or(clauses)
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Query::MatchAll => true,
            Query::Term { field, value } => doc
                .get(field)
                .map_or(false, |v| !v.is_null() && v.compare(value).is_eq()),
            Query::Range {
                field,
                lower,
                upper,
            } => match doc.get(field) {
                Some(v) if !v.is_null() => above(v, lower) && below(v, upper),
                _ => false,
            },
            Query::KeyRange(q) => q.matches(doc),
            Query::And(clauses) => clauses.iter().all(|q| q.matches(doc)),
            Query::Or(clauses) => clauses.iter().any(|q| q.matches(doc)),
        }
    }
}

fn above(v: &Value, lower: &Bound<Value>) -> bool {
    match lower {
        Bound::Included(b) => v.compare(b).is_ge(),
        Bound::Excluded(b) => v.compare(b).is_gt(),
        Bound::Unbounded => true,
    }
}

fn below(v: &Value, upper: &Bound<Value>) -> bool {
    match upper {
        Bound::Included(b) => v.compare(b).is_le(),
        Bound::Excluded(b) => v.compare(b).is_lt(),
        Bound::Unbounded => true,
    }
}

fn join(f: &mut fmt::Formatter<'_>, clauses: &[Query], op: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, q) in clauses.iter().enumerate() {
        if i > 0 {
            write!(f, " {op} ")?;
        }
        write!(f, "{q}")?;
    }
    f.write_str(")")
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::MatchAll => f.write_str("*:*"),
            Query::Term { field, value } => write!(f, "{field}:{value}"),
            Query::Range {
                field,
                lower,
                upper,
            } => {
                write!(f, "{field}:")?;
                match lower {
                    Bound::Included(v) => write!(f, "[{v}")?,
                    Bound::Excluded(v) => write!(f, "{{{v}")?,
                    Bound::Unbounded => f.write_str("{*")?,
                }
                f.write_str(" TO ")?;
                match upper {
                    Bound::Included(v) => write!(f, "{v}]"),
                    Bound::Excluded(v) => write!(f, "{v}}}"),
                    Bound::Unbounded => f.write_str("*}"),
                }
            }
            Query::KeyRange(q) => {
                write!(f, "{}:keyrange(", q.field)?;
                match &q.start {
                    Some(b) => write!(f, "{b}")?,
                    None => f.write_str("*")?,
                }
                f.write_str(" .. ")?;
                match &q.stop {
                    Some(b) => write!(f, "{b}")?,
                    None => f.write_str("*")?,
                }
                f.write_str(")")
            }
            Query::And(clauses) => join(f, clauses, "AND"),
            Query::Or(clauses) => join(f, clauses, "OR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(age: i64, name: &str) -> Document {
        Document::new()
            .with_field("age", Value::BigInt(age))
            .with_field("name", Value::from(name))
    }

    #[test]
    fn test_term_and_range() {
        let q = Query::and(vec![
            Query::term("name", Value::from("alice")),
            Query::lower_bound("age", Value::BigInt(18), true),
            Query::upper_bound("age", Value::BigInt(30), false),
        ]);
        assert!(q.matches(&doc(18, "alice")));
        assert!(q.matches(&doc(29, "alice")));
        assert!(!q.matches(&doc(30, "alice")));
        assert!(!q.matches(&doc(20, "bob")));
    }

    #[test]
    fn test_missing_and_null_fields_never_match() {
        let q = Query::lower_bound("score", Value::Int(0), true);
        assert!(!q.matches(&doc(1, "x")));
        let with_null = doc(1, "x").with_field("score", Value::Null);
        assert!(!q.matches(&with_null));
        assert!(!Query::term("score", Value::Null).matches(&with_null));
    }

    #[test]
    fn test_or_and_single_clause_collapse() {
        let single = Query::or(vec![Query::term("name", Value::from("a"))]);
        assert!(matches!(single, Query::Term { .. }));

        let q = Query::or(vec![
            Query::term("name", Value::from("a")),
            Query::term("name", Value::from("b")),
        ]);
        assert!(q.matches(&doc(1, "b")));
        assert!(!q.matches(&doc(1, "c")));
    }

    #[test]
    fn test_display() {
        let q = Query::and(vec![
            Query::lower_bound("a", Value::Int(5), false),
            Query::upper_bound("b", Value::Int(9), true),
        ]);
        assert_eq!(q.to_string(), "(a:{5 TO *} AND b:{* TO 9])");
    }
}
