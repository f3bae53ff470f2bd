//! Rows as handed over by the row store, and search requests over them.

use std::collections::BTreeMap;

use crate::key::{CompositeKey, RangeBoundary, Value};
use crate::search::Document;

/// One row: partition identity, clustering key, regular column values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub partition: String,
    pub key: CompositeKey,
    pub columns: BTreeMap<String, Value>,
}

impl Row {
    pub fn new(partition: impl Into<String>, key: impl Into<CompositeKey>) -> Self {
        Self {
            partition: partition.into(),
            key: key.into(),
            columns: BTreeMap::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.insert(name.into(), value.into());
        self
    }

    pub fn column(&self, name: &str) -> Option<&Value> {
        self.columns.get(name)
    }
}

/// A row together with the document it was indexed as.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub row: Row,
    pub document: Document,
}

/// Range search over the index.
///
/// All constraints are conjunctive. Without `start`/`stop` the whole key
/// space matches; without `partition` every partition does.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub partition: Option<String>,
    pub start: Option<RangeBoundary>,
    pub stop: Option<RangeBoundary>,
    /// Column equality filters; each column must be indexed.
    pub filters: Vec<(String, Value)>,
    pub limit: Option<usize>,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    pub fn start(mut self, boundary: RangeBoundary) -> Self {
        self.start = Some(boundary);
        self
    }

    pub fn stop(mut self, boundary: RangeBoundary) -> Self {
        self.stop = Some(boundary);
        self
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
