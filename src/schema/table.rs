//! Table shape as seen by the index: clustering key plus regular columns.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::key::{KeyType, NativeType};

#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    key_type: Arc<KeyType>,
    columns: BTreeMap<String, NativeType>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, key_type: Arc<KeyType>) -> Self {
        Self {
            name: name.into(),
            key_type,
            columns: BTreeMap::new(),
        }
    }

    /// Add a regular (non-key) column.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already a clustering key component.
    pub fn with_column(mut self, name: impl Into<String>, ty: NativeType) -> Self {
        let name = name.into();
        assert!(
            self.key_type.position(&name).is_none(),
            "column '{}' is a key component",
            name
        );
        self.columns.insert(name, ty);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_type(&self) -> &Arc<KeyType> {
        &self.key_type
    }

    /// Native type of a key component or regular column.
    pub fn column_type(&self, name: &str) -> Option<NativeType> {
        match self.key_type.position(name) {
            Some(i) => self.key_type.component(i).map(|c| c.native_type),
            None => self.columns.get(name).copied(),
        }
    }

    pub fn regular_columns(&self) -> impl Iterator<Item = (&str, NativeType)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
