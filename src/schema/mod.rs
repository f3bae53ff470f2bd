//! Field-mapping contract between the row store's schema and the index.
//!
//! - `mapper` -- built-in column mappers and the plugin extension point
//! - `registry` -- serializable mapper specs and their resolution
//! - `table` -- the row store's table shape (clustering key + columns)
//!
//! `IndexSchema` is fixed when an index opens and shared read-only after.

pub mod mapper;
pub mod registry;
pub mod table;

pub use mapper::{Mapper, MapperPlugin};
pub use registry::{MapperRegistry, MapperSpec};
pub use table::TableSchema;

use std::collections::BTreeMap;

use crate::error::{IndexError, Result};
use crate::key::Value;

/// Column name to mapper association for one index.
#[derive(Debug, Clone, Default)]
pub struct IndexSchema {
    mappers: BTreeMap<String, Mapper>,
}

impl IndexSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapper(mut self, column: impl Into<String>, mapper: Mapper) -> Self {
        self.mappers.insert(column.into(), mapper);
        self
    }

    /// Resolve every spec through `registry`.
    ///
    /// Fails on the first unknown plugin or on a mapper that cannot index
    /// its column's native type.
    pub fn from_specs(
        specs: &BTreeMap<String, MapperSpec>,
        table: &TableSchema,
        registry: &MapperRegistry,
    ) -> Result<Self> {
        let mut mappers = BTreeMap::new();
        for (column, spec) in specs {
            let mapper = registry.resolve(spec)?;
            let ty = table.column_type(column).ok_or_else(|| {
                IndexError::Schema(format!("mapped column '{}' is not in table '{}'", column, table.name()))
            })?;
            if !mapper.supports(ty) {
                return Err(IndexError::Schema(format!(
                    "{} mapper cannot index column '{}' of type {}",
                    mapper.name(),
                    column,
                    ty
                )));
            }
            mappers.insert(column.clone(), mapper);
        }
        Ok(Self { mappers })
    }

    /// Mapping for `column`, if one was declared.
    pub fn mapping(&self, column: &str) -> Option<&Mapper> {
        self.mappers.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.mappers.keys().map(String::as_str)
    }

    /// Indexed base value of `value` in `column`.
    pub fn base(&self, column: &str, value: &Value) -> Result<Value> {
        let mapper = self
            .mapping(column)
            .ok_or_else(|| IndexError::ColumnNotIndexed(column.to_string()))?;
        mapper.base(column, value)
    }
}
