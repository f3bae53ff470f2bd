//! Index configuration.
//!
//! Written once when an index is created to `index_config.json` in the
//! index directory and read back on every open.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::resource::{ResourceManager, TuningProfile};
use crate::schema::MapperSpec;

const CONFIG_FILE: &str = "index_config.json";

// ── DispatcherConfig ───────────────────────────────────────────────

/// Sizing of the maintenance dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Number of single-worker queues.
    pub worker_count: usize,
    /// Backlog bound per queue; `submit_async` blocks when it is reached.
    pub queue_capacity: usize,
}

impl DispatcherConfig {
    /// Size the dispatcher from the host's detected resources.
    pub fn auto_tune() -> Self {
        Self::from_profile(&ResourceManager::auto_tune())
    }

    pub fn from_profile(profile: &TuningProfile) -> Self {
        Self {
            worker_count: profile.worker_count,
            queue_capacity: profile.queue_capacity,
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from_profile(&TuningProfile::default())
    }
}

// ── IndexConfig ────────────────────────────────────────────────────

/// Persistent index configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexConfig {
    /// Number of in-memory shards searched in parallel.
    pub shard_count: usize,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// Column name to mapper spec. Key components mapped here with a
    /// clustering-capable mapper enable the columns strategy.
    #[serde(default)]
    pub columns: BTreeMap<String, MapperSpec>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::from_profile(&TuningProfile::default())
    }
}

impl IndexConfig {
    /// Configuration sized for this host, with no column mappings.
    pub fn auto_tune() -> Self {
        Self::from_profile(&ResourceManager::auto_tune())
    }

    pub fn from_profile(profile: &TuningProfile) -> Self {
        Self {
            shard_count: profile.shard_count,
            dispatcher: DispatcherConfig::from_profile(profile),
            columns: BTreeMap::new(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>, spec: MapperSpec) -> Self {
        self.columns.insert(column.into(), spec);
        self
    }

    /// Reject sizes that cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            return Err(IndexError::Schema("shard_count must be > 0".to_string()));
        }
        if self.dispatcher.worker_count == 0 {
            return Err(IndexError::Schema("dispatcher.worker_count must be > 0".to_string()));
        }
        if self.dispatcher.queue_capacity == 0 {
            return Err(IndexError::Schema("dispatcher.queue_capacity must be > 0".to_string()));
        }
        Ok(())
    }

    /// Read config from the index directory. Returns None if the file doesn't exist.
    pub fn read_from(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(Some(config))
    }

    /// Write config to the index directory.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        let path = dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_roundtrip_through_file() {
        let dir = TempDir::new().unwrap();
        let config = IndexConfig::default()
            .with_column("day", MapperSpec::String)
            .with_column("seq", MapperSpec::BigInteger)
            .with_column("body", MapperSpec::Text { analyzer: "english".to_string() });
        config.write_to(dir.path()).unwrap();

        let loaded = IndexConfig::read_from(dir.path()).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(IndexConfig::read_from(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "shard_count": 2, "columns": { "a": { "type": "integer" } } }"#,
        )
        .unwrap();

        let loaded = IndexConfig::read_from(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.shard_count, 2);
        assert_eq!(loaded.dispatcher, DispatcherConfig::default());
        assert_eq!(loaded.columns["a"], MapperSpec::Integer);
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), r#"{ "shard_count": 0 }"#).unwrap();
        let err = IndexConfig::read_from(dir.path()).unwrap_err();
        assert_eq!(err.code(), "SCHEMA_ERROR");

        let mut config = IndexConfig::default();
        config.dispatcher.queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_json_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{ not json").unwrap();
        assert!(matches!(IndexConfig::read_from(dir.path()), Err(IndexError::Json(_))));
    }

    #[test]
    fn test_auto_tune_is_runnable() {
        let config = IndexConfig::auto_tune();
        config.validate().unwrap();
    }
}
