//! Declarative mapper specs and the registry that resolves them.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::schema::mapper::{Mapper, MapperPlugin};

fn default_analyzer() -> String {
    "standard".to_string()
}

/// Serializable mapper description, as found in index configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapperSpec {
    Boolean,
    Integer,
    BigInteger,
    Float,
    Double,
    String,
    Text {
        #[serde(default = "default_analyzer")]
        analyzer: String,
    },
    Blob,
    Date,
    /// A mapper supplied by a registered plugin.
    Plugin { name: String },
}

/// Resolves `MapperSpec`s into mappers.
///
/// Owned by whoever opens the index; plugins must be registered before the
/// index is opened.
#[derive(Debug, Default)]
pub struct MapperRegistry {
    plugins: HashMap<String, Arc<dyn MapperPlugin>>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin under its own name, replacing any previous one.
    pub fn register(&mut self, plugin: Arc<dyn MapperPlugin>) {
        let name = plugin.name().to_string();
        if self.plugins.insert(name.clone(), plugin).is_some() {
            tracing::warn!(plugin = %name, "mapper plugin replaced");
        }
    }

    pub fn resolve(&self, spec: &MapperSpec) -> Result<Mapper> {
        Ok(match spec {
            MapperSpec::Boolean => Mapper::Boolean,
            MapperSpec::Integer => Mapper::Integer,
            MapperSpec::BigInteger => Mapper::BigInteger,
            MapperSpec::Float => Mapper::Float,
            MapperSpec::Double => Mapper::Double,
            MapperSpec::String => Mapper::String,
            MapperSpec::Text { analyzer } => Mapper::Text {
                analyzer: analyzer.clone(),
            },
            MapperSpec::Blob => Mapper::Blob,
            MapperSpec::Date => Mapper::Date,
            MapperSpec::Plugin { name } => {
                let plugin = self
                    .plugins
                    .get(name)
                    .ok_or_else(|| IndexError::UnknownPlugin(name.clone()))?;
                Mapper::Plugin(Arc::clone(plugin))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{NativeType, Value};

    #[derive(Debug)]
    struct Reversed;

    impl MapperPlugin for Reversed {
        fn name(&self) -> &str {
            "reversed_text"
        }
        fn supports(&self, ty: NativeType) -> bool {
            ty == NativeType::Text
        }
        fn supports_clustering(&self, _ty: NativeType) -> bool {
            false
        }
        fn base(&self, _field: &str, value: &Value) -> Result<Value> {
            match value {
                Value::Text(s) => Ok(Value::Text(s.chars().rev().collect())),
                other => Ok(other.clone()),
            }
        }
    }

    #[test]
    fn test_spec_json_shape() {
        let spec: MapperSpec = serde_json::from_str(r#"{"type":"big_integer"}"#).unwrap();
        assert_eq!(spec, MapperSpec::BigInteger);

        let text: MapperSpec = serde_json::from_str(r#"{"type":"text"}"#).unwrap();
        assert_eq!(
            text,
            MapperSpec::Text {
                analyzer: "standard".to_string()
            }
        );

        let plugin = MapperSpec::Plugin {
            name: "geo".to_string(),
        };
        let json = serde_json::to_string(&plugin).unwrap();
        assert_eq!(json, r#"{"type":"plugin","name":"geo"}"#);
    }

    #[test]
    fn test_resolve_builtin_and_plugin() {
        let mut registry = MapperRegistry::new();
        registry.register(Arc::new(Reversed));

        let mapper = registry.resolve(&MapperSpec::Integer).unwrap();
        assert_eq!(mapper.name(), "integer");

        let plugin = registry
            .resolve(&MapperSpec::Plugin {
                name: "reversed_text".to_string(),
            })
            .unwrap();
        assert_eq!(plugin.name(), "reversed_text");
        assert_eq!(plugin.base("f", &Value::from("abc")).unwrap(), Value::from("cba"));
        assert!(!plugin.supports_clustering(NativeType::Text));
    }

    #[test]
    fn test_unknown_plugin_rejected() {
        let registry = MapperRegistry::new();
        let err = registry
            .resolve(&MapperSpec::Plugin {
                name: "missing".to_string(),
            })
            .unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_PLUGIN");
    }
}
