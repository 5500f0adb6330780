//! SensorDefinitionCatalog - Config Resolver output
//!
//! Name-keyed base configurations for every sensor type the bridge can attach.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Base configuration of one sensor type (geometry, update rate, output channels, ...)
pub type SensorDefinition = Map<String, Value>;

/// Merged sensor catalog
///
/// Built once at startup from zero or more layers; later layers override
/// earlier ones per key. There is no mutation API after construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorDefinitionCatalog {
    definitions: BTreeMap<String, SensorDefinition>,
}

impl SensorDefinitionCatalog {
    /// Merge layers in order; on key collision the later layer wins
    pub fn from_layers<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = BTreeMap<String, SensorDefinition>>,
    {
        let mut definitions = BTreeMap::new();
        for layer in layers {
            definitions.extend(layer);
        }
        Self { definitions }
    }

    /// Look up the base configuration of a sensor type
    pub fn get(&self, sensor_type: &str) -> Option<&SensorDefinition> {
        self.definitions.get(sensor_type)
    }

    pub fn contains(&self, sensor_type: &str) -> bool {
        self.definitions.contains_key(sensor_type)
    }

    /// Sensor type names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
