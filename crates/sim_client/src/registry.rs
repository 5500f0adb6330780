//! Sensor type registry
//!
//! Maps sensor type classes ("Camera" in "Camera.default") to what the bridge
//! can do with them, and builds merged `SensorConfig`s from catalog entries.

use std::collections::HashMap;

use contracts::{ContractError, SensorConfig, SensorDefinitionCatalog, SensorSpec};
use serde_json::Map;
use tracing::debug;

/// Capabilities of one sensor class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFactory {
    /// Has a publisher when attached as an automation sensor
    pub publishes: bool,
    /// Computed from another attached sensor ("base sensor")
    pub derived: bool,
}

impl SensorFactory {
    pub const fn primary(publishes: bool) -> Self {
        Self {
            publishes,
            derived: false,
        }
    }

    pub const fn derived(publishes: bool) -> Self {
        Self {
            publishes,
            derived: true,
        }
    }
}

/// Class name -> capabilities
#[derive(Debug, Clone, Default)]
pub struct SensorRegistry {
    factories: HashMap<String, SensorFactory>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every sensor class the engine ships
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for class in ["Damage", "Timer", "GForces", "Electrics", "State"] {
            registry.register(class, SensorFactory::primary(false));
        }
        for class in [
            "Camera",
            "Lidar",
            "Ultrasonic",
            "AdvancedIMU",
            "GPS",
            "Radar",
            "PowertrainSensor",
            "MeshSensor",
            "RoadsSensor",
        ] {
            registry.register(class, SensorFactory::primary(true));
        }
        for class in ["RandomImageNoise", "RandomLIDARNoise"] {
            registry.register(class, SensorFactory::derived(true));
        }
        registry
    }

    pub fn register(&mut self, class: impl Into<String>, factory: SensorFactory) {
        self.factories.insert(class.into(), factory);
    }

    /// Class part of a type name: "Camera.default" -> "Camera"
    pub fn class_of(sensor_type: &str) -> &str {
        sensor_type
            .split_once('.')
            .map_or(sensor_type, |(class, _)| class)
    }

    /// Look up the capabilities of a sensor type
    pub fn factory(&self, sensor_type: &str) -> Result<SensorFactory, ContractError> {
        self.factories
            .get(Self::class_of(sensor_type))
            .copied()
            .ok_or_else(|| {
                ContractError::unknown_sensor_type(sensor_type, "no factory registered for class")
            })
    }

    /// Every catalog entry must name a registered class
    pub fn validate_catalog(&self, catalog: &SensorDefinitionCatalog) -> Result<(), ContractError> {
        for name in catalog.names() {
            self.factory(name)?;
        }
        debug!(definitions = catalog.len(), "Catalog validated against registry");
        Ok(())
    }

    /// Check one spec against the registry and the catalog
    ///
    /// A dotted type ("Camera.default") must have a catalog entry; derived
    /// classes require a base sensor and primary ones must not have one.
    pub fn check_spec(
        &self,
        catalog: &SensorDefinitionCatalog,
        spec: &SensorSpec,
    ) -> Result<SensorFactory, ContractError> {
        let factory = self.factory(&spec.sensor_type)?;

        if spec.sensor_type.contains('.') && !catalog.contains(&spec.sensor_type) {
            return Err(ContractError::unknown_sensor_type(
                &spec.sensor_type,
                "no definition in sensor catalog",
            ));
        }

        match (factory.derived, spec.is_derived()) {
            (true, false) => Err(ContractError::config_validation(
                format!("sensor[{}]", spec.name),
                format!("'{}' requires a base sensor", spec.sensor_type),
            )),
            (false, true) => Err(ContractError::config_validation(
                format!("sensor[{}]", spec.name),
                format!("'{}' cannot take a base sensor", spec.sensor_type),
            )),
            _ => Ok(factory),
        }
    }

    /// Merge the catalog base configuration with the spec's dynamic properties
    ///
    /// Spec properties win over catalog values.
    pub fn configure(
        &self,
        catalog: &SensorDefinitionCatalog,
        spec: &SensorSpec,
    ) -> Result<SensorConfig, ContractError> {
        self.check_spec(catalog, spec)?;

        let mut properties = catalog.get(&spec.sensor_type).cloned().unwrap_or_else(Map::new);
        for (key, value) in &spec.properties {
            properties.insert(key.clone(), value.clone());
        }

        Ok(SensorConfig {
            name: spec.name.clone(),
            sensor_type: spec.sensor_type.clone(),
            class: Self::class_of(&spec.sensor_type).to_string(),
            properties,
            base_handle: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    fn catalog() -> SensorDefinitionCatalog {
        let layer: BTreeMap<String, Map<String, Value>> = serde_json::from_value(json!({
            "Camera.default": { "resolution": [640, 480], "fov": 70 },
            "Lidar.default": { "vertical_resolution": 32 }
        }))
        .unwrap();
        SensorDefinitionCatalog::from_layers([layer])
    }

    fn spec(value: Value) -> SensorSpec {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn class_is_prefix_before_dot() {
        assert_eq!(SensorRegistry::class_of("Camera.default"), "Camera");
        assert_eq!(SensorRegistry::class_of("Damage"), "Damage");
    }

    #[test]
    fn spec_properties_override_catalog() {
        let registry = SensorRegistry::with_defaults();
        let config = registry
            .configure(
                &catalog(),
                &spec(json!({ "name": "cam", "type": "Camera.default", "fov": 90, "position": [0, 0, 1] })),
            )
            .unwrap();

        assert_eq!(config.class, "Camera");
        assert_eq!(config.properties["fov"], json!(90));
        assert_eq!(config.properties["resolution"], json!([640, 480]));
        assert_eq!(config.properties["position"], json!([0, 0, 1]));
    }

    #[test]
    fn unknown_class_is_config_error() {
        let registry = SensorRegistry::with_defaults();
        let err = registry
            .configure(&catalog(), &spec(json!({ "name": "x", "type": "Sonar.default" })))
            .unwrap_err();
        assert!(matches!(err, ContractError::UnknownSensorType { .. }));
    }

    #[test]
    fn dotted_type_needs_catalog_entry() {
        let registry = SensorRegistry::with_defaults();
        let err = registry
            .check_spec(&catalog(), &spec(json!({ "name": "cam", "type": "Camera.wide" })))
            .unwrap_err();
        assert!(err.to_string().contains("no definition"), "got: {err}");
    }

    #[test]
    fn derived_class_requires_base() {
        let registry = SensorRegistry::with_defaults();
        let err = registry
            .check_spec(&catalog(), &spec(json!({ "name": "n", "type": "RandomImageNoise" })))
            .unwrap_err();
        assert!(err.is_config());

        let ok = registry
            .check_spec(
                &catalog(),
                &spec(json!({ "name": "n", "type": "RandomImageNoise", "base sensor": "cam" })),
            )
            .unwrap();
        assert!(ok.derived);
    }

    #[test]
    fn catalog_with_unregistered_class_fails_validation() {
        let layer: BTreeMap<String, Map<String, Value>> =
            serde_json::from_value(json!({ "Sonar.default": {} })).unwrap();
        let registry = SensorRegistry::with_defaults();
        assert!(registry
            .validate_catalog(&SensorDefinitionCatalog::from_layers([layer]))
            .is_err());
        assert!(registry.validate_catalog(&catalog()).is_ok());
    }
}
