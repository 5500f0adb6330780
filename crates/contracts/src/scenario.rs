//! Scenario and vehicle documents
//!
//! JSON shapes read by the lifecycle controller (`start_scenario`) and by the
//! `spawn_vehicle` service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Scenario document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Level / map name
    pub level: String,

    /// Scenario name
    pub name: String,

    /// Vehicles placed when the scenario is built
    #[serde(default)]
    pub vehicles: Vec<VehicleSpec>,

    /// Weather preset applied after start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_presets: Option<String>,

    /// Time of day applied after start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<f64>,

    /// Road network visualization
    #[serde(
        default,
        alias = "network_vizualization",
        skip_serializing_if = "Option::is_none"
    )]
    pub network_visualization: Option<Toggle>,

    /// Initial run mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<RunMode>,
}

impl ScenarioSpec {
    pub fn starts_paused(&self) -> bool {
        self.mode == Some(RunMode::Paused)
    }

    pub fn network_visualization_enabled(&self) -> bool {
        self.network_visualization == Some(Toggle::On)
    }

    pub fn sensor_count(&self) -> usize {
        self.vehicles
            .iter()
            .map(|v| v.sensors_classical.len() + v.sensors_automation.len())
            .sum()
    }
}

/// Initial run mode of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Paused,
    #[serde(other)]
    Running,
}

/// On/off switch; anything other than "on" reads as off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Toggle {
    On,
    #[serde(other)]
    Off,
}

/// Vehicle definition
///
/// Used both inside scenario documents and as a standalone vehicle-config
/// document for `spawn_vehicle` (where the pose comes from the request).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSpec {
    /// Vehicle id, unique within a scenario
    pub name: String,

    /// Engine model name
    pub model: String,

    /// Initial position (x, y, z)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[f64; 3]>,

    /// Initial orientation quaternion (x, y, z, w)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f64; 4]>,

    /// Sensors queried on demand, attached before the scenario starts
    #[serde(default)]
    pub sensors_classical: Vec<SensorSpec>,

    /// Streaming sensors, attached after the scenario starts
    #[serde(default)]
    pub sensors_automation: Vec<SensorSpec>,
}

/// One sensor entry of a vehicle
///
/// A spec carrying `"base sensor"` is derived (a noise sensor computed from
/// another attached sensor); every other spec is primary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    /// Attachment name, unique per vehicle
    pub name: String,

    /// Sensor type, e.g. "Camera.default" or "RandomImageNoise"
    #[serde(rename = "type")]
    pub sensor_type: String,

    /// Name of the base sensor (derived specs only)
    #[serde(
        rename = "base sensor",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub base_sensor: Option<String>,

    /// Dynamic properties overriding the catalog defaults
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl SensorSpec {
    pub fn is_derived(&self) -> bool {
        self.base_sensor.is_some()
    }

    /// Read a numeric array property such as "position" or "rotation"
    ///
    /// Returns None if the key is absent or any element is not a number.
    pub fn number_array(&self, key: &str) -> Option<Vec<f64>> {
        self.properties
            .get(key)?
            .as_array()?
            .iter()
            .map(Value::as_f64)
            .collect()
    }
}
