//! Engine-facing value types
//!
//! Shapes exchanged with the simulator client: game state, vehicle listings,
//! road network queries and sensor data.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Quaternion, Vector3};

/// Engine handle of an attached automation sensor
pub type SensorHandle = u32;

/// Game state reported by the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// "scenario" when a scenario is loaded, "menu" etc. otherwise
    pub state: String,

    /// Loaded level name
    #[serde(default)]
    pub level: Option<String>,

    /// Nested scenario state ("running", "pre-running", ...)
    #[serde(default)]
    pub scenario_state: Option<String>,
}

impl GameState {
    pub const SCENARIO: &'static str = "scenario";
    pub const RUNNING: &'static str = "running";

    pub fn scenario_loaded(&self) -> bool {
        self.state == Self::SCENARIO
    }

    pub fn scenario_running(&self) -> bool {
        self.scenario_loaded() && self.scenario_state.as_deref() == Some(Self::RUNNING)
    }
}

/// Entry of the engine's current-vehicles mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentVehicle {
    pub name: String,
    pub model: String,
}

/// Road listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadInfo {
    pub id: String,

    /// "-1" marks non-drivable decorations
    pub drivability: String,
}

impl RoadInfo {
    pub const NOT_DRIVABLE: &'static str = "-1";

    pub fn is_drivable(&self) -> bool {
        self.drivability != Self::NOT_DRIVABLE
    }
}

/// One cross-section of a road
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoadEdge {
    pub left: [f64; 3],
    pub middle: [f64; 3],
    pub right: [f64; 3],
}

/// Fully resolved sensor configuration handed to the engine
///
/// Catalog base configuration overlaid with the spec's dynamic properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Attachment name
    pub name: String,

    /// Full type name, e.g. "Camera.default"
    pub sensor_type: String,

    /// Type class, e.g. "Camera"
    pub class: String,

    /// Merged properties
    pub properties: Map<String, Value>,

    /// Engine handle of the base sensor (derived automation sensors)
    #[serde(default)]
    pub base_handle: Option<SensorHandle>,
}

/// One sample polled from an automation sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Engine frame counter of the sample
    pub frame: u64,

    /// Simulation time in seconds
    pub sim_time: f64,

    pub data: SensorData,
}

/// Sensor payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorData {
    Image {
        width: u32,
        height: u32,
        data: Bytes,
    },
    PointCloud {
        num_points: u32,
        data: Bytes,
    },
    Imu {
        acceleration: Vector3,
        angular_velocity: Vector3,
    },
    Gps {
        latitude: f64,
        longitude: f64,
        altitude: f64,
    },
    /// Free-form values (electrics, damage, timer, ...)
    Values { values: Map<String, Value> },
}

/// Vehicle pose and velocity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub position: Vector3,
    pub rotation: Quaternion,
    pub velocity: Vector3,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_requires_loaded_scenario() {
        let menu = GameState {
            state: "menu".into(),
            level: None,
            scenario_state: Some("running".into()),
        };
        assert!(!menu.scenario_loaded());
        assert!(!menu.scenario_running());

        let loaded = GameState {
            state: "scenario".into(),
            level: Some("gridmap".into()),
            scenario_state: Some("running".into()),
        };
        assert!(loaded.scenario_running());
    }

    #[test]
    fn drivability_minus_one_is_not_drivable() {
        let road = RoadInfo {
            id: "r1".into(),
            drivability: "-1".into(),
        };
        assert!(!road.is_drivable());
    }
}
