//! Simulator client abstraction
//!
//! Defines the trait for interacting with the simulator, supporting a remote
//! implementation and mock testing.

use std::collections::BTreeMap;
use std::future::Future;

use contracts::{
    CurrentVehicle, GameState, RoadEdge, RoadInfo, SensorConfig, SensorHandle, SensorReading,
    VehicleState,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Vehicle handle prior to placement
///
/// Classical sensors are attached here, synchronously, before the vehicle is
/// handed to the engine as part of a scenario or a spawn request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleHandle {
    pub vehicle_id: String,
    pub model: String,
    classical: BTreeMap<String, SensorConfig>,
}

impl VehicleHandle {
    pub fn new(vehicle_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            model: model.into(),
            classical: BTreeMap::new(),
        }
    }

    /// Attach a classical sensor, returning the one it replaced
    pub fn attach_classical(
        &mut self,
        name: impl Into<String>,
        config: SensorConfig,
    ) -> Option<SensorConfig> {
        self.classical.insert(name.into(), config)
    }

    pub fn classical_sensor(&self, name: &str) -> Option<&SensorConfig> {
        self.classical.get(name)
    }

    pub fn classical_sensors(&self) -> impl Iterator<Item = (&str, &SensorConfig)> {
        self.classical.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn classical_count(&self) -> usize {
        self.classical.len()
    }
}

/// Vehicle with its initial pose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedVehicle {
    pub vehicle: VehicleHandle,
    pub position: [f64; 3],
    pub rotation: [f64; 4],
}

/// Scenario as handed to `make_scenario`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioBuild {
    pub level: String,
    pub name: String,
    pub vehicles: Vec<PlacedVehicle>,
}

/// Simulator client trait
///
/// Abstracts the engine operations the bridge needs. Every call returns a
/// typed `Result`; callers decide between recovery and propagation.
/// No call carries a timeout.
pub trait SimClient: Send + Sync + 'static {
    /// Open a connection to a running simulator (never launches one)
    fn connect(&self, host: &str, port: u16) -> impl Future<Output = Result<()>> + Send;

    /// Close the connection
    fn disconnect(&self) -> impl Future<Output = Result<()>> + Send;

    /// Engine version string, e.g. "0.24.0.1"
    fn version(&self) -> impl Future<Output = Result<String>> + Send;

    fn set_weather_preset(&self, preset: &str) -> impl Future<Output = Result<()>> + Send;

    fn set_time_of_day(&self, time_of_day: f64) -> impl Future<Output = Result<()>> + Send;

    /// Write the scenario (level, vehicles, classical sensors) to the engine
    fn make_scenario(&self, scenario: &ScenarioBuild) -> impl Future<Output = Result<()>> + Send;

    fn load_scenario(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    fn start_scenario(&self) -> impl Future<Output = Result<()>> + Send;

    /// Advance the simulation by `count` steps; returns once all are done
    fn step(&self, count: u32) -> impl Future<Output = Result<()>> + Send;

    fn pause(&self) -> impl Future<Output = Result<()>> + Send;

    fn resume(&self) -> impl Future<Output = Result<()>> + Send;

    fn get_gamestate(&self) -> impl Future<Output = Result<GameState>> + Send;

    /// Current vehicles in the engine's native order, keyed by id
    fn get_current_vehicles(
        &self,
    ) -> impl Future<Output = Result<Vec<(String, CurrentVehicle)>>> + Send;

    fn get_scenario_name(&self) -> impl Future<Output = Result<String>> + Send;

    /// Spawn a vehicle into the running scenario
    fn spawn_vehicle(
        &self,
        vehicle: &VehicleHandle,
        position: [f64; 3],
        rotation: [f64; 4],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Teleport a vehicle; the engine's success flag is returned verbatim
    fn teleport_vehicle(
        &self,
        vehicle_id: &str,
        position: [f64; 3],
        rotation: [f64; 4],
    ) -> impl Future<Output = Result<bool>> + Send;

    fn get_roads(&self) -> impl Future<Output = Result<Vec<RoadInfo>>> + Send;

    fn get_road_edges(&self, road_id: &str) -> impl Future<Output = Result<Vec<RoadEdge>>> + Send;

    /// Attach an automation sensor to a placed vehicle
    fn attach_sensor(
        &self,
        vehicle_id: &str,
        config: &SensorConfig,
    ) -> impl Future<Output = Result<SensorHandle>> + Send;

    /// Latest sample of an automation sensor, None before the first one
    fn poll_sensor(
        &self,
        handle: SensorHandle,
    ) -> impl Future<Output = Result<Option<SensorReading>>> + Send;

    fn poll_vehicle_state(
        &self,
        vehicle_id: &str,
    ) -> impl Future<Output = Result<VehicleState>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn config(name: &str) -> SensorConfig {
        SensorConfig {
            name: name.into(),
            sensor_type: "Damage".into(),
            class: "Damage".into(),
            properties: Map::new(),
            base_handle: None,
        }
    }

    #[test]
    fn classical_attach_replaces_same_name() {
        let mut vehicle = VehicleHandle::new("ego", "etk800");
        assert!(vehicle.attach_classical("dmg", config("dmg")).is_none());
        assert!(vehicle.attach_classical("dmg", config("dmg")).is_some());
        assert_eq!(vehicle.classical_count(), 1);
        assert!(vehicle.classical_sensor("dmg").is_some());
    }
}
