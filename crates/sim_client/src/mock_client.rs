//! Mock 仿真客户端
//!
//! 用于测试和离线运行的 mock 实现：记录每个操作的调用次数和 step 日志，
//! 支持注入失败场景和脚本化的 game state。

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    CurrentVehicle, GameState, Quaternion, RoadEdge, RoadInfo, SensorConfig, SensorData,
    SensorHandle, SensorReading, Vector3, VehicleState,
};
use serde_json::{json, Map};
use tracing::{debug, instrument};

use crate::client::{ScenarioBuild, SimClient, VehicleHandle};
use crate::error::{Result, SimClientError};

/// Simulated seconds per engine step
const STEP_SECONDS: f64 = 0.01;

/// Road served by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct MockRoad {
    pub info: RoadInfo,
    pub edges: Vec<RoadEdge>,
}

/// Mock 客户端配置
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// 报告的引擎版本
    pub version: String,
    /// connect 失败
    pub fail_connect: bool,
    /// start_scenario 失败
    pub fail_start: bool,
    /// pause 无法确认
    pub fail_pause: bool,
    /// resume 无法确认
    pub fail_resume: bool,
    /// teleport 返回值
    pub teleport_result: bool,
    /// 每次 step 调用的耗时
    pub step_delay: Option<Duration>,
    /// 道路网络
    pub roads: Vec<MockRoad>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            version: "0.24.0".to_string(),
            fail_connect: false,
            fail_start: false,
            fail_pause: false,
            fail_resume: false,
            teleport_result: true,
            step_delay: None,
            roads: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct MockVehicle {
    model: String,
    position: [f64; 3],
    rotation: [f64; 4],
}

#[derive(Debug, Clone)]
struct MockSensor {
    vehicle_id: String,
    config: SensorConfig,
}

#[derive(Debug, Default)]
struct EngineState {
    connected: bool,
    scenario: Option<ScenarioBuild>,
    loaded: bool,
    started: bool,
    paused: bool,
    /// 保持引擎原生顺序
    vehicles: Vec<(String, MockVehicle)>,
    sensors: BTreeMap<SensorHandle, MockSensor>,
    weather: Option<String>,
    time_of_day: Option<f64>,
    scripted_state: Option<GameState>,
}

impl EngineState {
    fn vehicle(&self, vehicle_id: &str) -> Option<&MockVehicle> {
        self.vehicles
            .iter()
            .find(|(id, _)| id == vehicle_id)
            .map(|(_, v)| v)
    }

    fn vehicle_mut(&mut self, vehicle_id: &str) -> Option<&mut MockVehicle> {
        self.vehicles
            .iter_mut()
            .find(|(id, _)| id == vehicle_id)
            .map(|(_, v)| v)
    }
}

/// Mock 仿真客户端
pub struct MockSimClient {
    config: MockConfig,
    state: Mutex<EngineState>,
    calls: Mutex<HashMap<&'static str, u32>>,
    step_log: Mutex<Vec<u32>>,
    frame: AtomicU64,
    next_handle: AtomicU32,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockSimClient {
    /// 创建默认 mock 客户端
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// 使用配置创建 mock 客户端
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            state: Mutex::new(EngineState::default()),
            calls: Mutex::new(HashMap::new()),
            step_log: Mutex::new(Vec::new()),
            frame: AtomicU64::new(0),
            next_handle: AtomicU32::new(1),
        }
    }

    /// 某个操作的调用次数
    pub fn call_count(&self, operation: &str) -> u32 {
        lock(&self.calls).get(operation).copied().unwrap_or(0)
    }

    /// 所有操作的调用总数
    pub fn total_calls(&self) -> u32 {
        lock(&self.calls).values().sum()
    }

    /// 每次 step 调用的步数
    pub fn step_log(&self) -> Vec<u32> {
        lock(&self.step_log).clone()
    }

    pub fn frame(&self) -> u64 {
        self.frame.load(Ordering::SeqCst)
    }

    pub fn weather(&self) -> Option<String> {
        lock(&self.state).weather.clone()
    }

    pub fn time_of_day(&self) -> Option<f64> {
        lock(&self.state).time_of_day
    }

    pub fn is_paused(&self) -> bool {
        lock(&self.state).paused
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    /// 当前场景中已挂载的 automation 传感器 (handle, vehicle_id, config)
    pub fn attached_sensors(&self) -> Vec<(SensorHandle, String, SensorConfig)> {
        lock(&self.state)
            .sensors
            .iter()
            .map(|(handle, s)| (*handle, s.vehicle_id.clone(), s.config.clone()))
            .collect()
    }

    /// 最近一次 make_scenario 写入的场景
    pub fn last_scenario(&self) -> Option<ScenarioBuild> {
        lock(&self.state).scenario.clone()
    }

    /// 覆盖 get_gamestate 的返回值 (None 恢复为推导值)
    pub fn set_game_state(&self, state: Option<GameState>) {
        lock(&self.state).scripted_state = state;
    }

    fn record(&self, operation: &'static str) {
        *lock(&self.calls).entry(operation).or_insert(0) += 1;
    }

    fn ensure_connected(&self) -> Result<()> {
        if lock(&self.state).connected {
            Ok(())
        } else {
            Err(SimClientError::NotConnected)
        }
    }

    fn ensure_started(&self, operation: &str) -> Result<()> {
        if lock(&self.state).started {
            Ok(())
        } else {
            Err(SimClientError::request(operation, "no scenario running"))
        }
    }

    fn synthesize(config: &SensorConfig, frame: u64) -> SensorData {
        match config.class.as_str() {
            "Camera" | "RandomImageNoise" => {
                let (width, height) = config
                    .properties
                    .get("resolution")
                    .and_then(|v| v.as_array())
                    .and_then(|r| Some((r.first()?.as_u64()?, r.get(1)?.as_u64()?)))
                    .unwrap_or((2, 2));
                SensorData::Image {
                    width: width as u32,
                    height: height as u32,
                    data: Bytes::from(vec![0u8; (width * height * 3) as usize]),
                }
            }
            "Lidar" | "RandomLIDARNoise" => SensorData::PointCloud {
                num_points: 0,
                data: Bytes::new(),
            },
            "AdvancedIMU" => SensorData::Imu {
                acceleration: Vector3::new(0.0, 0.0, -9.81),
                angular_velocity: Vector3::default(),
            },
            "GPS" => SensorData::Gps {
                latitude: 0.0,
                longitude: 0.0,
                altitude: 0.0,
            },
            _ => {
                let mut values = Map::new();
                values.insert("frame".into(), json!(frame));
                SensorData::Values { values }
            }
        }
    }
}

impl Default for MockSimClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SimClient for MockSimClient {
    #[instrument(name = "mock_sim_connect", skip(self), fields(host = %host, port))]
    async fn connect(&self, host: &str, port: u16) -> Result<()> {
        self.record("connect");
        if self.config.fail_connect {
            return Err(SimClientError::ConnectionFailed {
                message: format!("mock refused {host}:{port}"),
            });
        }
        lock(&self.state).connected = true;
        Ok(())
    }

    #[instrument(name = "mock_sim_disconnect", skip(self))]
    async fn disconnect(&self) -> Result<()> {
        self.record("disconnect");
        lock(&self.state).connected = false;
        Ok(())
    }

    async fn version(&self) -> Result<String> {
        self.record("version");
        self.ensure_connected()?;
        Ok(self.config.version.clone())
    }

    async fn set_weather_preset(&self, preset: &str) -> Result<()> {
        self.record("set_weather_preset");
        self.ensure_connected()?;
        lock(&self.state).weather = Some(preset.to_string());
        Ok(())
    }

    async fn set_time_of_day(&self, time_of_day: f64) -> Result<()> {
        self.record("set_time_of_day");
        self.ensure_connected()?;
        lock(&self.state).time_of_day = Some(time_of_day);
        Ok(())
    }

    #[instrument(
        name = "mock_sim_make_scenario",
        skip(self, scenario),
        fields(scenario = %scenario.name, vehicles = scenario.vehicles.len())
    )]
    async fn make_scenario(&self, scenario: &ScenarioBuild) -> Result<()> {
        self.record("make_scenario");
        self.ensure_connected()?;

        let mut state = lock(&self.state);
        state.vehicles = scenario
            .vehicles
            .iter()
            .map(|placed| {
                (
                    placed.vehicle.vehicle_id.clone(),
                    MockVehicle {
                        model: placed.vehicle.model.clone(),
                        position: placed.position,
                        rotation: placed.rotation,
                    },
                )
            })
            .collect();
        state.sensors.clear();
        state.loaded = false;
        state.started = false;
        state.paused = false;
        state.scenario = Some(scenario.clone());
        Ok(())
    }

    async fn load_scenario(&self, name: &str) -> Result<()> {
        self.record("load_scenario");
        self.ensure_connected()?;

        let mut state = lock(&self.state);
        match &state.scenario {
            Some(scenario) if scenario.name == name => {
                state.loaded = true;
                Ok(())
            }
            _ => Err(SimClientError::request(
                "load_scenario",
                format!("scenario '{name}' was not made"),
            )),
        }
    }

    async fn start_scenario(&self) -> Result<()> {
        self.record("start_scenario");
        self.ensure_connected()?;
        if self.config.fail_start {
            return Err(SimClientError::request("start_scenario", "mock failure"));
        }

        let mut state = lock(&self.state);
        if !state.loaded {
            return Err(SimClientError::request("start_scenario", "no scenario loaded"));
        }
        state.started = true;
        state.paused = false;
        self.frame.store(1, Ordering::SeqCst);
        Ok(())
    }

    #[instrument(name = "mock_sim_step", skip(self), fields(count))]
    async fn step(&self, count: u32) -> Result<()> {
        self.record("step");
        self.ensure_connected()?;
        self.ensure_started("step")?;

        if let Some(delay) = self.config.step_delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.step_log).push(count);
        let frame = self.frame.fetch_add(u64::from(count), Ordering::SeqCst) + u64::from(count);
        debug!(count, frame, "Mock stepped");
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record("pause");
        self.ensure_connected()?;
        if self.config.fail_pause {
            return Err(SimClientError::unconfirmed("pause", "mock timeout"));
        }
        lock(&self.state).paused = true;
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.record("resume");
        self.ensure_connected()?;
        if self.config.fail_resume {
            return Err(SimClientError::unconfirmed("resume", "mock timeout"));
        }
        lock(&self.state).paused = false;
        Ok(())
    }

    async fn get_gamestate(&self) -> Result<GameState> {
        self.record("get_gamestate");
        self.ensure_connected()?;

        let state = lock(&self.state);
        if let Some(scripted) = &state.scripted_state {
            return Ok(scripted.clone());
        }
        Ok(match (&state.scenario, state.loaded) {
            (Some(scenario), true) => GameState {
                state: GameState::SCENARIO.to_string(),
                level: Some(scenario.level.clone()),
                scenario_state: Some(if state.started {
                    GameState::RUNNING.to_string()
                } else {
                    "pre-running".to_string()
                }),
            },
            _ => GameState {
                state: "menu".to_string(),
                level: None,
                scenario_state: None,
            },
        })
    }

    async fn get_current_vehicles(&self) -> Result<Vec<(String, CurrentVehicle)>> {
        self.record("get_current_vehicles");
        self.ensure_connected()?;
        Ok(lock(&self.state)
            .vehicles
            .iter()
            .map(|(id, v)| {
                (
                    id.clone(),
                    CurrentVehicle {
                        name: id.clone(),
                        model: v.model.clone(),
                    },
                )
            })
            .collect())
    }

    async fn get_scenario_name(&self) -> Result<String> {
        self.record("get_scenario_name");
        self.ensure_connected()?;
        lock(&self.state)
            .scenario
            .as_ref()
            .map(|s| s.name.clone())
            .ok_or_else(|| SimClientError::request("get_scenario_name", "no scenario"))
    }

    #[instrument(
        name = "mock_sim_spawn_vehicle",
        skip(self, vehicle, position, rotation),
        fields(vehicle_id = %vehicle.vehicle_id)
    )]
    async fn spawn_vehicle(
        &self,
        vehicle: &VehicleHandle,
        position: [f64; 3],
        rotation: [f64; 4],
    ) -> Result<()> {
        self.record("spawn_vehicle");
        self.ensure_connected()?;

        let mut state = lock(&self.state);
        if !state.loaded {
            return Err(SimClientError::request("spawn_vehicle", "no scenario loaded"));
        }
        if state.vehicle(&vehicle.vehicle_id).is_some() {
            return Err(SimClientError::request(
                "spawn_vehicle",
                format!("vehicle '{}' already exists", vehicle.vehicle_id),
            ));
        }
        state.vehicles.push((
            vehicle.vehicle_id.clone(),
            MockVehicle {
                model: vehicle.model.clone(),
                position,
                rotation,
            },
        ));
        Ok(())
    }

    async fn teleport_vehicle(
        &self,
        vehicle_id: &str,
        position: [f64; 3],
        rotation: [f64; 4],
    ) -> Result<bool> {
        self.record("teleport_vehicle");
        self.ensure_connected()?;

        let mut state = lock(&self.state);
        let Some(vehicle) = state.vehicle_mut(vehicle_id) else {
            return Ok(false);
        };
        if self.config.teleport_result {
            vehicle.position = position;
            vehicle.rotation = rotation;
        }
        Ok(self.config.teleport_result)
    }

    async fn get_roads(&self) -> Result<Vec<RoadInfo>> {
        self.record("get_roads");
        self.ensure_connected()?;
        Ok(self.config.roads.iter().map(|r| r.info.clone()).collect())
    }

    async fn get_road_edges(&self, road_id: &str) -> Result<Vec<RoadEdge>> {
        self.record("get_road_edges");
        self.ensure_connected()?;
        self.config
            .roads
            .iter()
            .find(|r| r.info.id == road_id)
            .map(|r| r.edges.clone())
            .ok_or_else(|| SimClientError::request("get_road_edges", format!("unknown road '{road_id}'")))
    }

    #[instrument(
        name = "mock_sim_attach_sensor",
        skip(self, config),
        fields(vehicle_id = %vehicle_id, sensor = %config.name, sensor_type = %config.sensor_type)
    )]
    async fn attach_sensor(&self, vehicle_id: &str, config: &SensorConfig) -> Result<SensorHandle> {
        self.record("attach_sensor");
        self.ensure_connected()?;
        self.ensure_started("attach_sensor")?;

        let mut state = lock(&self.state);
        if state.vehicle(vehicle_id).is_none() {
            return Err(SimClientError::UnknownVehicle {
                vehicle_id: vehicle_id.to_string(),
            });
        }
        if let Some(base) = config.base_handle {
            if !state.sensors.contains_key(&base) {
                return Err(SimClientError::UnknownSensor { handle: base });
            }
        }

        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        state.sensors.insert(
            handle,
            MockSensor {
                vehicle_id: vehicle_id.to_string(),
                config: config.clone(),
            },
        );
        Ok(handle)
    }

    async fn poll_sensor(&self, handle: SensorHandle) -> Result<Option<SensorReading>> {
        self.record("poll_sensor");
        self.ensure_connected()?;

        let state = lock(&self.state);
        let sensor = state
            .sensors
            .get(&handle)
            .ok_or(SimClientError::UnknownSensor { handle })?;
        if !state.started {
            return Ok(None);
        }

        let frame = self.frame();
        Ok(Some(SensorReading {
            frame,
            sim_time: frame as f64 * STEP_SECONDS,
            data: Self::synthesize(&sensor.config, frame),
        }))
    }

    async fn poll_vehicle_state(&self, vehicle_id: &str) -> Result<VehicleState> {
        self.record("poll_vehicle_state");
        self.ensure_connected()?;

        let state = lock(&self.state);
        let vehicle = state
            .vehicle(vehicle_id)
            .ok_or_else(|| SimClientError::UnknownVehicle {
                vehicle_id: vehicle_id.to_string(),
            })?;
        Ok(VehicleState {
            position: Vector3::from(vehicle.position),
            rotation: Quaternion::from(vehicle.rotation),
            velocity: Vector3::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::PlacedVehicle;

    fn scenario() -> ScenarioBuild {
        ScenarioBuild {
            level: "gridmap".into(),
            name: "test".into(),
            vehicles: vec![PlacedVehicle {
                vehicle: VehicleHandle::new("ego", "etk800"),
                position: [0.0, 0.0, 0.0],
                rotation: [0.0, 0.0, 0.0, 1.0],
            }],
        }
    }

    async fn started_client() -> MockSimClient {
        let client = MockSimClient::new();
        client.connect("localhost", 64256).await.unwrap();
        client.make_scenario(&scenario()).await.unwrap();
        client.load_scenario("test").await.unwrap();
        client.start_scenario().await.unwrap();
        client
    }

    fn camera() -> SensorConfig {
        SensorConfig {
            name: "cam".into(),
            sensor_type: "Camera.default".into(),
            class: "Camera".into(),
            properties: Map::new(),
            base_handle: None,
        }
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let client = MockSimClient::new();
        let err = client.get_gamestate().await.unwrap_err();
        assert!(matches!(err, SimClientError::NotConnected));
        assert_eq!(client.call_count("get_gamestate"), 1);
    }

    #[tokio::test]
    async fn test_gamestate_follows_lifecycle() {
        let client = MockSimClient::new();
        client.connect("localhost", 64256).await.unwrap();
        assert!(!client.get_gamestate().await.unwrap().scenario_loaded());

        client.make_scenario(&scenario()).await.unwrap();
        client.load_scenario("test").await.unwrap();
        let loaded = client.get_gamestate().await.unwrap();
        assert!(loaded.scenario_loaded());
        assert!(!loaded.scenario_running());

        client.start_scenario().await.unwrap();
        assert!(client.get_gamestate().await.unwrap().scenario_running());
    }

    #[tokio::test]
    async fn test_step_log_and_frame() {
        let client = started_client().await;
        client.step(10).await.unwrap();
        client.step(5).await.unwrap();
        assert_eq!(client.step_log(), vec![10, 5]);
        assert_eq!(client.frame(), 16);
    }

    #[tokio::test]
    async fn test_attach_and_poll() {
        let client = started_client().await;
        let handle = client.attach_sensor("ego", &camera()).await.unwrap();
        let reading = client.poll_sensor(handle).await.unwrap().unwrap();
        assert_eq!(reading.frame, 1);
        assert!(matches!(reading.data, SensorData::Image { width: 2, height: 2, .. }));

        let err = client.attach_sensor("ghost", &camera()).await.unwrap_err();
        assert!(matches!(err, SimClientError::UnknownVehicle { .. }));
    }

    #[tokio::test]
    async fn test_pause_failure_is_unconfirmed() {
        let client = MockSimClient::with_config(MockConfig {
            fail_pause: true,
            ..MockConfig::default()
        });
        client.connect("localhost", 64256).await.unwrap();
        assert!(client.pause().await.unwrap_err().is_unconfirmed());
        assert!(!client.is_paused());
    }

    #[tokio::test]
    async fn test_teleport_unknown_vehicle_is_false() {
        let client = started_client().await;
        assert!(!client
            .teleport_vehicle("ghost", [0.0; 3], [0.0, 0.0, 0.0, 1.0])
            .await
            .unwrap());
        assert!(client
            .teleport_vehicle("ego", [1.0, 2.0, 3.0], [0.0, 0.0, 0.0, 1.0])
            .await
            .unwrap());
        let state = client.poll_vehicle_state("ego").await.unwrap();
        assert_eq!(state.position, Vector3::new(1.0, 2.0, 3.0));
    }
}
