//! BridgeSettings - process-level configuration
//!
//! Loaded from an optional TOML/JSON file; CLI flags override individual fields.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Highest accepted publish loop rate
pub const MAX_TICK_RATE_HZ: f64 = 1000.0;

/// Bridge process settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// Simulator connection
    #[serde(default)]
    pub engine: EngineSettings,

    /// Sensor-definition documents, merged in order
    #[serde(default = "default_sensor_paths")]
    pub sensor_paths: Vec<PathBuf>,

    /// Publish loop rate
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: f64,

    /// Service transport listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Fallback directory for relative document paths
    #[serde(default)]
    pub package_root: Option<PathBuf>,

    /// Scenario started right after connecting
    #[serde(default)]
    pub scenario: Option<PathBuf>,

    /// Publication outputs; a log sink is used when empty
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            sensor_paths: default_sensor_paths(),
            tick_rate_hz: default_tick_rate_hz(),
            listen_addr: default_listen_addr(),
            package_root: None,
            scenario: None,
            sinks: Vec::new(),
        }
    }
}

fn default_sensor_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("config/sensors.json")]
}

fn default_tick_rate_hz() -> f64 {
    10.0
}

fn default_listen_addr() -> String {
    "127.0.0.1:50051".to_string()
}

/// Simulator endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_engine_host")]
    pub host: String,

    #[serde(default = "default_engine_port")]
    pub port: u16,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            host: default_engine_host(),
            port: default_engine_port(),
        }
    }
}

fn default_engine_host() -> String {
    "localhost".to_string()
}

fn default_engine_port() -> u16 {
    64256
}

/// Sink 输出配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl SinkConfig {
    pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
}

fn default_queue_capacity() -> usize {
    SinkConfig::DEFAULT_QUEUE_CAPACITY
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// 网络输出 (UDP)
    Network,
}
