//! # Bridge
//!
//! 仿真桥接核心：场景生命周期、传感器装配、静态坐标变换、服务端点、
//! step action 和 publish loop。
//!
//! ## 数据流
//!
//! ```text
//! start_scenario ─► ScenarioController ─► BridgeSession (Arc swap)
//!                                              │
//!                      PublishLoop (tick) ◄────┘ ─► SinkSet ─► sinks
//!
//! TCP (JSON lines) ─► ServiceServer ─► BridgeServices / StepActionServer ─► SimClient
//! ```

pub mod assembler;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod publish_loop;
pub mod publisher;
pub mod server;
pub mod services;
pub mod session;
pub mod sinks;
pub mod step;
pub mod transform;

pub use assembler::{AttachedSensor, SensorAssembler};
pub use engine::{check_engine_version, connect_engine, version_at_least, MIN_ENGINE_VERSION};
pub use error::{BridgeError, Result};
pub use lifecycle::{LifecycleState, ScenarioController};
pub use publish_loop::PublishLoop;
pub use publisher::{build_road_network, NetworkPublisher, Publisher, SensorPublisher, VehiclePublisher};
pub use server::ServiceServer;
pub use services::BridgeServices;
pub use session::{BridgeSession, SessionSlot};
pub use sinks::{LogSink, MemorySink, NetworkSink, SinkHandle, SinkSet};
pub use step::{chunk_sizes, StepActionServer, StepGoalHandle, StepOutcome};
pub use transform::{child_frame, mount_orientation, mount_transform, ALIGNMENT};
