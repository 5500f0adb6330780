//! Publication - Publish loop output
//!
//! Everything the publish loop emits per tick: re-stamped static transforms,
//! vehicle state, automation sensor samples and the road network.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{SensorReading, StampedTransform, VehicleState, NODE_NAME};

/// Topic of an automation sensor: `{node}/{vehicle_id}/{sensor_name}`
pub fn sensor_topic(vehicle_id: &str, sensor_name: &str) -> String {
    format!("{NODE_NAME}/{vehicle_id}/{sensor_name}")
}

/// Topic of a vehicle's state samples
pub fn vehicle_state_topic(vehicle_id: &str) -> String {
    format!("{NODE_NAME}/{vehicle_id}/state")
}

/// Topic of the road network polylines
pub fn road_network_topic() -> String {
    format!("{NODE_NAME}/road_network")
}

/// Topic static transforms are broadcast on
pub const STATIC_TRANSFORM_TOPIC: &str = "tf_static";

/// One message emitted by the publish loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Publication {
    StaticTransform(StampedTransform),
    VehicleState(VehicleStateSample),
    SensorSample(SensorSample),
    RoadNetwork(RoadNetworkSample),
}

/// Publication kind, used as a metrics label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublicationKind {
    StaticTransform,
    VehicleState,
    SensorSample,
    RoadNetwork,
}

impl PublicationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StaticTransform => "static_transform",
            Self::VehicleState => "vehicle_state",
            Self::SensorSample => "sensor_sample",
            Self::RoadNetwork => "road_network",
        }
    }
}

impl Publication {
    pub fn kind(&self) -> PublicationKind {
        match self {
            Self::StaticTransform(_) => PublicationKind::StaticTransform,
            Self::VehicleState(_) => PublicationKind::VehicleState,
            Self::SensorSample(_) => PublicationKind::SensorSample,
            Self::RoadNetwork(_) => PublicationKind::RoadNetwork,
        }
    }

    pub fn topic(&self) -> &str {
        match self {
            Self::StaticTransform(_) => STATIC_TRANSFORM_TOPIC,
            Self::VehicleState(s) => &s.topic,
            Self::SensorSample(s) => &s.topic,
            Self::RoadNetwork(s) => &s.topic,
        }
    }

    pub fn stamp(&self) -> DateTime<Utc> {
        match self {
            Self::StaticTransform(t) => t.stamp,
            Self::VehicleState(s) => s.stamp,
            Self::SensorSample(s) => s.stamp,
            Self::RoadNetwork(s) => s.stamp,
        }
    }
}

/// Pose/velocity sample of one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleStateSample {
    pub topic: String,
    pub vehicle_id: String,
    pub stamp: DateTime<Utc>,
    pub state: VehicleState,
}

/// New sample of an automation sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub topic: String,
    pub vehicle_id: String,
    pub sensor_name: String,
    pub stamp: DateTime<Utc>,
    pub reading: SensorReading,
}

/// Left or right border of a road
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadSide {
    Left,
    Right,
}

/// One border polyline of a drivable road
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadPolyline {
    pub road_id: String,
    pub side: RoadSide,
    pub points: Vec<[f64; 3]>,
}

/// Borders of every drivable road
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadNetworkSample {
    pub topic: String,
    pub stamp: DateTime<Utc>,
    pub polylines: Vec<RoadPolyline>,
}
