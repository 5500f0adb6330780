//! Publishers polled by the publish loop
//!
//! One publisher per vehicle (state), per automation sensor with a
//! publishing class, and at most one for the road network.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use contracts::{
    road_network_topic, sensor_topic, vehicle_state_topic, Publication, RoadNetworkSample,
    RoadPolyline, RoadSide, SensorHandle, SensorSample, VehicleStateSample,
};
use sim_client::SimClient;
use tracing::debug;

use crate::error::Result;

/// Publisher registered in a bridge session
#[derive(Debug)]
pub enum Publisher {
    Vehicle(VehiclePublisher),
    Sensor(SensorPublisher),
    Network(NetworkPublisher),
}

impl Publisher {
    pub fn topic(&self) -> &str {
        match self {
            Self::Vehicle(p) => &p.topic,
            Self::Sensor(p) => &p.topic,
            Self::Network(p) => &p.topic,
        }
    }

    /// Poll the engine once; `None` when there is nothing new to emit
    pub async fn publish<C: SimClient>(
        &self,
        client: &C,
        stamp: DateTime<Utc>,
    ) -> Result<Option<Publication>> {
        match self {
            Self::Vehicle(p) => p.publish(client, stamp).await.map(Some),
            Self::Sensor(p) => p.publish(client, stamp).await,
            Self::Network(p) => p.publish(client, stamp).await,
        }
    }
}

/// Vehicle pose/velocity, emitted every tick
#[derive(Debug)]
pub struct VehiclePublisher {
    vehicle_id: String,
    topic: String,
}

impl VehiclePublisher {
    pub fn new(vehicle_id: impl Into<String>) -> Self {
        let vehicle_id = vehicle_id.into();
        Self {
            topic: vehicle_state_topic(&vehicle_id),
            vehicle_id,
        }
    }

    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    async fn publish<C: SimClient>(&self, client: &C, stamp: DateTime<Utc>) -> Result<Publication> {
        let state = client.poll_vehicle_state(&self.vehicle_id).await?;
        Ok(Publication::VehicleState(VehicleStateSample {
            topic: self.topic.clone(),
            vehicle_id: self.vehicle_id.clone(),
            stamp,
            state,
        }))
    }
}

/// Automation sensor samples, emitted when the engine frame advances
#[derive(Debug)]
pub struct SensorPublisher {
    vehicle_id: String,
    sensor_name: String,
    handle: SensorHandle,
    topic: String,
    /// Frame of the last emitted sample + 1 (0 = none yet)
    next_frame: AtomicU64,
}

impl SensorPublisher {
    pub fn new(
        vehicle_id: impl Into<String>,
        sensor_name: impl Into<String>,
        handle: SensorHandle,
    ) -> Self {
        let vehicle_id = vehicle_id.into();
        let sensor_name = sensor_name.into();
        Self {
            topic: sensor_topic(&vehicle_id, &sensor_name),
            vehicle_id,
            sensor_name,
            handle,
            next_frame: AtomicU64::new(0),
        }
    }

    pub fn handle(&self) -> SensorHandle {
        self.handle
    }

    async fn publish<C: SimClient>(
        &self,
        client: &C,
        stamp: DateTime<Utc>,
    ) -> Result<Option<Publication>> {
        let Some(reading) = client.poll_sensor(self.handle).await? else {
            return Ok(None);
        };

        let next = reading.frame.saturating_add(1);
        if self.next_frame.fetch_max(next, Ordering::AcqRel) >= next {
            debug!(topic = %self.topic, frame = reading.frame, "Sensor frame unchanged");
            return Ok(None);
        }

        Ok(Some(Publication::SensorSample(SensorSample {
            topic: self.topic.clone(),
            vehicle_id: self.vehicle_id.clone(),
            sensor_name: self.sensor_name.clone(),
            stamp,
            reading,
        })))
    }
}

/// Road network borders, emitted once per session
///
/// A failed build is retried on the next tick.
#[derive(Debug)]
pub struct NetworkPublisher {
    topic: String,
    published: AtomicBool,
}

impl Default for NetworkPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkPublisher {
    pub fn new() -> Self {
        Self {
            topic: road_network_topic(),
            published: AtomicBool::new(false),
        }
    }

    pub fn is_published(&self) -> bool {
        self.published.load(Ordering::Acquire)
    }

    async fn publish<C: SimClient>(
        &self,
        client: &C,
        stamp: DateTime<Utc>,
    ) -> Result<Option<Publication>> {
        if self.is_published() {
            return Ok(None);
        }

        let polylines = build_road_network(client).await?;
        if self.published.swap(true, Ordering::AcqRel) {
            return Ok(None);
        }

        debug!(polylines = polylines.len(), "Road network built");
        Ok(Some(Publication::RoadNetwork(RoadNetworkSample {
            topic: self.topic.clone(),
            stamp,
            polylines,
        })))
    }
}

/// Left/right border polylines of every drivable road
///
/// Roads marked "-1" are skipped, as are roads without edges.
pub async fn build_road_network<C: SimClient>(client: &C) -> Result<Vec<RoadPolyline>> {
    let mut polylines = Vec::new();

    for road in client.get_roads().await? {
        if !road.is_drivable() {
            continue;
        }
        let edges = client.get_road_edges(&road.id).await?;
        if edges.is_empty() {
            continue;
        }

        polylines.push(RoadPolyline {
            road_id: road.id.clone(),
            side: RoadSide::Left,
            points: edges.iter().map(|e| e.left).collect(),
        });
        polylines.push(RoadPolyline {
            road_id: road.id,
            side: RoadSide::Right,
            points: edges.iter().map(|e| e.right).collect(),
        });
    }

    Ok(polylines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{RoadEdge, RoadInfo, SensorConfig};
    use serde_json::Map;
    use sim_client::{MockConfig, MockRoad, MockSimClient, PlacedVehicle, ScenarioBuild, VehicleHandle};

    fn road(id: &str, drivability: &str, edges: usize) -> MockRoad {
        MockRoad {
            info: RoadInfo {
                id: id.into(),
                drivability: drivability.into(),
            },
            edges: (0..edges)
                .map(|i| {
                    let x = i as f64;
                    RoadEdge {
                        left: [x, 1.0, 0.0],
                        middle: [x, 0.0, 0.0],
                        right: [x, -1.0, 0.0],
                    }
                })
                .collect(),
        }
    }

    async fn started(config: MockConfig) -> MockSimClient {
        let client = MockSimClient::with_config(config);
        client.connect("localhost", 64256).await.unwrap();
        client
            .make_scenario(&ScenarioBuild {
                level: "gridmap".into(),
                name: "t".into(),
                vehicles: vec![PlacedVehicle {
                    vehicle: VehicleHandle::new("ego", "etk800"),
                    position: [1.0, 2.0, 3.0],
                    rotation: [0.0, 0.0, 0.0, 1.0],
                }],
            })
            .await
            .unwrap();
        client.load_scenario("t").await.unwrap();
        client.start_scenario().await.unwrap();
        client
    }

    #[tokio::test]
    async fn road_network_skips_non_drivable() {
        let client = started(MockConfig {
            roads: vec![road("a", "1", 3), road("deco", "-1", 2), road("empty", "0.5", 0)],
            ..MockConfig::default()
        })
        .await;

        let polylines = build_road_network(&client).await.unwrap();
        assert_eq!(polylines.len(), 2);
        assert!(polylines.iter().all(|p| p.road_id == "a" && p.points.len() == 3));
        assert_eq!(polylines[0].side, RoadSide::Left);
        assert_eq!(polylines[1].points[0], [0.0, -1.0, 0.0]);
        assert_eq!(client.call_count("get_road_edges"), 2);
    }

    #[tokio::test]
    async fn network_publishes_once() {
        let client = started(MockConfig {
            roads: vec![road("a", "1", 2)],
            ..MockConfig::default()
        })
        .await;
        let publisher = Publisher::Network(NetworkPublisher::new());

        assert!(publisher.publish(&client, Utc::now()).await.unwrap().is_some());
        assert!(publisher.publish(&client, Utc::now()).await.unwrap().is_none());
        assert_eq!(client.call_count("get_roads"), 1);
    }

    #[tokio::test]
    async fn sensor_publishes_only_new_frames() {
        let client = started(MockConfig::default()).await;
        let config = SensorConfig {
            name: "cam".into(),
            sensor_type: "Camera.default".into(),
            class: "Camera".into(),
            properties: Map::new(),
            base_handle: None,
        };
        let handle = client.attach_sensor("ego", &config).await.unwrap();
        let publisher = Publisher::Sensor(SensorPublisher::new("ego", "cam", handle));
        assert_eq!(publisher.topic(), "sim_bridge/ego/cam");

        assert!(publisher.publish(&client, Utc::now()).await.unwrap().is_some());
        assert!(publisher.publish(&client, Utc::now()).await.unwrap().is_none());

        client.step(1).await.unwrap();
        let publication = publisher.publish(&client, Utc::now()).await.unwrap().unwrap();
        match publication {
            Publication::SensorSample(sample) => assert_eq!(sample.reading.frame, client.frame()),
            other => panic!("unexpected publication {other:?}"),
        }
    }

    #[tokio::test]
    async fn vehicle_publishes_every_tick() {
        let client = started(MockConfig::default()).await;
        let publisher = Publisher::Vehicle(VehiclePublisher::new("ego"));

        for _ in 0..2 {
            let publication = publisher.publish(&client, Utc::now()).await.unwrap().unwrap();
            assert_eq!(publication.topic(), "sim_bridge/ego/state");
        }
    }
}
