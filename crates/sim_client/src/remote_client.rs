//! Remote simulator client
//!
//! Talks to the engine's bridge socket: every message is a MessagePack map
//! prefixed with its length as a big-endian u32. Requests carry a `type` and
//! an `_id`; replies echo the `_id` and hold either `result` or `error`.
//! Calls are serialized over a single connection.

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{
    CurrentVehicle, GameState, RoadEdge, RoadInfo, SensorConfig, SensorHandle, SensorReading,
    VehicleState,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::client::{ScenarioBuild, SimClient, VehicleHandle};
use crate::error::{Result, SimClientError};

/// Upper bound of a single reply frame
const MAX_FRAME_LEN: u32 = 256 * 1024 * 1024;

#[derive(Serialize)]
struct Request<'a, P: Serialize> {
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(rename = "_id")]
    id: u64,
    params: P,
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Reply<T> {
    #[serde(rename = "_id")]
    id: u64,
    #[serde(default)]
    error: Option<ReplyError>,
    #[serde(default)]
    result: Option<T>,
}

#[derive(Deserialize)]
struct ReplyError {
    /// "unconfirmed" for state changes the engine could not confirm
    kind: String,
    message: String,
}

#[derive(Deserialize)]
struct Hello {
    version: String,
}

#[derive(Deserialize)]
struct TeleportResult {
    success: bool,
}

/// Remote simulator client
pub struct RemoteSimClient {
    stream: Mutex<Option<TcpStream>>,
    next_id: AtomicU64,
}

impl RemoteSimClient {
    pub fn new() -> Self {
        Self {
            stream: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    fn encode<P: Serialize>(kind: &str, id: u64, params: P) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(&Request { kind, id, params }).map_err(|e| {
            SimClientError::Protocol {
                message: format!("encode '{kind}': {e}"),
            }
        })
    }

    async fn exchange<P, T>(&self, kind: &'static str, params: P) -> Result<Option<T>>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let body = Self::encode(kind, id, params)?;
        let len = u32::try_from(body.len()).map_err(|_| SimClientError::Protocol {
            message: format!("request '{kind}' too large"),
        })?;

        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(SimClientError::NotConnected)?;

        stream.write_u32(len).await?;
        stream.write_all(&body).await?;
        stream.flush().await?;

        let reply_len = stream.read_u32().await?;
        if reply_len > MAX_FRAME_LEN {
            return Err(SimClientError::Protocol {
                message: format!("reply frame of {reply_len} bytes exceeds limit"),
            });
        }
        let mut buf = vec![0u8; reply_len as usize];
        stream.read_exact(&mut buf).await?;
        drop(guard);

        let reply: Reply<T> = rmp_serde::from_slice(&buf).map_err(|e| SimClientError::Protocol {
            message: format!("decode '{kind}': {e}"),
        })?;
        if reply.id != id {
            return Err(SimClientError::Protocol {
                message: format!("reply id {} does not match request id {id}", reply.id),
            });
        }

        match reply.error {
            Some(err) if err.kind == "unconfirmed" => {
                Err(SimClientError::unconfirmed(kind, err.message))
            }
            Some(err) => Err(SimClientError::request(kind, err.message)),
            None => Ok(reply.result),
        }
    }

    async fn call<P, T>(&self, kind: &'static str, params: P) -> Result<T>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        self.exchange(kind, params)
            .await?
            .ok_or_else(|| SimClientError::Protocol {
                message: format!("reply to '{kind}' has no result"),
            })
    }

    async fn call_unit<P: Serialize>(&self, kind: &'static str, params: P) -> Result<()> {
        self.exchange::<P, serde::de::IgnoredAny>(kind, params)
            .await
            .map(|_| ())
    }
}

impl Default for RemoteSimClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SimClient for RemoteSimClient {
    #[instrument(name = "remote_sim_connect", skip(self), fields(host = %host, port))]
    async fn connect(&self, host: &str, port: u16) -> Result<()> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| SimClientError::ConnectionFailed {
                message: format!("{host}:{port}: {e}"),
            })?;
        stream.set_nodelay(true)?;
        *self.stream.lock().await = Some(stream);
        info!("Connected to simulator");
        Ok(())
    }

    #[instrument(name = "remote_sim_disconnect", skip(self))]
    async fn disconnect(&self) -> Result<()> {
        if let Some(mut stream) = self.stream.lock().await.take() {
            stream.shutdown().await?;
            debug!("Simulator connection closed");
        }
        Ok(())
    }

    async fn version(&self) -> Result<String> {
        let hello: Hello = self.call("Hello", json!({})).await?;
        Ok(hello.version)
    }

    async fn set_weather_preset(&self, preset: &str) -> Result<()> {
        self.call_unit("SetWeatherPreset", json!({ "preset": preset }))
            .await
    }

    async fn set_time_of_day(&self, time_of_day: f64) -> Result<()> {
        self.call_unit("SetTimeOfDay", json!({ "time": time_of_day }))
            .await
    }

    #[instrument(
        name = "remote_sim_make_scenario",
        skip(self, scenario),
        fields(scenario = %scenario.name)
    )]
    async fn make_scenario(&self, scenario: &ScenarioBuild) -> Result<()> {
        self.call_unit("MakeScenario", scenario).await
    }

    async fn load_scenario(&self, name: &str) -> Result<()> {
        self.call_unit("LoadScenario", json!({ "name": name })).await
    }

    async fn start_scenario(&self) -> Result<()> {
        self.call_unit("StartScenario", json!({})).await
    }

    #[instrument(name = "remote_sim_step", skip(self), fields(count))]
    async fn step(&self, count: u32) -> Result<()> {
        self.call_unit("Step", json!({ "count": count, "wait": true }))
            .await
    }

    async fn pause(&self) -> Result<()> {
        self.call_unit("Pause", json!({})).await
    }

    async fn resume(&self) -> Result<()> {
        self.call_unit("Resume", json!({})).await
    }

    async fn get_gamestate(&self) -> Result<GameState> {
        self.call("GameStateRequest", json!({})).await
    }

    async fn get_current_vehicles(&self) -> Result<Vec<(String, CurrentVehicle)>> {
        self.call("GetCurrentVehicles", json!({ "include_config": false }))
            .await
    }

    async fn get_scenario_name(&self) -> Result<String> {
        self.call("GetScenarioName", json!({})).await
    }

    #[instrument(
        name = "remote_sim_spawn_vehicle",
        skip(self, vehicle, position, rotation),
        fields(vehicle_id = %vehicle.vehicle_id)
    )]
    async fn spawn_vehicle(
        &self,
        vehicle: &VehicleHandle,
        position: [f64; 3],
        rotation: [f64; 4],
    ) -> Result<()> {
        self.call_unit(
            "SpawnVehicle",
            json!({ "vehicle": vehicle, "pos": position, "rot_quat": rotation }),
        )
        .await
    }

    async fn teleport_vehicle(
        &self,
        vehicle_id: &str,
        position: [f64; 3],
        rotation: [f64; 4],
    ) -> Result<bool> {
        let result: TeleportResult = self
            .call(
                "Teleport",
                json!({ "vid": vehicle_id, "pos": position, "rot_quat": rotation }),
            )
            .await?;
        Ok(result.success)
    }

    async fn get_roads(&self) -> Result<Vec<RoadInfo>> {
        self.call("GetDecalRoadData", json!({})).await
    }

    async fn get_road_edges(&self, road_id: &str) -> Result<Vec<RoadEdge>> {
        self.call("GetDecalRoadEdges", json!({ "road": road_id }))
            .await
    }

    async fn attach_sensor(&self, vehicle_id: &str, config: &SensorConfig) -> Result<SensorHandle> {
        self.call(
            "AttachSensor",
            json!({ "vid": vehicle_id, "sensor": config }),
        )
        .await
    }

    async fn poll_sensor(&self, handle: SensorHandle) -> Result<Option<SensorReading>> {
        self.exchange("PollSensor", json!({ "handle": handle })).await
    }

    async fn poll_vehicle_state(&self, vehicle_id: &str) -> Result<VehicleState> {
        self.call("VehicleState", json!({ "vid": vehicle_id })).await
    }
}
