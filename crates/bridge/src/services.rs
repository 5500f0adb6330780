//! Service endpoints
//!
//! 七个请求/响应端点。配置或请求格式错误返回 success=false，不触达引擎；
//! pause/resume 无法确认时同样返回 success=false；其它引擎错误向上传播。

use std::path::Path;
use std::sync::Arc;

use contracts::{
    check_request, ChangeSimulationStateResponse, GetCurrentVehiclesResponse,
    GetScenarioStateResponse, ScenarioState, ServiceRequest, ServiceResponse, SpawnVehicleRequest,
    SpawnVehicleResponse, StartScenarioRequest, StartScenarioResponse, TeleportVehicleRequest,
    TeleportVehicleResponse, VehicleInfo,
};
use sim_client::SimClient;
use tracing::{error, info, instrument, warn};

use crate::assembler::SensorAssembler;
use crate::error::{BridgeError, Result};
use crate::lifecycle::ScenarioController;

/// Request/response endpoints over one scenario controller
pub struct BridgeServices<C: SimClient> {
    controller: Arc<ScenarioController<C>>,
}

impl<C: SimClient> Clone for BridgeServices<C> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
        }
    }
}

impl<C: SimClient> BridgeServices<C> {
    pub fn new(controller: Arc<ScenarioController<C>>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &Arc<ScenarioController<C>> {
        &self.controller
    }

    fn client(&self) -> &C {
        self.controller.client().as_ref()
    }

    /// Dispatch a request/response call
    ///
    /// The step action is not handled here.
    pub async fn handle(&self, request: ServiceRequest) -> Result<ServiceResponse> {
        let service = request.service_name();
        let response = match request {
            ServiceRequest::GetScenarioState => {
                self.get_scenario_state().await.map(ServiceResponse::GetScenarioState)
            }
            ServiceRequest::SpawnVehicle(req) => {
                self.spawn_vehicle(req).await.map(ServiceResponse::SpawnVehicle)
            }
            ServiceRequest::TeleportVehicle(req) => {
                self.teleport_vehicle(req).await.map(ServiceResponse::TeleportVehicle)
            }
            ServiceRequest::Pause => self.pause().await.map(ServiceResponse::Pause),
            ServiceRequest::Resume => self.resume().await.map(ServiceResponse::Resume),
            ServiceRequest::GetCurrentVehicles => self
                .get_current_vehicles()
                .await
                .map(ServiceResponse::GetCurrentVehicles),
            ServiceRequest::StartScenario(req) => {
                self.start_scenario(req).await.map(ServiceResponse::StartScenario)
            }
            ServiceRequest::Step(_) | ServiceRequest::CancelStep => {
                Err(BridgeError::Config(contracts::ContractError::config_validation(
                    "service",
                    format!("'{service}' is served by the step action"),
                )))
            }
        };

        let status = match &response {
            Ok(r) if succeeded(r) => "ok",
            Ok(_) => "failed",
            Err(_) => "error",
        };
        observability::record_service_call(service, status);
        response
    }

    #[instrument(name = "service_get_scenario_state", skip(self))]
    pub async fn get_scenario_state(&self) -> Result<GetScenarioStateResponse> {
        let game_state = self.client().get_gamestate().await?;
        let mut state = ScenarioState::default();

        if game_state.scenario_loaded() {
            state.loaded = true;
            state.level_name = game_state.level.clone().unwrap_or_default();
            state.vehicle_ids = self
                .client()
                .get_current_vehicles()
                .await?
                .into_iter()
                .map(|(id, _)| id)
                .collect();

            if game_state.scenario_state.is_some() {
                state.running = game_state.scenario_running();
                state.scenario_name = self.client().get_scenario_name().await?;
            }
        }

        Ok(GetScenarioStateResponse { state })
    }

    /// Spawn a vehicle from a vehicle-config document
    ///
    /// The document's name is replaced by the request's.
    #[instrument(name = "service_spawn_vehicle", skip(self, request), fields(vehicle_id = %request.name))]
    pub async fn spawn_vehicle(&self, request: SpawnVehicleRequest) -> Result<SpawnVehicleResponse> {
        let failed = SpawnVehicleResponse { success: false };

        if let Err(e) = check_request("spawn_vehicle", &request) {
            error!(error = %e, "Rejected spawn request");
            return Ok(failed);
        }
        let (Some(position), Some(rotation)) = (pose3(&request.pos), pose4(&request.rot_quat)) else {
            return Ok(failed);
        };

        let resolver = self.controller.resolver();
        let mut spec = match resolver.load_vehicle(Path::new(&request.path_to_vehicle_config_file)) {
            Ok(spec) => spec,
            Err(e) => {
                error!(error = %e, "Vehicle config unavailable");
                return Ok(failed);
            }
        };
        spec.name = request.name.clone();

        let assembler = SensorAssembler::new(self.controller.registry(), self.controller.catalog());
        let vehicle = match assembler
            .check_vehicle(&spec)
            .map_err(BridgeError::from)
            .and_then(|()| assembler.build_vehicle(&spec))
        {
            Ok(vehicle) => vehicle,
            Err(e) => {
                error!(error = %e, "Vehicle config rejected");
                return Ok(failed);
            }
        };

        self.client().spawn_vehicle(&vehicle, position, rotation).await?;
        info!(model = %spec.model, "Vehicle spawned");
        Ok(SpawnVehicleResponse { success: true })
    }

    /// Teleport a vehicle; the engine's flag is reported verbatim
    #[instrument(name = "service_teleport_vehicle", skip(self, request), fields(vehicle_id = %request.vehicle_id))]
    pub async fn teleport_vehicle(
        &self,
        request: TeleportVehicleRequest,
    ) -> Result<TeleportVehicleResponse> {
        if let Err(e) = check_request("teleport_vehicle", &request) {
            error!(error = %e, "Rejected teleport request");
            return Ok(TeleportVehicleResponse { success: false });
        }
        let (Some(position), Some(rotation)) = (pose3(&request.pos), pose4(&request.rot_quat)) else {
            return Ok(TeleportVehicleResponse { success: false });
        };

        let success = self
            .client()
            .teleport_vehicle(&request.vehicle_id, position, rotation)
            .await?;
        if !success {
            warn!("Engine reported teleport failure");
        }
        Ok(TeleportVehicleResponse { success })
    }

    #[instrument(name = "service_pause", skip(self))]
    pub async fn pause(&self) -> Result<ChangeSimulationStateResponse> {
        let result = self.client().pause().await.map_err(BridgeError::from);
        confirm("pause", result)
    }

    #[instrument(name = "service_resume", skip(self))]
    pub async fn resume(&self) -> Result<ChangeSimulationStateResponse> {
        let result = self.client().resume().await.map_err(BridgeError::from);
        confirm("resume", result)
    }

    /// Current vehicles in the engine's native order
    #[instrument(name = "service_get_current_vehicles", skip(self))]
    pub async fn get_current_vehicles(&self) -> Result<GetCurrentVehiclesResponse> {
        let vehicles = self
            .client()
            .get_current_vehicles()
            .await?
            .into_iter()
            .map(|(_, v)| VehicleInfo {
                vehicle_id: v.name,
                model: v.model,
            })
            .collect();
        Ok(GetCurrentVehiclesResponse { vehicles })
    }

    /// success=false when the document is rejected or an engine step fails
    #[instrument(
        name = "service_start_scenario",
        skip(self, request),
        fields(path = %request.path_to_scenario_definition)
    )]
    pub async fn start_scenario(&self, request: StartScenarioRequest) -> Result<StartScenarioResponse> {
        let path = Path::new(&request.path_to_scenario_definition);
        match self.controller.start_scenario(path).await {
            Ok(_) => Ok(StartScenarioResponse { success: true }),
            Err(e) => {
                error!(error = %e, "start_scenario failed");
                Ok(StartScenarioResponse { success: false })
            }
        }
    }
}

/// Map an unconfirmed state change to success=false
fn confirm(operation: &str, result: Result<()>) -> Result<ChangeSimulationStateResponse> {
    match result {
        Ok(()) => Ok(ChangeSimulationStateResponse { success: true }),
        Err(e) if e.is_unconfirmed() => {
            error!(operation, error = %e, "No confirmation available, simulation state unknown");
            Ok(ChangeSimulationStateResponse { success: false })
        }
        Err(e) => Err(e),
    }
}

fn succeeded(response: &ServiceResponse) -> bool {
    match response {
        ServiceResponse::GetScenarioState(_) | ServiceResponse::GetCurrentVehicles(_) => true,
        ServiceResponse::SpawnVehicle(r) => r.success,
        ServiceResponse::TeleportVehicle(r) => r.success,
        ServiceResponse::Pause(r) | ServiceResponse::Resume(r) => r.success,
        ServiceResponse::StartScenario(r) => r.success,
        ServiceResponse::CancelStep { accepted } => *accepted,
    }
}

fn pose3(values: &[f64]) -> Option<[f64; 3]> {
    values.try_into().ok()
}

fn pose4(values: &[f64]) -> Option<[f64; 4]> {
    values.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::DocumentResolver;
    use contracts::{GameState, SensorDefinitionCatalog};
    use serde_json::json;
    use sim_client::{MockConfig, MockSimClient, SensorRegistry};

    async fn services(config: MockConfig) -> BridgeServices<MockSimClient> {
        let client = Arc::new(MockSimClient::with_config(config));
        client.connect("localhost", 64256).await.unwrap();
        BridgeServices::new(Arc::new(ScenarioController::new(
            client,
            SensorRegistry::with_defaults(),
            SensorDefinitionCatalog::default(),
            DocumentResolver::new(None),
        )))
    }

    fn mock(services: &BridgeServices<MockSimClient>) -> &MockSimClient {
        services.controller().client()
    }

    async fn with_scenario(dir: &tempfile::TempDir, config: MockConfig) -> BridgeServices<MockSimClient> {
        let path = dir.path().join("scenario.json");
        std::fs::write(
            &path,
            json!({
                "level": "gridmap",
                "name": "demo",
                "vehicles": [
                    { "name": "ego", "model": "etk800", "position": [0, 0, 0], "rotation": [0, 0, 0, 1] },
                    { "name": "npc", "model": "pickup", "position": [5, 0, 0], "rotation": [0, 0, 0, 1] }
                ]
            })
            .to_string(),
        )
        .unwrap();

        let services = services(config).await;
        let response = services
            .start_scenario(StartScenarioRequest {
                path_to_scenario_definition: path.display().to_string(),
            })
            .await
            .unwrap();
        assert!(response.success);
        services
    }

    #[tokio::test]
    async fn bad_arity_never_reaches_engine() {
        let services = services(MockConfig::default()).await;
        let before = mock(&services).total_calls();

        let spawn = services
            .spawn_vehicle(SpawnVehicleRequest {
                name: "ego2".into(),
                pos: vec![0.0, 0.0],
                rot_quat: vec![0.0, 0.0, 0.0, 1.0],
                path_to_vehicle_config_file: "vehicle.json".into(),
            })
            .await
            .unwrap();
        let teleport = services
            .teleport_vehicle(TeleportVehicleRequest {
                vehicle_id: "ego".into(),
                pos: vec![0.0, 0.0, 0.0],
                rot_quat: vec![0.0, 0.0, 1.0],
            })
            .await
            .unwrap();

        assert!(!spawn.success);
        assert!(!teleport.success);
        assert_eq!(mock(&services).total_calls(), before);
    }

    #[tokio::test]
    async fn scenario_state_false_outside_scenario() {
        let services = services(MockConfig::default()).await;
        for state in ["menu", "loading", "scenario_end"] {
            mock(&services).set_game_state(Some(GameState {
                state: state.into(),
                level: Some("gridmap".into()),
                scenario_state: Some("running".into()),
            }));
            let response = services.get_scenario_state().await.unwrap();
            assert!(!response.state.loaded, "state {state}");
            assert!(!response.state.running, "state {state}");
            assert!(response.state.vehicle_ids.is_empty());
        }
    }

    #[tokio::test]
    async fn scenario_state_reports_running_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let services = with_scenario(&dir, MockConfig::default()).await;

        let state = services.get_scenario_state().await.unwrap().state;
        assert!(state.loaded && state.running);
        assert_eq!(state.scenario_name, "demo");
        assert_eq!(state.level_name, "gridmap");
        assert_eq!(state.vehicle_ids, ["ego", "npc"]);
    }

    #[tokio::test]
    async fn current_vehicles_keep_engine_order() {
        let dir = tempfile::tempdir().unwrap();
        let services = with_scenario(&dir, MockConfig::default()).await;

        let vehicles = services.get_current_vehicles().await.unwrap().vehicles;
        let ids: Vec<_> = vehicles.iter().map(|v| v.vehicle_id.as_str()).collect();
        assert_eq!(ids, ["ego", "npc"]);
        assert_eq!(vehicles[1].model, "pickup");
    }

    #[tokio::test]
    async fn unconfirmed_pause_is_failure_not_error() {
        let services = services(MockConfig {
            fail_pause: true,
            ..MockConfig::default()
        })
        .await;

        assert!(!services.pause().await.unwrap().success);
        assert!(services.resume().await.unwrap().success);
    }

    #[tokio::test]
    async fn spawn_overrides_document_name() {
        let dir = tempfile::tempdir().unwrap();
        let services = with_scenario(&dir, MockConfig::default()).await;
        let vehicle = dir.path().join("vehicle.json");
        std::fs::write(
            &vehicle,
            json!({ "name": "template", "model": "etki", "sensors_classical": [{ "name": "t", "type": "Timer" }] })
                .to_string(),
        )
        .unwrap();

        let response = services
            .spawn_vehicle(SpawnVehicleRequest {
                name: "extra".into(),
                pos: vec![1.0, 2.0, 0.0],
                rot_quat: vec![0.0, 0.0, 0.0, 1.0],
                path_to_vehicle_config_file: vehicle.display().to_string(),
            })
            .await
            .unwrap();
        assert!(response.success);

        let ids: Vec<_> = services
            .get_current_vehicles()
            .await
            .unwrap()
            .vehicles
            .into_iter()
            .map(|v| v.vehicle_id)
            .collect();
        assert_eq!(ids, ["ego", "npc", "extra"]);
    }

    #[tokio::test]
    async fn teleport_reports_engine_flag() {
        let dir = tempfile::tempdir().unwrap();
        let services = with_scenario(
            &dir,
            MockConfig {
                teleport_result: false,
                ..MockConfig::default()
            },
        )
        .await;

        let response = services
            .teleport_vehicle(TeleportVehicleRequest {
                vehicle_id: "ego".into(),
                pos: vec![1.0, 1.0, 0.0],
                rot_quat: vec![0.0, 0.0, 0.0, 1.0],
            })
            .await
            .unwrap();
        assert!(!response.success);
    }

    #[tokio::test]
    async fn start_scenario_missing_file_fails() {
        let services = services(MockConfig::default()).await;
        let response = services
            .handle(ServiceRequest::StartScenario(StartScenarioRequest {
                path_to_scenario_definition: "/nonexistent/scenario.json".into(),
            }))
            .await
            .unwrap();
        assert_eq!(
            response,
            ServiceResponse::StartScenario(StartScenarioResponse { success: false })
        );
        assert_eq!(mock(&services).call_count("make_scenario"), 0);
    }
}
