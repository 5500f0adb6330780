//! Service requests and responses
//!
//! One request/response pair per endpoint, the step action's goal/feedback/result,
//! and the envelopes used by the line-oriented transport.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ContractError;

/// Validate a request's shape, mapping failures into a ConfigValidation error
pub fn check_request<T: Validate>(request_name: &str, request: &T) -> Result<(), ContractError> {
    request
        .validate()
        .map_err(|e| ContractError::config_validation(request_name, e.to_string()))
}

// ===== get_scenario_state =====

/// Snapshot of the engine's scenario state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioState {
    pub loaded: bool,
    pub running: bool,
    pub scenario_name: String,
    pub level_name: String,
    pub vehicle_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetScenarioStateResponse {
    pub state: ScenarioState,
}

// ===== spawn_vehicle =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SpawnVehicleRequest {
    /// Id given to the spawned vehicle, overrides the document's name
    pub name: String,

    #[validate(length(equal = 3, message = "position must have exactly 3 elements"))]
    pub pos: Vec<f64>,

    #[validate(length(equal = 4, message = "rotation must be a quaternion of 4 elements"))]
    pub rot_quat: Vec<f64>,

    pub path_to_vehicle_config_file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpawnVehicleResponse {
    pub success: bool,
}

// ===== teleport_vehicle =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TeleportVehicleRequest {
    pub vehicle_id: String,

    #[validate(length(equal = 3, message = "position must have exactly 3 elements"))]
    pub pos: Vec<f64>,

    #[validate(length(equal = 4, message = "rotation must be a quaternion of 4 elements"))]
    pub rot_quat: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeleportVehicleResponse {
    pub success: bool,
}

// ===== pause / resume =====

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSimulationStateResponse {
    pub success: bool,
}

// ===== get_current_vehicles =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub vehicle_id: String,
    pub model: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetCurrentVehiclesResponse {
    pub vehicles: Vec<VehicleInfo>,
}

// ===== start_scenario =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartScenarioRequest {
    pub path_to_scenario_definition: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartScenarioResponse {
    pub success: bool,
}

// ===== step action =====

/// Goal of the step action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct StepGoal {
    #[validate(range(min = 1, message = "total_number_of_steps must be > 0"))]
    pub total_number_of_steps: u32,

    #[validate(range(min = 1, message = "feedback_cycle_size must be > 0"))]
    pub feedback_cycle_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFeedback {
    pub steps_completed: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub steps_completed: u32,
}

// ===== transport envelopes =====

/// Request tagged by service name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "service", rename_all = "snake_case")]
pub enum ServiceRequest {
    GetScenarioState,
    SpawnVehicle(SpawnVehicleRequest),
    TeleportVehicle(TeleportVehicleRequest),
    Pause,
    Resume,
    GetCurrentVehicles,
    StartScenario(StartScenarioRequest),
    /// Start the step action
    Step(StepGoal),
    /// Request preemption of the running step goal
    CancelStep,
}

impl ServiceRequest {
    /// Service name as registered under the node prefix
    pub fn service_name(&self) -> &'static str {
        match self {
            Self::GetScenarioState => "get_scenario_state",
            Self::SpawnVehicle(_) => "spawn_vehicle",
            Self::TeleportVehicle(_) => "teleport_vehicle",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::GetCurrentVehicles => "get_current_vehicles",
            Self::StartScenario(_) => "start_scenario",
            Self::Step(_) => "step",
            Self::CancelStep => "cancel_step",
        }
    }
}

/// Response tagged by service name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "service", rename_all = "snake_case")]
pub enum ServiceResponse {
    GetScenarioState(GetScenarioStateResponse),
    SpawnVehicle(SpawnVehicleResponse),
    TeleportVehicle(TeleportVehicleResponse),
    Pause(ChangeSimulationStateResponse),
    Resume(ChangeSimulationStateResponse),
    GetCurrentVehicles(GetCurrentVehiclesResponse),
    StartScenario(StartScenarioResponse),
    CancelStep { accepted: bool },
}

/// Incoming line: request id plus the tagged request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub id: u64,
    #[serde(flatten)]
    pub request: ServiceRequest,
}

/// Outgoing line body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyBody {
    Response(ServiceResponse),
    Feedback(StepFeedback),
    Result(StepResult),
    Preempted(StepResult),
    Error { message: String },
}

/// Outgoing line: request id plus the reply body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub id: u64,
    #[serde(flatten)]
    pub body: ReplyBody,
}
