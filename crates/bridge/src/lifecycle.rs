//! Scenario lifecycle controller
//!
//! `Idle → Decoding → Built → Started → Running`
//!
//! `start_scenario` builds a fresh [`BridgeSession`]; the previous session is
//! dropped as soon as the document has been accepted.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use config_loader::DocumentResolver;
use contracts::{ContractError, ScenarioSpec, SensorDefinitionCatalog, StaticMountTransform};
use sim_client::{PlacedVehicle, ScenarioBuild, SensorRegistry, SimClient};
use tracing::{error, info, instrument, warn};

use crate::assembler::SensorAssembler;
use crate::error::Result;
use crate::publisher::{NetworkPublisher, Publisher, SensorPublisher, VehiclePublisher};
use crate::session::{BridgeSession, SessionSlot};

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    Decoding,
    Built,
    Started,
    Running,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Decoding => "decoding",
            Self::Built => "built",
            Self::Started => "started",
            Self::Running => "running",
        };
        f.write_str(s)
    }
}

/// Post-start action queued while decoding
#[derive(Debug, Clone, PartialEq)]
enum ScenarioHook {
    Weather(String),
    TimeOfDay(f64),
    NetworkVisualization,
}

/// Owns the engine client and the current session
pub struct ScenarioController<C: SimClient> {
    client: Arc<C>,
    registry: SensorRegistry,
    catalog: SensorDefinitionCatalog,
    resolver: DocumentResolver,
    slot: Arc<SessionSlot>,
    state: Mutex<LifecycleState>,
    /// Serialises concurrent start_scenario calls
    start_lock: tokio::sync::Mutex<()>,
}

impl<C: SimClient> ScenarioController<C> {
    pub fn new(
        client: Arc<C>,
        registry: SensorRegistry,
        catalog: SensorDefinitionCatalog,
        resolver: DocumentResolver,
    ) -> Self {
        Self {
            client,
            registry,
            catalog,
            resolver,
            slot: Arc::new(SessionSlot::new()),
            state: Mutex::new(LifecycleState::Idle),
            start_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &SensorDefinitionCatalog {
        &self.catalog
    }

    pub fn resolver(&self) -> &DocumentResolver {
        &self.resolver
    }

    /// Session slot shared with the publish loop
    pub fn slot(&self) -> Arc<SessionSlot> {
        Arc::clone(&self.slot)
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Load, build and start a scenario
    ///
    /// A document that fails to load or validate leaves the state and the
    /// current session untouched. Later failures propagate without rollback.
    #[instrument(name = "lifecycle_start_scenario", skip(self), fields(path = %path.display()))]
    pub async fn start_scenario(&self, path: &Path) -> Result<Arc<BridgeSession>> {
        let _guard = self.start_lock.lock().await;

        let scenario = match self.load_checked(path) {
            Ok(scenario) => scenario,
            Err(e) => {
                error!(error = %e, "Scenario document rejected");
                return Err(e.into());
            }
        };
        info!(
            scenario = %scenario.name,
            level = %scenario.level,
            vehicles = scenario.vehicles.len(),
            sensors = scenario.sensor_count(),
            "Scenario document accepted"
        );

        let previous = self.slot.replace(BridgeSession::empty());
        if let Some(name) = previous.scenario_name() {
            info!(previous = %name, "Previous session dropped");
        }
        drop(previous);

        self.set_state(LifecycleState::Decoding);
        let assembler = SensorAssembler::new(&self.registry, &self.catalog);
        let mut publishers = Vec::new();
        let mut placed = Vec::with_capacity(scenario.vehicles.len());

        for vehicle in &scenario.vehicles {
            let (Some(position), Some(rotation)) = (vehicle.position, vehicle.rotation) else {
                return Err(ContractError::config_validation(
                    format!("vehicles[{}]", vehicle.name),
                    "position and rotation are required",
                )
                .into());
            };
            placed.push(PlacedVehicle {
                vehicle: assembler.build_vehicle(vehicle)?,
                position,
                rotation,
            });
            publishers.push(Publisher::Vehicle(VehiclePublisher::new(&vehicle.name)));
        }
        let hooks = queue_hooks(&scenario);

        let build = ScenarioBuild {
            level: scenario.level.clone(),
            name: scenario.name.clone(),
            vehicles: placed,
        };
        self.client.make_scenario(&build).await?;
        self.set_state(LifecycleState::Built);

        self.client.load_scenario(&scenario.name).await?;
        self.client.start_scenario().await?;
        self.set_state(LifecycleState::Started);

        let mut static_transforms: Vec<StaticMountTransform> = Vec::new();
        for (vehicle, placed) in scenario.vehicles.iter().zip(&build.vehicles) {
            let attached = assembler
                .attach_automation(self.client.as_ref(), vehicle, &placed.vehicle)
                .await?;
            for sensor in attached {
                if let Some(transform) = sensor.transform {
                    static_transforms.push(transform);
                }
                if sensor.factory.publishes {
                    publishers.push(Publisher::Sensor(SensorPublisher::new(
                        &sensor.vehicle_id,
                        &sensor.name,
                        sensor.handle,
                    )));
                }
            }
        }

        for hook in hooks {
            match hook {
                ScenarioHook::Weather(preset) => self.client.set_weather_preset(&preset).await?,
                ScenarioHook::TimeOfDay(tod) => self.client.set_time_of_day(tod).await?,
                ScenarioHook::NetworkVisualization => {
                    publishers.push(Publisher::Network(NetworkPublisher::new()));
                }
            }
        }

        if scenario.starts_paused() {
            self.client.pause().await?;
        }

        let session = BridgeSession::new(&scenario.name, static_transforms, publishers, true);
        info!(
            scenario = %scenario.name,
            publishers = session.publishers().len(),
            static_transforms = session.static_transforms().len(),
            paused = scenario.starts_paused(),
            "Scenario running"
        );
        observability::set_active_publishers(session.publishers().len());
        self.slot.replace(session);
        self.set_state(LifecycleState::Running);

        Ok(self.slot.current())
    }

    fn load_checked(&self, path: &Path) -> std::result::Result<ScenarioSpec, ContractError> {
        let scenario = self.resolver.load_scenario(path)?;
        let assembler = SensorAssembler::new(&self.registry, &self.catalog);
        for vehicle in &scenario.vehicles {
            assembler.check_vehicle(vehicle)?;
        }
        Ok(scenario)
    }
}

/// Optional post-start actions, in application order
fn queue_hooks(scenario: &ScenarioSpec) -> Vec<ScenarioHook> {
    let mut hooks = Vec::new();
    if let Some(preset) = &scenario.weather_presets {
        hooks.push(ScenarioHook::Weather(preset.clone()));
    }
    if let Some(tod) = scenario.time_of_day {
        hooks.push(ScenarioHook::TimeOfDay(tod));
    }
    if scenario.network_visualization_enabled() {
        hooks.push(ScenarioHook::NetworkVisualization);
    } else if scenario.network_visualization.is_some() {
        warn!("network_visualization is not 'on', road network disabled");
    }
    hooks
}
