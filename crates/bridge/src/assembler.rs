//! Vehicle/Sensor assembler
//!
//! 从 VehicleSpec 构建 vehicle handle 并挂载传感器：
//! - classical 传感器在场景构建前同步挂到 handle 上
//! - automation 传感器在场景启动后通过引擎挂载
//!
//! 每个列表先挂 primary，再挂 derived；derived 找不到 base 时记录错误并跳过。
//! automation derived 的 base 先在已挂载的 automation 传感器中查找，再查
//! classical 传感器（没有引擎 handle，只传 base 名称）。

use contracts::{
    ContractError, SensorConfig, SensorDefinitionCatalog, SensorHandle, SensorSpec,
    StaticMountTransform, VehicleSpec,
};
use config_loader::validate_sensor_mount;
use sim_client::{SensorFactory, SensorRegistry, SimClient, VehicleHandle};
use tracing::{debug, error, instrument, warn};

use crate::error::Result;
use crate::transform::mount_transform;

/// Automation sensor attached to a placed vehicle
#[derive(Debug, Clone, PartialEq)]
pub struct AttachedSensor {
    pub vehicle_id: String,
    pub name: String,
    pub sensor_type: String,
    pub handle: SensorHandle,
    pub factory: SensorFactory,
    /// Mount transform (primary sensors with a publisher only)
    pub transform: Option<StaticMountTransform>,
}

/// Split specs into (primary, derived), keeping relative order
pub fn partition(specs: &[SensorSpec]) -> (Vec<&SensorSpec>, Vec<&SensorSpec>) {
    specs.iter().partition(|s| !s.is_derived())
}

/// Builds vehicles and attaches their sensors
pub struct SensorAssembler<'a> {
    registry: &'a SensorRegistry,
    catalog: &'a SensorDefinitionCatalog,
}

impl<'a> SensorAssembler<'a> {
    pub fn new(registry: &'a SensorRegistry, catalog: &'a SensorDefinitionCatalog) -> Self {
        Self { registry, catalog }
    }

    /// Check every sensor of a vehicle against the registry and catalog
    ///
    /// Runs before the engine is contacted. Only publishing automation
    /// primaries get a mount transform, so only they need a mount pose.
    pub fn check_vehicle(&self, spec: &VehicleSpec) -> std::result::Result<(), ContractError> {
        for sensor in &spec.sensors_classical {
            self.registry.check_spec(self.catalog, sensor)?;
        }
        for sensor in &spec.sensors_automation {
            let factory = self.registry.check_spec(self.catalog, sensor)?;
            if factory.publishes && !factory.derived {
                validate_sensor_mount(spec, sensor)?;
            }
        }
        Ok(())
    }

    /// Vehicle handle with its classical sensors attached
    #[instrument(
        name = "assembler_build_vehicle",
        skip(self, spec),
        fields(vehicle_id = %spec.name, classical = spec.sensors_classical.len())
    )]
    pub fn build_vehicle(&self, spec: &VehicleSpec) -> Result<VehicleHandle> {
        let mut vehicle = VehicleHandle::new(&spec.name, &spec.model);
        let (primaries, derived) = partition(&spec.sensors_classical);

        for sensor in primaries {
            let config = self.registry.configure(self.catalog, sensor)?;
            if vehicle.attach_classical(&sensor.name, config).is_some() {
                warn_overwrite(&spec.name, &sensor.name);
            }
        }

        for sensor in derived {
            let base = sensor.base_sensor.as_deref().unwrap_or_default();
            if vehicle.classical_sensor(base).is_none() {
                report_missing_base(&spec.name, base, &sensor.sensor_type);
                continue;
            }
            let config = self.derived_config(sensor, base, None)?;
            if vehicle.attach_classical(&sensor.name, config).is_some() {
                warn_overwrite(&spec.name, &sensor.name);
            }
        }

        debug!(attached = vehicle.classical_count(), "Classical sensors attached");
        Ok(vehicle)
    }

    /// Attach the automation sensors of a placed vehicle
    ///
    /// Returns the attached sensors in attach order; a name attached twice
    /// keeps the later sensor in the earlier slot. `vehicle` is the handle
    /// built by [`Self::build_vehicle`], used to resolve classical bases.
    #[instrument(
        name = "assembler_attach_automation",
        skip(self, client, spec, vehicle),
        fields(vehicle_id = %spec.name, automation = spec.sensors_automation.len())
    )]
    pub async fn attach_automation<C: SimClient>(
        &self,
        client: &C,
        spec: &VehicleSpec,
        vehicle: &VehicleHandle,
    ) -> Result<Vec<AttachedSensor>> {
        let mut attached: Vec<AttachedSensor> = Vec::new();
        let (primaries, derived) = partition(&spec.sensors_automation);

        for sensor in primaries {
            let factory = self.registry.check_spec(self.catalog, sensor)?;
            let config = self.registry.configure(self.catalog, sensor)?;
            let handle = client.attach_sensor(&spec.name, &config).await?;

            let transform = if factory.publishes {
                Some(mount_transform(
                    &spec.name,
                    &sensor.name,
                    &sensor.number_array("position").unwrap_or_default(),
                    &sensor.number_array("rotation").unwrap_or_default(),
                )?)
            } else {
                None
            };

            upsert(
                &mut attached,
                AttachedSensor {
                    vehicle_id: spec.name.clone(),
                    name: sensor.name.clone(),
                    sensor_type: sensor.sensor_type.clone(),
                    handle,
                    factory,
                    transform,
                },
            );
        }

        for sensor in derived {
            let base = sensor.base_sensor.as_deref().unwrap_or_default();
            let base_handle = match attached.iter().find(|a| a.name == base) {
                Some(a) => Some(a.handle),
                None if vehicle.classical_sensor(base).is_some() => None,
                None => {
                    report_missing_base(&spec.name, base, &sensor.sensor_type);
                    continue;
                }
            };

            let factory = self.registry.check_spec(self.catalog, sensor)?;
            let config = self.derived_config(sensor, base, base_handle)?;
            let handle = client.attach_sensor(&spec.name, &config).await?;

            upsert(
                &mut attached,
                AttachedSensor {
                    vehicle_id: spec.name.clone(),
                    name: sensor.name.clone(),
                    sensor_type: sensor.sensor_type.clone(),
                    handle,
                    factory,
                    transform: None,
                },
            );
        }

        Ok(attached)
    }

    fn derived_config(
        &self,
        sensor: &SensorSpec,
        base: &str,
        base_handle: Option<SensorHandle>,
    ) -> Result<SensorConfig> {
        let mut config = self.registry.configure(self.catalog, sensor)?;
        config
            .properties
            .insert("base_sensor".into(), base.to_string().into());
        config.base_handle = base_handle;
        Ok(config)
    }
}

fn upsert(attached: &mut Vec<AttachedSensor>, sensor: AttachedSensor) {
    match attached.iter_mut().find(|a| a.name == sensor.name) {
        Some(slot) => {
            warn_overwrite(&sensor.vehicle_id, &sensor.name);
            *slot = sensor;
        }
        None => attached.push(sensor),
    }
}

fn warn_overwrite(vehicle_id: &str, sensor_name: &str) {
    warn!(
        vehicle_id = %vehicle_id,
        sensor = %sensor_name,
        "Sensor name attached twice, later definition wins"
    );
}

fn report_missing_base(vehicle_id: &str, base: &str, sensor_type: &str) {
    let err = ContractError::sensor_resolution(vehicle_id, base, sensor_type);
    error!(error = %err, "Derived sensor skipped");
}
