//! 配置校验模块
//!
//! 校验规则：
//! - vehicle name 唯一
//! - scenario 内车辆必须给出 position / rotation
//! - 发布数据的 primary automation 传感器: position 3 个数, rotation 至少 2 个数
//!   （是否发布由 sensor registry 决定，由调用方判断后调用 `validate_sensor_mount`）
//! - 0 < tick_rate_hz <= MAX_TICK_RATE_HZ, sink name 非空

use std::collections::HashSet;

use contracts::{
    BridgeSettings, ContractError, ScenarioSpec, SensorSpec, VehicleSpec, MAX_TICK_RATE_HZ,
};

/// 校验 BridgeSettings
pub fn validate_settings(settings: &BridgeSettings) -> Result<(), ContractError> {
    if !(settings.tick_rate_hz > 0.0 && settings.tick_rate_hz.is_finite()) {
        return Err(ContractError::config_validation(
            "tick_rate_hz",
            format!("tick_rate_hz must be > 0, got {}", settings.tick_rate_hz),
        ));
    }
    if settings.tick_rate_hz > MAX_TICK_RATE_HZ {
        return Err(ContractError::config_validation(
            "tick_rate_hz",
            format!(
                "tick_rate_hz must be <= {MAX_TICK_RATE_HZ}, got {}",
                settings.tick_rate_hz
            ),
        ));
    }

    for (idx, sink) in settings.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].queue_capacity"),
                "queue_capacity must be > 0",
            ));
        }
    }
    Ok(())
}

/// 校验 scenario 文档
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate_scenario(scenario: &ScenarioSpec) -> Result<(), ContractError> {
    validate_vehicle_names(scenario)?;
    for vehicle in &scenario.vehicles {
        validate_vehicle_pose(vehicle)?;
        validate_vehicle_sensors(vehicle)?;
    }
    Ok(())
}

/// 校验单独的 vehicle 文档 (spawn_vehicle 使用，pose 由请求给出)
pub fn validate_vehicle_sensors(vehicle: &VehicleSpec) -> Result<(), ContractError> {
    let lists = [
        ("sensors_classical", &vehicle.sensors_classical),
        ("sensors_automation", &vehicle.sensors_automation),
    ];
    for (list_name, sensors) in lists {
        for sensor in sensors.iter() {
            validate_sensor_identity(vehicle, list_name, sensor)?;
        }
    }
    Ok(())
}

fn validate_vehicle_names(scenario: &ScenarioSpec) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for vehicle in &scenario.vehicles {
        if vehicle.name.is_empty() {
            return Err(ContractError::config_validation(
                "vehicles[].name",
                "vehicle name cannot be empty",
            ));
        }
        if !seen.insert(vehicle.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("vehicles[name={}]", vehicle.name),
                "duplicate vehicle name",
            ));
        }
    }
    Ok(())
}

fn validate_vehicle_pose(vehicle: &VehicleSpec) -> Result<(), ContractError> {
    if vehicle.position.is_none() {
        return Err(ContractError::config_validation(
            format!("vehicles[{}].position", vehicle.name),
            "position is required",
        ));
    }
    if vehicle.rotation.is_none() {
        return Err(ContractError::config_validation(
            format!("vehicles[{}].rotation", vehicle.name),
            "rotation is required",
        ));
    }
    Ok(())
}

fn validate_sensor_identity(
    vehicle: &VehicleSpec,
    list_name: &str,
    sensor: &SensorSpec,
) -> Result<(), ContractError> {
    if sensor.name.is_empty() || sensor.sensor_type.is_empty() {
        return Err(ContractError::config_validation(
            format!("vehicles[{}].{list_name}[{}]", vehicle.name, sensor.name),
            "sensor name and type cannot be empty",
        ));
    }
    Ok(())
}

/// 校验 automation 传感器挂载位姿
pub fn validate_sensor_mount(
    vehicle: &VehicleSpec,
    sensor: &SensorSpec,
) -> Result<(), ContractError> {
    let field = |key: &str| {
        format!(
            "vehicles[{}].sensors_automation[{}].{key}",
            vehicle.name, sensor.name
        )
    };

    match sensor.number_array("position") {
        Some(position) if position.len() == 3 => {}
        Some(position) => {
            return Err(ContractError::config_validation(
                field("position"),
                format!("expected 3 numbers, got {}", position.len()),
            ))
        }
        None => {
            return Err(ContractError::config_validation(
                field("position"),
                "position must be an array of numbers",
            ))
        }
    }

    match sensor.number_array("rotation") {
        Some(rotation) if rotation.len() >= 2 => Ok(()),
        Some(rotation) => Err(ContractError::config_validation(
            field("rotation"),
            format!("expected at least 2 angles, got {}", rotation.len()),
        )),
        None => Err(ContractError::config_validation(
            field("rotation"),
            "rotation must be an array of numbers",
        )),
    }
}
