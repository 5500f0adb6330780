//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{ScenarioSpec, SensorSpec};
use serde::Serialize;
use serde_json::{Map, Value};
use sim_client::SensorRegistry;
use tracing::info;

use crate::cli::InfoArgs;
use crate::commands::{load_settings, resolver};

/// Scenario info for JSON output
#[derive(Serialize)]
struct ScenarioInfo {
    name: String,
    level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    weather: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_of_day: Option<f64>,
    paused: bool,
    network_visualization: bool,
    vehicles: Vec<VehicleInfo>,
}

#[derive(Serialize)]
struct VehicleInfo {
    name: String,
    model: String,
    classical: usize,
    automation: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sensors: Vec<SensorInfo>,
}

#[derive(Serialize)]
struct SensorInfo {
    name: String,
    sensor_type: String,
    automation: bool,
    publishes: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_sensor: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    properties: Map<String, Value>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(scenario = %args.scenario.display(), "Loading scenario info");

    let settings = load_settings(&args.documents)?;
    let scenario = resolver(&settings)
        .load_scenario(&args.scenario)
        .with_context(|| format!("Failed to load scenario from {}", args.scenario.display()))?;

    let info = build_scenario_info(&scenario, &SensorRegistry::with_defaults(), args.sensors);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize scenario info")?;
        println!("{}", json);
    } else {
        print_scenario_info(&info);
    }

    Ok(())
}

fn build_scenario_info(
    scenario: &ScenarioSpec,
    registry: &SensorRegistry,
    with_sensors: bool,
) -> ScenarioInfo {
    let sensor_info = |spec: &SensorSpec, automation: bool| SensorInfo {
        name: spec.name.clone(),
        sensor_type: spec.sensor_type.clone(),
        automation,
        // unknown classes are reported by `validate`
        publishes: automation && registry.factory(&spec.sensor_type).is_ok_and(|f| f.publishes),
        base_sensor: spec.base_sensor.clone(),
        properties: spec.properties.clone(),
    };

    let vehicles = scenario
        .vehicles
        .iter()
        .map(|v| VehicleInfo {
            name: v.name.clone(),
            model: v.model.clone(),
            classical: v.sensors_classical.len(),
            automation: v.sensors_automation.len(),
            sensors: if with_sensors {
                v.sensors_classical
                    .iter()
                    .map(|s| sensor_info(s, false))
                    .chain(v.sensors_automation.iter().map(|s| sensor_info(s, true)))
                    .collect()
            } else {
                Vec::new()
            },
        })
        .collect();

    ScenarioInfo {
        name: scenario.name.clone(),
        level: scenario.level.clone(),
        weather: scenario.weather_presets.clone(),
        time_of_day: scenario.time_of_day,
        paused: scenario.starts_paused(),
        network_visualization: scenario.network_visualization_enabled(),
        vehicles,
    }
}

fn print_scenario_info(info: &ScenarioInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Sim Bridge Scenario                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📍 Scenario");
    println!("   ├─ Name: {}", info.name);
    println!("   ├─ Level: {}", info.level);
    println!(
        "   ├─ Weather: {}",
        info.weather.as_deref().unwrap_or("Default")
    );
    match info.time_of_day {
        Some(tod) => println!("   ├─ Time of day: {tod}"),
        None => println!("   ├─ Time of day: Default"),
    }
    println!("   ├─ Starts paused: {}", info.paused);
    println!("   └─ Road network: {}", if info.network_visualization { "on" } else { "off" });

    println!("\n🚗 Vehicles ({})", info.vehicles.len());
    for (i, vehicle) in info.vehicles.iter().enumerate() {
        let is_last = i == info.vehicles.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} {} ({})", prefix, vehicle.name, vehicle.model);
        if vehicle.sensors.is_empty() {
            println!(
                "   {}  └─ {} classical, {} automation sensors",
                child_prefix, vehicle.classical, vehicle.automation
            );
            continue;
        }

        for (j, sensor) in vehicle.sensors.iter().enumerate() {
            let sensor_prefix = if j == vehicle.sensors.len() - 1 { "└─" } else { "├─" };
            let kind = if sensor.automation { "automation" } else { "classical" };
            let base = sensor
                .base_sensor
                .as_deref()
                .map(|b| format!(", base {b}"))
                .unwrap_or_default();
            let published = if sensor.publishes { ", published" } else { "" };
            println!(
                "   {}  {} {} ({}, {}{}{})",
                child_prefix, sensor_prefix, sensor.name, sensor.sensor_type, kind, base, published
            );
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> ScenarioSpec {
        serde_json::from_str(
            r#"{ "level": "gridmap", "name": "demo", "mode": "paused", "network_visualization": "on",
                 "vehicles": [{ "name": "ego", "model": "etk800",
                   "sensors_classical": [{ "name": "timer", "type": "Timer" }],
                   "sensors_automation": [
                     { "name": "cam", "type": "Camera", "position": [0, 0, 1], "rotation": [0, 0] },
                     { "name": "noise", "type": "RandomImageNoise", "base sensor": "cam" }
                   ] }] }"#,
        )
        .unwrap()
    }

    #[test]
    fn summarises_without_sensor_details() {
        let info = build_scenario_info(&scenario(), &SensorRegistry::with_defaults(), false);
        assert!(info.paused);
        assert!(info.network_visualization);
        assert_eq!(info.vehicles[0].classical, 1);
        assert_eq!(info.vehicles[0].automation, 2);
        assert!(info.vehicles[0].sensors.is_empty());
    }

    #[test]
    fn sensor_details_mark_published_automation_sensors() {
        let info = build_scenario_info(&scenario(), &SensorRegistry::with_defaults(), true);
        let sensors = &info.vehicles[0].sensors;
        let names: Vec<_> = sensors.iter().map(|s| (s.name.as_str(), s.publishes)).collect();
        assert_eq!(names, [("timer", false), ("cam", true), ("noise", true)]);
        assert_eq!(sensors[2].base_sensor.as_deref(), Some("cam"));
    }
}
