//! `validate` command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use bridge::SensorAssembler;
use config_loader::DocumentResolver;
use contracts::{ContractError, SensorDefinitionCatalog};
use serde::Serialize;
use sim_client::SensorRegistry;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::commands::{load_settings, resolver};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    catalog: Option<CatalogSummary>,
    scenarios: Vec<ScenarioResult>,
}

#[derive(Serialize)]
struct CatalogSummary {
    documents: usize,
    definitions: usize,
}

#[derive(Serialize)]
struct ScenarioResult {
    path: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(scenarios = args.scenarios.len(), "Validating configuration");

    let result = validate(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate(args: &ValidateArgs) -> ValidationResult {
    let invalid = |error: String| ValidationResult {
        valid: false,
        error: Some(error),
        catalog: None,
        scenarios: Vec::new(),
    };

    let settings = match load_settings(&args.documents) {
        Ok(settings) => settings,
        Err(e) => return invalid(e.to_string()),
    };
    let resolver = resolver(&settings);
    let registry = SensorRegistry::with_defaults();
    let catalog = match resolver
        .load_catalog(&settings.sensor_paths)
        .and_then(|catalog| registry.validate_catalog(&catalog).map(|()| catalog))
    {
        Ok(catalog) => catalog,
        Err(e) => return invalid(e.to_string()),
    };

    let scenarios: Vec<ScenarioResult> = args
        .scenarios
        .iter()
        .map(|path| validate_scenario(&resolver, &registry, &catalog, path))
        .collect();

    ValidationResult {
        valid: scenarios.iter().all(|s| s.valid),
        error: None,
        catalog: Some(CatalogSummary {
            documents: settings.sensor_paths.len(),
            definitions: catalog.len(),
        }),
        scenarios,
    }
}

fn validate_scenario(
    resolver: &DocumentResolver,
    registry: &SensorRegistry,
    catalog: &SensorDefinitionCatalog,
    path: &Path,
) -> ScenarioResult {
    let checked = resolver.load_scenario(path).and_then(|scenario| {
        let assembler = SensorAssembler::new(registry, catalog);
        for vehicle in &scenario.vehicles {
            assembler.check_vehicle(vehicle)?;
        }
        Ok::<_, ContractError>(scenario)
    });

    match checked {
        Ok(scenario) => {
            let mut warnings = Vec::new();
            for vehicle in &scenario.vehicles {
                if vehicle.sensors_classical.is_empty() && vehicle.sensors_automation.is_empty() {
                    warnings.push(format!("Vehicle '{}' has no sensors", vehicle.name));
                }
            }
            if scenario.vehicles.is_empty() {
                warnings.push("Scenario has no vehicles".to_string());
            }
            ScenarioResult {
                path: path.display().to_string(),
                valid: true,
                error: None,
                warnings,
            }
        }
        Err(e) => ScenarioResult {
            path: path.display().to_string(),
            valid: false,
            error: Some(e.to_string()),
            warnings: Vec::new(),
        },
    }
}

fn print_validation_result(result: &ValidationResult) {
    if let Some(ref error) = result.error {
        println!("✗ Configuration is invalid");
        println!("\n  Error: {}", error);
        return;
    }

    if let Some(ref catalog) = result.catalog {
        println!(
            "✓ Sensor catalog: {} definitions from {} documents",
            catalog.definitions, catalog.documents
        );
    }

    for scenario in &result.scenarios {
        if scenario.valid {
            println!("✓ Scenario is valid: {}", scenario.path);
            for warning in &scenario.warnings {
                println!("  ⚠ {}", warning);
            }
        } else {
            println!("✗ Scenario is invalid: {}", scenario.path);
            if let Some(ref error) = scenario.error {
                println!("  Error: {}", error);
            }
        }
    }
}
