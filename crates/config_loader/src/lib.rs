//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse the bridge settings file (TOML/JSON)
//! - Resolve document paths, falling back to the package root
//! - Merge sensor-definition documents into a `SensorDefinitionCatalog`
//! - Load and validate scenario / vehicle documents
//!
//! # Example
//!
//! ```no_run
//! use config_loader::DocumentResolver;
//! use std::path::PathBuf;
//!
//! let resolver = DocumentResolver::new(None);
//! let catalog = resolver
//!     .load_catalog(&[PathBuf::from("config/sensors.json")])
//!     .unwrap();
//! println!("{} sensor types", catalog.len());
//! ```

mod parser;
mod validator;

pub use parser::ConfigFormat;
pub use validator::{
    validate_scenario, validate_sensor_mount, validate_settings, validate_vehicle_sensors,
};

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use contracts::{
    BridgeSettings, ContractError, ScenarioSpec, SensorDefinition, SensorDefinitionCatalog,
    VehicleSpec,
};
use tracing::{debug, info, instrument};

/// Settings loader
///
/// Provides static methods to load the bridge settings from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load settings from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<BridgeSettings, ContractError> {
        let format = Self::detect_format(path)?;
        let content = read_document(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load settings from string
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<BridgeSettings, ContractError> {
        let settings: BridgeSettings = parser::parse(content, format)?;
        validator::validate_settings(&settings)?;
        Ok(settings)
    }

    /// Serialize settings to TOML string
    pub fn to_toml(settings: &BridgeSettings) -> Result<String, ContractError> {
        toml::to_string_pretty(settings)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}

/// Resolves and loads the JSON documents the bridge consumes at runtime
///
/// A path is used as given when it names an existing file; otherwise it is
/// looked up relative to the package root.
#[derive(Debug, Clone, Default)]
pub struct DocumentResolver {
    package_root: Option<PathBuf>,
}

impl DocumentResolver {
    pub fn new(package_root: Option<PathBuf>) -> Self {
        Self { package_root }
    }

    pub fn package_root(&self) -> Option<&Path> {
        self.package_root.as_deref()
    }

    /// Resolve a document path
    ///
    /// # Errors
    /// `ConfigNotFound` when neither the given path nor the package-relative
    /// path names a file.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf, ContractError> {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }

        if let Some(root) = &self.package_root {
            // Absolute paths are re-rooted under the package
            let relative: PathBuf = path
                .components()
                .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
                .collect();
            let candidate = root.join(relative);
            if candidate.is_file() {
                debug!(path = %path.display(), resolved = %candidate.display(), "Resolved package-relative path");
                return Ok(candidate);
            }
        }

        Err(ContractError::ConfigNotFound {
            path: path.display().to_string(),
        })
    }

    /// Load and merge sensor-definition documents in order
    ///
    /// On key collision the later document wins.
    #[instrument(name = "load_sensor_catalog", skip(self, paths), fields(documents = paths.len()))]
    pub fn load_catalog(&self, paths: &[PathBuf]) -> Result<SensorDefinitionCatalog, ContractError> {
        let mut layers = Vec::with_capacity(paths.len());
        for path in paths {
            let resolved = self.resolve(path)?;
            let layer: BTreeMap<String, SensorDefinition> =
                parser::parse_json(&read_document(&resolved)?)?;
            debug!(path = %resolved.display(), definitions = layer.len(), "Loaded sensor definitions");
            layers.push(layer);
        }

        let catalog = SensorDefinitionCatalog::from_layers(layers);
        info!(definitions = catalog.len(), "Sensor catalog ready");
        Ok(catalog)
    }

    /// Load and validate a scenario document
    #[instrument(name = "load_scenario", skip(self), fields(path = %path.display()))]
    pub fn load_scenario(&self, path: &Path) -> Result<ScenarioSpec, ContractError> {
        let resolved = self.resolve(path)?;
        let scenario: ScenarioSpec = parser::parse_json(&read_document(&resolved)?)?;
        validator::validate_scenario(&scenario)?;
        Ok(scenario)
    }

    /// Load a vehicle-config document (pose comes from the caller)
    #[instrument(name = "load_vehicle", skip(self), fields(path = %path.display()))]
    pub fn load_vehicle(&self, path: &Path) -> Result<VehicleSpec, ContractError> {
        let resolved = self.resolve(path)?;
        let vehicle: VehicleSpec = parser::parse_json(&read_document(&resolved)?)?;
        validator::validate_vehicle_sensors(&vehicle)?;
        Ok(vehicle)
    }
}

fn read_document(path: &Path) -> Result<String, ContractError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ContractError::ConfigNotFound {
            path: path.display().to_string(),
        },
        _ => ContractError::Io(e),
    })
}
