//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_bridge;
pub use validate::run_validate;

use config_loader::{ConfigLoader, DocumentResolver};
use contracts::BridgeSettings;
use tracing::{debug, info};

use crate::cli::DocumentArgs;
use crate::error::{CliError, Result};

/// Load the settings file (or defaults) and apply the document overrides
pub(crate) fn load_settings(args: &DocumentArgs) -> Result<BridgeSettings> {
    let mut settings = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::settings_not_found(path.display().to_string()));
            }
            info!(config = %path.display(), "Loading settings");
            ConfigLoader::load_from_path(path)?
        }
        None => {
            debug!("No settings file given, using defaults");
            BridgeSettings::default()
        }
    };

    if !args.sensor_paths.is_empty() {
        info!(paths = ?args.sensor_paths, "Overriding sensor catalog paths from CLI");
        settings.sensor_paths = args.sensor_paths.clone();
    }
    if let Some(root) = &args.package_root {
        settings.package_root = Some(root.clone());
    }
    Ok(settings)
}

pub(crate) fn resolver(settings: &BridgeSettings) -> DocumentResolver {
    DocumentResolver::new(settings.package_root.clone())
}
