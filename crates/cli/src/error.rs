//! Error types for CLI operations.

use bridge::BridgeError;
use contracts::ContractError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Settings file named on the command line does not exist
    #[error("Settings file not found: {path}")]
    SettingsNotFound { path: String },

    /// Settings, catalog or scenario document error
    #[error(transparent)]
    Config(#[from] ContractError),

    /// Bridge startup or runtime error
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Binary built without an engine client able to reach a simulator
    #[cfg_attr(feature = "remote-engine", allow(dead_code))]
    #[error("Remote engine support is not compiled in; rebuild with the `remote-engine` feature or pass --mock")]
    RemoteEngineUnavailable,
}

impl CliError {
    pub fn settings_not_found(path: impl Into<String>) -> Self {
        Self::SettingsNotFound { path: path.into() }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
