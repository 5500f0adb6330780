//! Simulator client error types

use contracts::{ContractError, SensorHandle};
use thiserror::Error;

/// Simulator client specific error
#[derive(Debug, Error)]
pub enum SimClientError {
    /// No open connection
    #[error("not connected to the simulator")]
    NotConnected,

    /// Connection could not be established or was lost
    #[error("failed to connect to the simulator: {message}")]
    ConnectionFailed { message: String },

    /// Engine could not confirm a state change (pause/resume)
    #[error("simulator could not confirm '{operation}': {message}")]
    Unconfirmed { operation: String, message: String },

    /// Engine rejected a request
    #[error("simulator request '{operation}' failed: {message}")]
    RequestFailed { operation: String, message: String },

    /// Vehicle id not present in the running scenario
    #[error("unknown vehicle '{vehicle_id}'")]
    UnknownVehicle { vehicle_id: String },

    /// Sensor handle not attached
    #[error("unknown sensor handle {handle}")]
    UnknownSensor { handle: SensorHandle },

    /// Malformed frame or payload on the wire
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl SimClientError {
    /// Create request failure
    pub fn request(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create unconfirmed state change error
    pub fn unconfirmed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unconfirmed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn is_unconfirmed(&self) -> bool {
        matches!(self, Self::Unconfirmed { .. })
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, SimClientError>;
