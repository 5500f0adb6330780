//! Layered error definitions
//!
//! Categorized by source: config / engine / sensor / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Referenced document does not exist
    #[error("config file not found: {path}")]
    ConfigNotFound { path: String },

    /// Sensor type with no registered factory or catalog entry
    #[error("unknown sensor type '{sensor_type}': {message}")]
    UnknownSensorType {
        sensor_type: String,
        message: String,
    },

    // ===== Engine Errors =====
    /// Engine connection error
    #[error("engine connection error: {message}")]
    EngineConnection { message: String },

    /// Engine version below the supported minimum
    #[error("engine version {available} is below the required minimum {required}")]
    EngineVersion { required: String, available: String },

    /// Engine could not confirm a state change
    #[error("engine could not confirm '{operation}': {message}")]
    EngineUnconfirmed { operation: String, message: String },

    // ===== Sensor Errors =====
    /// Derived sensor references a base sensor that is not attached
    #[error(
        "could not find sensor with id '{base_sensor}' on vehicle '{vehicle_id}' \
         to generate derived sensor of type '{sensor_type}'"
    )]
    SensorResolution {
        vehicle_id: String,
        base_sensor: String,
        sensor_type: String,
    },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create unknown sensor type error
    pub fn unknown_sensor_type(sensor_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnknownSensorType {
            sensor_type: sensor_type.into(),
            message: message.into(),
        }
    }

    /// Create engine unconfirmed error
    pub fn engine_unconfirmed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EngineUnconfirmed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create sensor resolution error
    pub fn sensor_resolution(
        vehicle_id: impl Into<String>,
        base_sensor: impl Into<String>,
        sensor_type: impl Into<String>,
    ) -> Self {
        Self::SensorResolution {
            vehicle_id: vehicle_id.into(),
            base_sensor: base_sensor.into(),
            sensor_type: sensor_type.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// True for errors caused by configuration or request shape
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse { .. }
                | Self::ConfigValidation { .. }
                | Self::ConfigNotFound { .. }
                | Self::UnknownSensorType { .. }
        )
    }
}
