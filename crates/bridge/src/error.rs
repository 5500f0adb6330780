//! Bridge error types

use contracts::ContractError;
use sim_client::SimClientError;
use thiserror::Error;

/// Bridge-level errors
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration, document or request shape error
    #[error(transparent)]
    Config(#[from] ContractError),

    /// Engine call failed
    #[error(transparent)]
    Engine(#[from] SimClientError),

    /// Engine is unusable (connection refused, unsupported version)
    #[error("fatal engine error: {message}")]
    EngineFatal { message: String },

    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn engine_fatal(message: impl Into<String>) -> Self {
        Self::EngineFatal {
            message: message.into(),
        }
    }

    /// Errors reported as success=false rather than an error reply
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(e) if e.is_config())
    }

    /// Engine could not confirm a pause/resume
    pub fn is_unconfirmed(&self) -> bool {
        match self {
            Self::Engine(e) => e.is_unconfirmed(),
            Self::Config(ContractError::EngineUnconfirmed { .. }) => true,
            _ => false,
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, BridgeError>;
