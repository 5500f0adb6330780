//! # Sim Client
//!
//! Simulator client module.
//!
//! Responsibilities:
//! - Abstract the engine API behind the `SimClient` trait
//! - Hold vehicle handles and scenario builds before they reach the engine
//! - Map sensor type classes to capabilities (`SensorRegistry`)
//! - Provide a mock engine for tests and offline runs
//!
//! ## Feature Flags
//!
//! - `remote-engine`: Enable the MessagePack-over-TCP engine client

pub mod client;
pub mod error;
pub mod mock_client;
pub mod registry;

#[cfg(feature = "remote-engine")]
pub mod remote_client;

pub use client::{PlacedVehicle, ScenarioBuild, SimClient, VehicleHandle};
pub use error::{Result, SimClientError};
pub use mock_client::{MockConfig, MockRoad, MockSimClient};
pub use registry::{SensorFactory, SensorRegistry};

#[cfg(feature = "remote-engine")]
pub use remote_client::RemoteSimClient;
