//! # Contracts
//!
//! Shared interface contracts for the simulation bridge: configuration
//! documents, engine-facing value types, service requests/responses and the
//! publications emitted by the publish loop.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Publications are stamped with wall-clock UTC at the start of each publish tick
//! - Engine timing is owned by the simulator; the bridge only requests steps

mod catalog;
mod engine;
mod error;
mod geometry;
mod publication;
mod scenario;
mod services;
mod settings;
mod sink;

pub use catalog::*;
pub use engine::*;
pub use error::*;
pub use geometry::*;
pub use publication::*;
pub use scenario::*;
pub use services::*;
pub use settings::*;
pub use sink::*;

/// Node name used as the prefix of service names and publication topics.
pub const NODE_NAME: &str = "sim_bridge";
