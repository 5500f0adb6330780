//! Geometry primitives shared by transforms, vehicle state and service requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 3D vector (meters or m/s depending on context)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl From<[f64; 3]> for Vector3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

/// Quaternion in (x, y, z, w) order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<[f64; 4]> for Quaternion {
    fn from([x, y, z, w]: [f64; 4]) -> Self {
        Self { x, y, z, w }
    }
}

/// Fixed parent -> child rigid transform of a mounted sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticMountTransform {
    /// Vehicle id
    pub parent_frame: String,

    /// `{vehicle_id}_{sensor_name}`
    pub child_frame: String,

    /// Mount position in the vehicle-local frame
    pub translation: Vector3,

    /// Mount orientation (unit quaternion)
    pub rotation: Quaternion,
}

/// Static transform stamped for one broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampedTransform {
    pub stamp: DateTime<Utc>,
    pub transform: StaticMountTransform,
}

impl StaticMountTransform {
    /// Stamp a copy for broadcasting
    pub fn stamped(&self, stamp: DateTime<Utc>) -> StampedTransform {
        StampedTransform {
            stamp,
            transform: self.clone(),
        }
    }
}
