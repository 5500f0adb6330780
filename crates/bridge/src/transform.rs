//! Static mount transforms of automation sensors
//!
//! Orientation is built from the first two mount angles, as
//! `normalize(alignment * from_euler(0, a0, a1))`; a third angle is ignored.

use contracts::{ContractError, Quaternion, StaticMountTransform, Vector3};
use nalgebra::{Quaternion as RawQuaternion, UnitQuaternion};

/// Alignment applied to every mount orientation, (x, y, z, w)
pub const ALIGNMENT: [f64; 4] = [0.0, 0.0, 0.0, 1.0];

/// Child frame id of a mounted sensor
pub fn child_frame(vehicle_id: &str, sensor_name: &str) -> String {
    format!("{vehicle_id}_{sensor_name}")
}

/// Unit orientation from mount angles `[a0, a1, (ignored)...]`
pub fn mount_orientation(angles: &[f64]) -> Result<Quaternion, ContractError> {
    let (a0, a1) = match angles {
        [a0, a1, ..] if a0.is_finite() && a1.is_finite() => (*a0, *a1),
        [_, _, ..] => {
            return Err(ContractError::config_validation(
                "rotation",
                "mount angles must be finite",
            ))
        }
        _ => {
            return Err(ContractError::config_validation(
                "rotation",
                format!("expected at least 2 angles, got {}", angles.len()),
            ))
        }
    };

    let [x, y, z, w] = ALIGNMENT;
    let alignment = RawQuaternion::new(w, x, y, z);
    let euler = UnitQuaternion::from_euler_angles(0.0, a0, a1);
    let q = UnitQuaternion::from_quaternion(alignment * euler.into_inner());

    Ok(Quaternion {
        x: q.i,
        y: q.j,
        z: q.k,
        w: q.w,
    })
}

/// Build the static transform of one sensor
///
/// Translation is passed through unchanged.
pub fn mount_transform(
    vehicle_id: &str,
    sensor_name: &str,
    position: &[f64],
    angles: &[f64],
) -> Result<StaticMountTransform, ContractError> {
    let translation = match position {
        [x, y, z] => Vector3::new(*x, *y, *z),
        _ => {
            return Err(ContractError::config_validation(
                format!("{vehicle_id}.{sensor_name}.position"),
                format!("expected 3 numbers, got {}", position.len()),
            ))
        }
    };

    Ok(StaticMountTransform {
        parent_frame: vehicle_id.to_string(),
        child_frame: child_frame(vehicle_id, sensor_name),
        translation,
        rotation: mount_orientation(angles)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-9;

    #[test]
    fn zero_angles_give_identity() {
        let q = mount_orientation(&[0.0, 0.0]).unwrap();
        assert!((q.w - 1.0).abs() < EPS);
        assert!(q.x.abs() < EPS && q.y.abs() < EPS && q.z.abs() < EPS);
    }

    #[test]
    fn orientation_is_unit_norm() {
        for angles in [[0.3, -1.2], [3.0, 2.5], [-0.7, 0.01], [10.0, -20.0]] {
            let q = mount_orientation(&angles).unwrap();
            assert!((q.norm() - 1.0).abs() < EPS, "angles {angles:?} -> {q:?}");
        }
    }

    #[test]
    fn yaw_input_never_changes_orientation() {
        let base = mount_orientation(&[0.4, -0.9]).unwrap();
        for yaw in [0.0, 1.0, -2.5, 100.0] {
            assert_eq!(mount_orientation(&[0.4, -0.9, yaw]).unwrap(), base);
        }
    }

    #[test]
    fn second_angle_rotates_about_z() {
        // from_euler(0, 0, pi/2): rotation of pi/2 about z
        let q = mount_orientation(&[0.0, FRAC_PI_2]).unwrap();
        let half = (FRAC_PI_2 / 2.0).sin();
        assert!((q.z - half).abs() < EPS);
        assert!((q.w - half).abs() < EPS);
    }

    #[test]
    fn short_angles_rejected() {
        assert!(mount_orientation(&[0.5]).is_err());
        assert!(mount_orientation(&[]).is_err());
        assert!(mount_orientation(&[f64::NAN, 0.0]).is_err());
    }

    #[test]
    fn transform_frames_and_translation() {
        let t = mount_transform("ego", "front_cam", &[0.1, 2.0, 1.5], &[0.0, 0.0, 0.0]).unwrap();
        assert_eq!(t.parent_frame, "ego");
        assert_eq!(t.child_frame, "ego_front_cam");
        assert_eq!(t.translation, Vector3::new(0.1, 2.0, 1.5));
        assert!(mount_transform("ego", "cam", &[0.0, 0.0], &[0.0, 0.0]).is_err());
    }
}
