//! Body-fixed X-Y-Z Euler angles.
//!
//! Orientations in model files are stored as `xyz_body_rotation`: rotate
//! about X, then the new Y, then the new Z, i.e. `R = Rx(a) * Ry(b) * Rz(c)`.

use nalgebra::{Isometry3, Rotation3, Translation3, UnitQuaternion, Vector3};

/// Below this `1 - |sin(b)|` the decomposition treats `b` as ±90°.
const GIMBAL_EPSILON: f64 = 1e-12;

/// Builds the rotation for body-fixed X-Y-Z angles (radians).
#[must_use]
pub fn rotation_from_body_xyz(angles: &Vector3<f64>) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::x_axis(), angles.x)
        * Rotation3::from_axis_angle(&Vector3::y_axis(), angles.y)
        * Rotation3::from_axis_angle(&Vector3::z_axis(), angles.z)
}

/// Decomposes a rotation into body-fixed X-Y-Z angles (radians).
///
/// At gimbal lock (`b = ±90°`) the Z angle is set to zero.
///
/// # Example
///
/// ```
/// use nalgebra::Vector3;
/// use sim_model::{body_xyz_from_rotation, rotation_from_body_xyz};
///
/// let angles = Vector3::new(0.1, -0.4, 1.2);
/// let back = body_xyz_from_rotation(&rotation_from_body_xyz(&angles));
/// assert!((back - angles).norm() < 1e-12);
/// ```
#[must_use]
pub fn body_xyz_from_rotation(rotation: &Rotation3<f64>) -> Vector3<f64> {
    let m = rotation.matrix();
    let sin_b = m[(0, 2)].clamp(-1.0, 1.0);
    let b = sin_b.asin();
    if 1.0 - sin_b.abs() < GIMBAL_EPSILON {
        let a = m[(2, 1)].atan2(m[(1, 1)]);
        return Vector3::new(a, b, 0.0);
    }
    let a = (-m[(1, 2)]).atan2(m[(2, 2)]);
    let c = (-m[(0, 1)]).atan2(m[(0, 0)]);
    Vector3::new(a, b, c)
}

/// Builds a rigid transform from a translation and body-fixed X-Y-Z angles.
#[must_use]
pub fn transform_from_parts(translation: &Vector3<f64>, body_xyz: &Vector3<f64>) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::from(*translation),
        UnitQuaternion::from_rotation_matrix(&rotation_from_body_xyz(body_xyz)),
    )
}
