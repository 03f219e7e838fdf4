//! Rigid transform with a plain serializable layout.
//!
//! Stored as translation `[x, y, z]` and unit quaternion `[x, y, z, w]`;
//! math goes through `nalgebra::Isometry3<f64>`.

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: [f64; 3],
    /// Quaternion as [x, y, z, w]
    pub rotation: [f64; 4],
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    pub fn from_translation(translation: [f64; 3]) -> Self {
        Self {
            translation,
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Roll-pitch-yaw (fixed X-Y-Z axes) plus translation
    pub fn from_xyz_rpy(xyz: [f64; 3], rpy: [f64; 3]) -> Self {
        let rotation = UnitQuaternion::from_euler_angles(rpy[0], rpy[1], rpy[2]);
        Self::from_isometry(&Isometry3::from_parts(
            Translation3::new(xyz[0], xyz[1], xyz[2]),
            rotation,
        ))
    }

    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        let q = iso.rotation.quaternion();
        Self {
            translation: [iso.translation.x, iso.translation.y, iso.translation.z],
            rotation: [q.i, q.j, q.k, q.w],
        }
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        let [x, y, z, w] = self.rotation;
        Isometry3::from_parts(
            Translation3::new(self.translation[0], self.translation[1], self.translation[2]),
            UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)),
        )
    }

    /// `self * other`: express `other` (given in self's child frame) in self's parent frame
    pub fn compose(&self, other: &Transform) -> Transform {
        Self::from_isometry(&(self.to_isometry() * other.to_isometry()))
    }

    pub fn inverse(&self) -> Transform {
        Self::from_isometry(&self.to_isometry().inverse())
    }

    pub fn transform_point(&self, point: [f64; 3]) -> [f64; 3] {
        let p = self
            .to_isometry()
            .transform_point(&nalgebra::Point3::new(point[0], point[1], point[2]));
        [p.x, p.y, p.z]
    }

    /// Linear translation and spherical rotation interpolation, `t` in [0, 1]
    pub fn interpolate(&self, other: &Transform, t: f64) -> Transform {
        let t = t.clamp(0.0, 1.0);
        Self::from_isometry(&self.to_isometry().lerp_slerp(&other.to_isometry(), t))
    }

    pub fn translation_vector(&self) -> Vector3<f64> {
        Vector3::new(self.translation[0], self.translation[1], self.translation[2])
    }

    pub fn is_identity(&self, epsilon: f64) -> bool {
        let iso = self.to_isometry();
        iso.translation.vector.norm() <= epsilon && iso.rotation.angle() <= epsilon
    }
}

impl From<Isometry3<f64>> for Transform {
    fn from(iso: Isometry3<f64>) -> Self {
        Self::from_isometry(&iso)
    }
}

impl From<Transform> for Isometry3<f64> {
    fn from(tf: Transform) -> Self {
        tf.to_isometry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_compose_then_inverse_is_identity() {
        let a = Transform::from_xyz_rpy([1.0, -2.0, 0.5], [0.3, -0.2, 1.1]);
        let round = a.compose(&a.inverse());
        assert!(round.is_identity(1e-12));
    }

    #[test]
    fn test_rotation_about_z_moves_point() {
        let tf = Transform::from_xyz_rpy([0.0, 0.0, 1.0], [0.0, 0.0, FRAC_PI_2]);
        let p = tf.transform_point([1.0, 0.0, 0.0]);
        assert_relative_eq!(p[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(p[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(p[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_interpolate_midpoint() {
        let a = Transform::identity();
        let b = Transform::from_translation([2.0, 0.0, 0.0]);
        let mid = a.interpolate(&b, 0.5);
        assert_relative_eq!(mid.translation[0], 1.0, epsilon = 1e-12);
    }
}
