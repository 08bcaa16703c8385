//! Transform component for scene objects.
//!
//! Rotation uses Tait-Bryan angles applied in Y, X, Z order, which keeps
//! yaw/pitch camera math simple.

use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};

/// Position, Euler rotation, and scale of a scene object.
#[derive(Clone, Copy, Debug)]
pub struct Transform {
    /// Position in world space.
    pub translation: Vec3,
    /// Scale factor per axis.
    pub scale: Vec3,
    /// Euler angles in radians, applied Y then X then Z.
    pub rotation: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
        }
    }
}

impl Transform {
    /// Create a new transform at the origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transform with the given translation.
    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    /// Create a transform with the given scale.
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Create a transform with the given Euler rotation.
    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    /// Rotation as a quaternion.
    pub fn rotation_quat(&self) -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            self.rotation.y,
            self.rotation.x,
            self.rotation.z,
        )
    }

    /// The model matrix: translate * rotate(YXZ) * scale.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation_quat(), self.translation)
    }

    /// The normal matrix, the inverse transpose of the model's linear
    /// part: rotation times reciprocal scale.
    ///
    /// A zero scale component would produce infinities; identity is
    /// returned instead.
    pub fn normal_matrix(&self) -> Mat4 {
        const EPSILON: f32 = 1e-6;
        if self.scale.abs().min_element() < EPSILON {
            return Mat4::IDENTITY;
        }

        let linear = Mat3::from_quat(self.rotation_quat()) * Mat3::from_diagonal(self.scale.recip());
        Mat4::from_mat3(linear)
    }

    /// Get the forward direction vector.
    pub fn forward(&self) -> Vec3 {
        self.rotation_quat() * Vec3::NEG_Z
    }

    /// Get the right direction vector.
    pub fn right(&self) -> Vec3 {
        self.rotation_quat() * Vec3::X
    }

    /// Get the up direction vector.
    pub fn up(&self) -> Vec3 {
        self.rotation_quat() * Vec3::Y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < EPSILON
    }

    #[test]
    fn test_transform_default() {
        let t = Transform::default();
        assert_eq!(t.translation, Vec3::ZERO);
        assert_eq!(t.rotation, Vec3::ZERO);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_matrix_translation() {
        let t = Transform::new().with_translation(Vec3::new(1.0, 2.0, 3.0));
        let p = t.matrix().transform_point3(Vec3::ZERO);
        assert!(approx_eq_vec3(p, Vec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_matrix_yaw_quarter_turn() {
        // 90 degree yaw sends +X to -Z
        let t = Transform::new().with_rotation(Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0));
        let p = t.matrix().transform_vector3(Vec3::X);
        assert!(approx_eq_vec3(p, Vec3::NEG_Z), "got {:?}", p);
    }

    #[test]
    fn test_matrix_applies_scale_before_rotation() {
        let t = Transform::new()
            .with_rotation(Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0))
            .with_scale(Vec3::new(2.0, 1.0, 1.0));
        let p = t.matrix().transform_vector3(Vec3::X);
        assert!(approx_eq_vec3(p, Vec3::new(0.0, 0.0, -2.0)), "got {:?}", p);
    }

    #[test]
    fn test_normal_matrix_matches_inverse_transpose() {
        let t = Transform::new()
            .with_rotation(Vec3::new(0.3, 1.1, -0.4))
            .with_scale(Vec3::new(1.0, 2.0, 4.0));

        let expected = t.matrix().inverse().transpose();
        let normal = t.normal_matrix();

        for col in 0..3 {
            let a = normal.col(col).truncate();
            let b = expected.col(col).truncate();
            assert!((a - b).length() < 1e-4, "column {} differs", col);
        }
    }

    #[test]
    fn test_normal_matrix_zero_scale_fallback() {
        let t = Transform::new().with_scale(Vec3::ZERO);
        assert_eq!(t.normal_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_direction_vectors() {
        let t = Transform::default();
        assert!(approx_eq_vec3(t.forward(), Vec3::NEG_Z));
        assert!(approx_eq_vec3(t.right(), Vec3::X));
        assert!(approx_eq_vec3(t.up(), Vec3::Y));
    }
}
