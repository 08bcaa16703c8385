//! Camera with cached view and projection matrices.

use glam::{EulerRot, Mat4, Quat, Vec3};

/// A camera for rendering the scene.
///
/// Stores the projection, view, and inverse view matrices; the setters
/// recompute them. The projection uses the Vulkan convention (Y flipped
/// relative to OpenGL).
#[derive(Clone, Debug)]
pub struct Camera {
    projection: Mat4,
    view: Mat4,
    inverse_view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            inverse_view: Mat4::IDENTITY,
        }
    }
}

impl Camera {
    /// Create a camera with identity matrices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a perspective projection.
    ///
    /// `fov_y` is the vertical field of view in radians.
    pub fn set_perspective_projection(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        let mut proj = Mat4::perspective_rh(fov_y, aspect, near, far);
        // Flip Y for Vulkan coordinate system
        proj.y_axis.y *= -1.0;
        self.projection = proj;
    }

    /// Set an orthographic projection.
    pub fn set_orthographic_projection(
        &mut self,
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) {
        let mut proj = Mat4::orthographic_rh(left, right, bottom, top, near, far);
        proj.y_axis.y *= -1.0;
        self.projection = proj;
    }

    /// Point the camera along `direction` from `position`.
    pub fn set_view_direction(&mut self, position: Vec3, direction: Vec3, up: Vec3) {
        self.view = Mat4::look_to_rh(position, direction, up);
        self.inverse_view = self.view.inverse();
    }

    /// Point the camera at `target` from `position`.
    pub fn set_view_target(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.set_view_direction(position, target - position, up);
    }

    /// Place the camera at `position` with Euler angles applied in
    /// Y, X, Z order, matching [`crate::Transform`].
    pub fn set_view_yxz(&mut self, position: Vec3, rotation: Vec3) {
        let rot = Quat::from_euler(EulerRot::YXZ, rotation.y, rotation.x, rotation.z);
        self.inverse_view = Mat4::from_rotation_translation(rot, position);
        self.view = self.inverse_view.inverse();
    }

    /// The projection matrix.
    #[inline]
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// The view matrix.
    #[inline]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// The inverse view matrix (camera-to-world).
    #[inline]
    pub fn inverse_view(&self) -> Mat4 {
        self.inverse_view
    }

    /// Camera position in world space.
    #[inline]
    pub fn eye_position(&self) -> Vec3 {
        self.inverse_view.w_axis.truncate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    #[test]
    fn test_default_is_identity() {
        let camera = Camera::new();
        assert_eq!(camera.projection(), Mat4::IDENTITY);
        assert_eq!(camera.view(), Mat4::IDENTITY);
        assert_eq!(camera.eye_position(), Vec3::ZERO);
    }

    #[test]
    fn test_eye_position_tracks_view_yxz() {
        let mut camera = Camera::new();
        let position = Vec3::new(1.0, -2.0, 4.0);
        camera.set_view_yxz(position, Vec3::new(0.2, 0.7, 0.0));
        assert!((camera.eye_position() - position).length() < EPSILON);
    }

    #[test]
    fn test_view_yxz_zero_rotation_translates_only() {
        let mut camera = Camera::new();
        camera.set_view_yxz(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);

        // A point at the camera position maps to the view-space origin
        let p = camera.view().transform_point3(Vec3::new(0.0, 0.0, 5.0));
        assert!(p.length() < EPSILON);

        // The world origin sits 5 units in front (view space -Z)
        let origin = camera.view().transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(0.0, 0.0, -5.0)).length() < EPSILON);
    }

    #[test]
    fn test_view_target_looks_at_target() {
        let mut camera = Camera::new();
        camera.set_view_target(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);

        let target = camera.view().transform_point3(Vec3::ZERO);
        // Target lies on the -Z axis in view space
        assert!(target.x.abs() < EPSILON);
        assert!(target.y.abs() < EPSILON);
        assert!(target.z < 0.0);
    }

    #[test]
    fn test_perspective_flips_y() {
        let mut camera = Camera::new();
        camera.set_perspective_projection(std::f32::consts::FRAC_PI_4, 16.0 / 9.0, 0.1, 100.0);
        assert!(camera.projection().y_axis.y > 0.0);
    }

    #[test]
    fn test_inverse_view_is_inverse() {
        let mut camera = Camera::new();
        camera.set_view_yxz(Vec3::new(3.0, 1.0, -2.0), Vec3::new(0.1, 0.5, 0.0));

        let product = camera.view() * camera.inverse_view();
        for col in 0..4 {
            let diff = product.col(col) - Mat4::IDENTITY.col(col);
            assert!(diff.length() < EPSILON);
        }
    }
}
