//! Keyboard-driven camera movement.

use glam::Vec3;
use meshview_platform::{InputState, KeyCode};

use crate::transform::Transform;

/// First-person style controller driving a [`Transform`] from keyboard
/// state.
///
/// WASD moves in the yaw plane, E/Q move up and down, the arrow keys
/// look around. The controller holds no input itself; the caller passes
/// the frame's [`InputState`].
#[derive(Clone, Copy, Debug)]
pub struct KeyboardController {
    /// Movement speed in units per second.
    pub move_speed: f32,
    /// Look speed in radians per second.
    pub look_speed: f32,
}

// Just shy of straight up/down to keep the yaw plane well defined
const PITCH_LIMIT: f32 = 1.5;

impl Default for KeyboardController {
    fn default() -> Self {
        Self {
            move_speed: 3.0,
            look_speed: 1.5,
        }
    }
}

impl KeyboardController {
    /// Create a controller with the default speeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one frame of movement to `transform`.
    pub fn update(&self, input: &InputState, dt: f32, transform: &mut Transform) {
        let mut rotate = Vec3::ZERO;
        if input.is_key_pressed(KeyCode::ArrowRight) {
            rotate.y -= 1.0;
        }
        if input.is_key_pressed(KeyCode::ArrowLeft) {
            rotate.y += 1.0;
        }
        if input.is_key_pressed(KeyCode::ArrowUp) {
            rotate.x += 1.0;
        }
        if input.is_key_pressed(KeyCode::ArrowDown) {
            rotate.x -= 1.0;
        }

        if rotate.length_squared() > f32::EPSILON {
            transform.rotation += self.look_speed * dt * rotate.normalize();
        }

        transform.rotation.x = transform.rotation.x.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        transform.rotation.y = transform.rotation.y.rem_euclid(std::f32::consts::TAU);

        let yaw = transform.rotation.y;
        let forward = Vec3::new(-yaw.sin(), 0.0, -yaw.cos());
        let right = Vec3::new(forward.z, 0.0, -forward.x);
        let up = Vec3::Y;

        let mut movement = Vec3::ZERO;
        if input.is_key_pressed(KeyCode::KeyW) {
            movement += forward;
        }
        if input.is_key_pressed(KeyCode::KeyS) {
            movement -= forward;
        }
        if input.is_key_pressed(KeyCode::KeyD) {
            movement += right;
        }
        if input.is_key_pressed(KeyCode::KeyA) {
            movement -= right;
        }
        if input.is_key_pressed(KeyCode::KeyE) {
            movement += up;
        }
        if input.is_key_pressed(KeyCode::KeyQ) {
            movement -= up;
        }

        if movement.length_squared() > f32::EPSILON {
            transform.translation += self.move_speed * dt * movement.normalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_movement_follows_yaw() {
        let controller = KeyboardController::new();
        let mut input = InputState::new();
        let mut transform = Transform::default();

        input.on_key_pressed(KeyCode::KeyW);
        controller.update(&input, 1.0, &mut transform);

        // Zero yaw faces -Z
        let expected = Vec3::new(0.0, 0.0, -controller.move_speed);
        assert!((transform.translation - expected).length() < 1e-5);
    }

    #[test]
    fn test_no_input_no_motion() {
        let controller = KeyboardController::new();
        let input = InputState::new();
        let mut transform = Transform::default();

        controller.update(&input, 0.16, &mut transform);
        assert_eq!(transform.translation, Vec3::ZERO);
        assert_eq!(transform.rotation, Vec3::ZERO);
    }

    #[test]
    fn test_diagonal_movement_is_normalized() {
        let controller = KeyboardController::new();
        let mut input = InputState::new();
        let mut transform = Transform::default();

        input.on_key_pressed(KeyCode::KeyW);
        input.on_key_pressed(KeyCode::KeyD);
        controller.update(&input, 1.0, &mut transform);

        assert!((transform.translation.length() - controller.move_speed).abs() < 1e-4);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let controller = KeyboardController::new();
        let mut input = InputState::new();
        let mut transform = Transform::default();

        input.on_key_pressed(KeyCode::ArrowUp);
        for _ in 0..100 {
            controller.update(&input, 0.1, &mut transform);
        }

        assert!(transform.rotation.x <= PITCH_LIMIT + 1e-6);
    }

    #[test]
    fn test_yaw_wraps_around() {
        let controller = KeyboardController::new();
        let mut input = InputState::new();
        let mut transform = Transform::default();

        input.on_key_pressed(KeyCode::ArrowLeft);
        for _ in 0..200 {
            controller.update(&input, 0.1, &mut transform);
        }

        assert!(transform.rotation.y >= 0.0);
        assert!(transform.rotation.y < std::f32::consts::TAU);
    }
}
