//! Scene objects and components.
//!
//! This crate provides scene management:
//! - Transforms with Y-X-Z Euler rotation
//! - Camera and keyboard camera controller
//! - Game object arena and light components

pub mod camera;
pub mod controller;
pub mod light;
pub mod object;
pub mod transform;

pub use camera::Camera;
pub use controller::KeyboardController;
pub use light::PointLightComponent;
pub use object::{GameObject, GameObjectId, GameObjectMap, MeshId};
pub use transform::Transform;
