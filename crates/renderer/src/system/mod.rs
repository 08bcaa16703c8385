//! Render systems.
//!
//! Each system owns one pipeline and records draws for the slice of the
//! scene it understands.

pub mod mesh;
pub mod point_light;

pub use mesh::MeshRenderSystem;
pub use point_light::PointLightSystem;
