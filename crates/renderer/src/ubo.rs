//! Uniform buffer object definitions for shaders.
//!
//! These structures must match the GLSL uniform block layouts exactly,
//! including padding. Keep `SIZE` constants in sync with the shaders.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

/// Maximum number of point lights the global UBO can carry.
///
/// Must match `MAX_LIGHTS` in the shaders.
pub const MAX_LIGHTS: usize = 10;

/// One point light as the shaders see it.
///
/// The light color's `w` component carries the intensity.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PointLightUniform {
    /// World-space position (`w` unused).
    pub position: Vec4,
    /// Light color with intensity in `w`.
    pub color: Vec4,
}

impl PointLightUniform {
    /// Size in bytes as laid out in the shader.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Per-frame global uniforms, bound once at set 0 binding 0.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GlobalUbo {
    /// Camera projection matrix (Vulkan clip space, Y flipped).
    pub projection: Mat4,
    /// Camera view matrix.
    pub view: Mat4,
    /// Inverse view matrix; its translation column is the eye position.
    pub inverse_view: Mat4,
    /// Ambient light color with intensity in `w`.
    pub ambient_light_color: Vec4,
    /// Active point lights; only the first `num_lights` entries are valid.
    pub point_lights: [PointLightUniform; MAX_LIGHTS],
    /// Number of valid entries in `point_lights`.
    pub num_lights: u32,
    /// Explicit padding to keep the struct free of implicit padding.
    pub _padding: [u32; 3],
}

impl GlobalUbo {
    /// Size in bytes as laid out in the shader.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

impl Default for GlobalUbo {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            inverse_view: Mat4::IDENTITY,
            ambient_light_color: Vec4::new(1.0, 1.0, 1.0, 0.02),
            point_lights: [PointLightUniform::default(); MAX_LIGHTS],
            num_lights: 0,
            _padding: [0; 3],
        }
    }
}

/// Push constants for the mesh pipeline.
///
/// 128 bytes, the minimum `maxPushConstantsSize` every device supports.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshPushConstants {
    /// Object-to-world matrix.
    pub model_matrix: Mat4,
    /// Normal matrix, padded to a `Mat4` for std430 layout.
    pub normal_matrix: Mat4,
}

impl MeshPushConstants {
    /// Size in bytes as laid out in the shader.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Push constants for the point light billboard pipeline.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PointLightPushConstants {
    /// World-space light position (`w` unused).
    pub position: Vec4,
    /// Light color with intensity in `w`.
    pub color: Vec4,
    /// Billboard radius in world units.
    pub radius: f32,
    /// Explicit padding to keep the struct free of implicit padding.
    pub _padding: [f32; 3],
}

impl PointLightPushConstants {
    /// Size in bytes as laid out in the shader.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_light_uniform_size() {
        assert_eq!(PointLightUniform::SIZE, 32);
    }

    #[test]
    fn test_global_ubo_size() {
        // 3 matrices + ambient + light array + count and padding
        let expected = 3 * 64 + 16 + MAX_LIGHTS * 32 + 16;
        assert_eq!(GlobalUbo::SIZE, expected);
    }

    #[test]
    fn test_global_ubo_alignment() {
        assert_eq!(std::mem::align_of::<GlobalUbo>(), 16);
    }

    #[test]
    fn test_mesh_push_constants_fit_minimum_limit() {
        // maxPushConstantsSize is at least 128 on all conformant devices
        assert_eq!(MeshPushConstants::SIZE, 128);
    }

    #[test]
    fn test_point_light_push_constants_size() {
        assert_eq!(PointLightPushConstants::SIZE, 48);
    }

    #[test]
    fn test_ubo_is_pod() {
        let ubo = GlobalUbo::default();
        let bytes = bytemuck::bytes_of(&ubo);
        assert_eq!(bytes.len(), GlobalUbo::SIZE);

        let back: &GlobalUbo = bytemuck::from_bytes(bytes);
        assert_eq!(*back, ubo);
    }

    #[test]
    fn test_default_ubo_has_no_lights() {
        let ubo = GlobalUbo::default();
        assert_eq!(ubo.num_lights, 0);
        assert_eq!(ubo.projection, Mat4::IDENTITY);
    }
}
