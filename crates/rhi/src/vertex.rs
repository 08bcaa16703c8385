//! Vertex data structures and input descriptions.
//!
//! [`Vertex`] is the single vertex format used by the mesh pipelines. It
//! carries a full tangent frame (normal, tangent, bitangent) alongside
//! position, UV, and a per-vertex color.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Standard mesh vertex with a full tangent frame and per-vertex color.
///
/// # Memory Layout
///
/// `#[repr(C)]` keeps the layout predictable:
/// - Offset 0: position (12 bytes)
/// - Offset 12: bitangent (12 bytes)
/// - Offset 24: tangent (12 bytes)
/// - Offset 36: normal (12 bytes)
/// - Offset 48: uv (8 bytes)
/// - Offset 56: color (12 bytes)
/// - Total size: 68 bytes
///
/// # Shader Locations
///
/// - location 0: position (vec3)
/// - location 1: bitangent (vec3)
/// - location 2: tangent (vec3)
/// - location 3: normal (vec3)
/// - location 4: uv (vec2)
/// - location 5: color (vec3)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// 3D position in object space.
    pub position: Vec3,
    /// Bitangent vector of the tangent frame.
    pub bitangent: Vec3,
    /// Tangent vector of the tangent frame.
    pub tangent: Vec3,
    /// Surface normal (should be normalized).
    pub normal: Vec3,
    /// Texture coordinates.
    pub uv: Vec2,
    /// Per-vertex RGB color.
    pub color: Vec3,
}

impl Vertex {
    /// Creates a new vertex with the full attribute set.
    #[inline]
    pub const fn new(
        position: Vec3,
        bitangent: Vec3,
        tangent: Vec3,
        normal: Vec3,
        uv: Vec2,
        color: Vec3,
    ) -> Self {
        Self {
            position,
            bitangent,
            tangent,
            normal,
            uv,
            color,
        }
    }

    /// Returns the size of the vertex in bytes.
    #[inline]
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }

    /// Get the vertex input binding description.
    ///
    /// Binding 0, per-vertex input rate.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Get the vertex attribute descriptions.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 6] {
        [
            // Position at location 0
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            // Bitangent at location 1
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 12,
            },
            // Tangent at location 2
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 24,
            },
            // Normal at location 3
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 3,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 36,
            },
            // UV at location 4
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 4,
                format: vk::Format::R32G32_SFLOAT,
                offset: 48,
            },
            // Color at location 5
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 5,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 56,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size() {
        // 4 x Vec3 (48) + Vec2 (8) + Vec3 (12) = 68 bytes
        assert_eq!(std::mem::size_of::<Vertex>(), 68);
        assert_eq!(Vertex::size(), 68);
    }

    #[test]
    fn test_vertex_binding_description() {
        let binding = Vertex::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 68);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn test_vertex_attribute_descriptions() {
        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs.len(), 6);

        for (i, attr) in attrs.iter().enumerate() {
            assert_eq!(attr.binding, 0);
            assert_eq!(attr.location, i as u32);
        }

        assert_eq!(attrs[0].format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[2].offset, 24);
        assert_eq!(attrs[3].offset, 36);
        assert_eq!(attrs[4].format, vk::Format::R32G32_SFLOAT);
        assert_eq!(attrs[4].offset, 48);
        assert_eq!(attrs[5].format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(attrs[5].offset, 56);
    }

    #[test]
    fn test_vertex_offsets() {
        // Field offsets must match the attribute descriptions
        use std::mem::offset_of;

        assert_eq!(offset_of!(Vertex, position), 0);
        assert_eq!(offset_of!(Vertex, bitangent), 12);
        assert_eq!(offset_of!(Vertex, tangent), 24);
        assert_eq!(offset_of!(Vertex, normal), 36);
        assert_eq!(offset_of!(Vertex, uv), 48);
        assert_eq!(offset_of!(Vertex, color), 56);
    }

    #[test]
    fn test_vertex_pod_roundtrip() {
        let vertex = Vertex::new(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec2::new(0.5, 0.5),
            Vec3::new(0.9, 0.8, 0.7),
        );

        let bytes: &[u8] = bytemuck::bytes_of(&vertex);
        assert_eq!(bytes.len(), 68);

        let back: &Vertex = bytemuck::from_bytes(bytes);
        assert_eq!(*back, vertex);
    }
}
