//! Procedural mesh generation.
//!
//! Generates simple shapes with full tangent frames, used for scene
//! content that does not come from a file.

use glam::{Vec2, Vec3};
use meshview_rhi::vertex::Vertex;

use crate::model::MeshData;

/// Builds one vertex with the tangent frame spelled out.
fn vertex(
    position: Vec3,
    normal: Vec3,
    tangent: Vec3,
    bitangent: Vec3,
    uv: Vec2,
    color: Vec3,
) -> Vertex {
    Vertex {
        position,
        bitangent,
        tangent,
        normal,
        uv,
        color,
    }
}

/// Unit quad in the XZ plane, centered at the origin, facing up (-Y).
pub fn quad(color: Vec3) -> MeshData {
    let normal = Vec3::new(0.0, -1.0, 0.0);
    let tangent = Vec3::X;
    let bitangent = Vec3::Z;

    let corners = [
        (Vec3::new(-0.5, 0.0, -0.5), Vec2::new(0.0, 0.0)),
        (Vec3::new(0.5, 0.0, -0.5), Vec2::new(1.0, 0.0)),
        (Vec3::new(0.5, 0.0, 0.5), Vec2::new(1.0, 1.0)),
        (Vec3::new(-0.5, 0.0, 0.5), Vec2::new(0.0, 1.0)),
    ];

    MeshData {
        vertices: corners
            .iter()
            .map(|&(position, uv)| vertex(position, normal, tangent, bitangent, uv, color))
            .collect(),
        indices: vec![0, 2, 1, 0, 3, 2],
    }
}

/// Unit cube centered at the origin, with per-face tangent frames.
pub fn cube(color: Vec3) -> MeshData {
    // normal, tangent, per-face; bitangent derived
    let faces: [(Vec3, Vec3); 6] = [
        (Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_X, Vec3::Z),
        (Vec3::Y, Vec3::X),
        (Vec3::NEG_Y, Vec3::X),
        (Vec3::Z, Vec3::X),
        (Vec3::NEG_Z, Vec3::NEG_X),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, tangent) in faces {
        let bitangent = normal.cross(tangent);
        let base = vertices.len() as u32;

        let face_corners = [
            (-tangent - bitangent, Vec2::new(0.0, 0.0)),
            (tangent - bitangent, Vec2::new(1.0, 0.0)),
            (tangent + bitangent, Vec2::new(1.0, 1.0)),
            (-tangent + bitangent, Vec2::new(0.0, 1.0)),
        ];

        for (corner, uv) in face_corners {
            let position = (normal + corner) * 0.5;
            vertices.push(vertex(position, normal, tangent, bitangent, uv, color));
        }

        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    MeshData { vertices, indices }
}

/// UV sphere of the given radius, centered at the origin.
///
/// `stacks` is the number of latitude bands, `sectors` the number of
/// longitude segments; both are clamped to at least 3.
pub fn uv_sphere(radius: f32, stacks: u32, sectors: u32, color: Vec3) -> MeshData {
    let stacks = stacks.max(3);
    let sectors = sectors.max(3);

    let mut vertices = Vec::with_capacity(((stacks + 1) * (sectors + 1)) as usize);

    for stack in 0..=stacks {
        let v = stack as f32 / stacks as f32;
        let phi = std::f32::consts::PI * v;
        let (sin_phi, cos_phi) = phi.sin_cos();

        for sector in 0..=sectors {
            let u = sector as f32 / sectors as f32;
            let theta = std::f32::consts::TAU * u;
            let (sin_theta, cos_theta) = theta.sin_cos();

            let normal = Vec3::new(sin_phi * cos_theta, cos_phi, sin_phi * sin_theta);
            // Derivative along longitude; degenerate at the poles, where
            // any tangent perpendicular to the axis works
            let tangent = if sin_phi.abs() < 1e-6 {
                Vec3::X
            } else {
                Vec3::new(-sin_theta, 0.0, cos_theta)
            };
            let bitangent = normal.cross(tangent);

            vertices.push(vertex(
                normal * radius,
                normal,
                tangent,
                bitangent,
                Vec2::new(u, v),
                color,
            ));
        }
    }

    let mut indices = Vec::with_capacity((stacks * sectors * 6) as usize);
    let ring = sectors + 1;

    for stack in 0..stacks {
        for sector in 0..sectors {
            let a = stack * ring + sector;
            let b = a + ring;

            if stack != 0 {
                indices.extend_from_slice(&[a, b, a + 1]);
            }
            if stack != stacks - 1 {
                indices.extend_from_slice(&[a + 1, b, b + 1]);
            }
        }
    }

    MeshData { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_indices_in_bounds(mesh: &MeshData) {
        let count = mesh.vertices.len() as u32;
        assert!(mesh.indices.iter().all(|&i| i < count));
    }

    #[test]
    fn test_quad_shape() {
        let mesh = quad(Vec3::ONE);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.triangle_count(), 2);
        assert_indices_in_bounds(&mesh);
    }

    #[test]
    fn test_cube_shape() {
        let mesh = cube(Vec3::ONE);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert_indices_in_bounds(&mesh);

        // Every corner sits on the unit cube surface
        for v in &mesh.vertices {
            let p = v.position.abs();
            assert!((p.max_element() - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_cube_tangent_frames_are_orthonormal() {
        let mesh = cube(Vec3::ONE);
        for v in &mesh.vertices {
            assert!((v.normal.length() - 1.0).abs() < 1e-5);
            assert!(v.normal.dot(v.tangent).abs() < 1e-5);
            assert!((v.normal.cross(v.tangent) - v.bitangent).length() < 1e-5);
        }
    }

    #[test]
    fn test_sphere_vertices_on_radius() {
        let radius = 2.5;
        let mesh = uv_sphere(radius, 8, 12, Vec3::ONE);
        assert_indices_in_bounds(&mesh);

        for v in &mesh.vertices {
            assert!((v.position.length() - radius).abs() < 1e-4);
            assert!((v.normal.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_sphere_clamps_tiny_resolution() {
        let mesh = uv_sphere(1.0, 1, 1, Vec3::ONE);
        // Clamped to 3x3
        assert_eq!(mesh.vertices.len(), 16);
        assert!(!mesh.indices.is_empty());
    }
}
