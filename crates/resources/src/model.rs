//! CPU-side mesh and model data.

use glam::Vec3;
use meshview_rhi::vertex::Vertex;

/// A mesh containing vertex and optional index data.
///
/// Without indices the vertices are drawn as a plain triangle list.
#[derive(Debug, Default, Clone)]
pub struct MeshData {
    /// Vertex data.
    pub vertices: Vec<Vertex>,
    /// Index data; empty means non-indexed drawing.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Whether the mesh uses an index buffer.
    #[inline]
    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }

    /// Number of triangles described by the mesh.
    pub fn triangle_count(&self) -> usize {
        if self.is_indexed() {
            self.indices.len() / 3
        } else {
            self.vertices.len() / 3
        }
    }
}

/// A model containing one or more meshes.
#[derive(Debug, Default, Clone)]
pub struct ModelData {
    /// Meshes in this model.
    pub meshes: Vec<MeshData>,
}

impl ModelData {
    /// Wraps a single mesh.
    pub fn from_mesh(mesh: MeshData) -> Self {
        Self { meshes: vec![mesh] }
    }

    /// Axis-aligned bounding box over every mesh, or `None` when the
    /// model has no vertices.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        let mut any = false;

        for mesh in &self.meshes {
            for vertex in &mesh.vertices {
                min = min.min(vertex.position);
                max = max.max(vertex.position);
                any = true;
            }
        }

        any.then_some((min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn vertex_at(position: Vec3) -> Vertex {
        Vertex {
            position,
            ..Vertex::default()
        }
    }

    #[test]
    fn test_mesh_indexed_flag() {
        let mut mesh = MeshData::default();
        assert!(!mesh.is_indexed());
        mesh.indices = vec![0, 1, 2];
        assert!(mesh.is_indexed());
    }

    #[test]
    fn test_triangle_count() {
        let mesh = MeshData {
            vertices: vec![vertex_at(Vec3::ZERO); 6],
            indices: vec![],
        };
        assert_eq!(mesh.triangle_count(), 2);

        let mesh = MeshData {
            vertices: vec![vertex_at(Vec3::ZERO); 4],
            indices: vec![0, 1, 2, 2, 3, 0],
        };
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_model_bounds() {
        let mesh = MeshData {
            vertices: vec![
                vertex_at(Vec3::new(-1.0, 0.0, 2.0)),
                vertex_at(Vec3::new(3.0, -2.0, 0.5)),
            ],
            indices: vec![],
        };
        let model = ModelData::from_mesh(mesh);

        let (min, max) = model.bounds().unwrap();
        assert_eq!(min, Vec3::new(-1.0, -2.0, 0.5));
        assert_eq!(max, Vec3::new(3.0, 0.0, 2.0));
    }

    #[test]
    fn test_empty_model_has_no_bounds() {
        assert!(ModelData::default().bounds().is_none());
    }
}
