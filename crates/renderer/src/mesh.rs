//! GPU-resident mesh data.
//!
//! [`GpuModel`] uploads a [`ModelData`] into device-local vertex and
//! index buffers. Models live in the [`MeshArena`], keyed by the same
//! [`MeshId`] that scene objects carry.

use std::sync::Arc;

use slotmap::SlotMap;
use tracing::debug;

use meshview_resources::{MeshData, ModelData};
use meshview_rhi::buffer::{Buffer, BufferUsage};
use meshview_rhi::device::Device;
use meshview_rhi::{vk, RhiError, RhiResult};
use meshview_scene::MeshId;

/// Arena of uploaded models, keyed by [`MeshId`].
pub type MeshArena = SlotMap<MeshId, GpuModel>;

/// One mesh uploaded to the GPU.
pub struct GpuMesh {
    vertex_buffer: Buffer,
    index_buffer: Option<Buffer>,
    vertex_count: u32,
    index_count: u32,
}

impl GpuMesh {
    /// Uploads mesh data into device-local buffers.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh has no vertices or a buffer upload
    /// fails.
    pub fn new(device: Arc<Device>, data: &MeshData) -> RhiResult<Self> {
        if data.vertices.is_empty() {
            return Err(RhiError::BufferError(
                "Mesh has no vertices".to_string(),
            ));
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&data.vertices);
        let vertex_buffer = Buffer::with_data(device.clone(), BufferUsage::Vertex, vertex_bytes)?;

        let index_buffer = if data.is_indexed() {
            let index_bytes: &[u8] = bytemuck::cast_slice(&data.indices);
            Some(Buffer::with_data(device, BufferUsage::Index, index_bytes)?)
        } else {
            None
        };

        debug!(
            "Uploaded mesh: {} vertices, {} indices",
            data.vertices.len(),
            data.indices.len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count: data.vertices.len() as u32,
            index_count: data.indices.len() as u32,
        })
    }

    /// Binds the vertex buffer, and the index buffer when present.
    pub fn bind(&self, device: &Device, command_buffer: vk::CommandBuffer) {
        unsafe {
            device.handle().cmd_bind_vertex_buffers(
                command_buffer,
                0,
                &[self.vertex_buffer.handle()],
                &[0],
            );

            if let Some(index_buffer) = &self.index_buffer {
                device.handle().cmd_bind_index_buffer(
                    command_buffer,
                    index_buffer.handle(),
                    0,
                    vk::IndexType::UINT32,
                );
            }
        }
    }

    /// Issues the draw call. The mesh must be bound first.
    pub fn draw(&self, device: &Device, command_buffer: vk::CommandBuffer) {
        unsafe {
            if self.index_buffer.is_some() {
                device
                    .handle()
                    .cmd_draw_indexed(command_buffer, self.index_count, 1, 0, 0, 0);
            } else {
                device
                    .handle()
                    .cmd_draw(command_buffer, self.vertex_count, 1, 0, 0);
            }
        }
    }

    /// Number of vertices in the mesh.
    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Number of indices, zero for unindexed meshes.
    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// A model made of one or more GPU meshes.
pub struct GpuModel {
    meshes: Vec<GpuMesh>,
}

impl GpuModel {
    /// Uploads every mesh in `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if any mesh upload fails.
    pub fn from_data(device: Arc<Device>, data: &ModelData) -> RhiResult<Self> {
        let meshes = data
            .meshes
            .iter()
            .map(|mesh| GpuMesh::new(device.clone(), mesh))
            .collect::<RhiResult<Vec<_>>>()?;

        Ok(Self { meshes })
    }

    /// Binds and draws every mesh in the model.
    pub fn draw_all(&self, device: &Device, command_buffer: vk::CommandBuffer) {
        for mesh in &self.meshes {
            mesh.bind(device, command_buffer);
            mesh.draw(device, command_buffer);
        }
    }

    /// Number of meshes in the model.
    #[inline]
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }
}
