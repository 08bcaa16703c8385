//! Mesh render system.
//!
//! Draws every scene object that carries a model, pushing its model and
//! normal matrices as push constants.

use std::path::Path;
use std::sync::Arc;

use meshview_rhi::device::Device;
use meshview_rhi::pipeline::{CullMode, FrontFace, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use meshview_rhi::shader::{Shader, ShaderStage};
use meshview_rhi::vertex::Vertex;
use meshview_rhi::{vk, RhiResult};

use crate::frame::FrameInfo;
use crate::mesh::MeshArena;
use crate::ubo::MeshPushConstants;

const VERTEX_SHADER_PATH: &str = "shaders/spirv/simple.vert.spv";
const FRAGMENT_SHADER_PATH: &str = "shaders/spirv/simple.frag.spv";

/// Pipeline and layout for drawing lit meshes.
pub struct MeshRenderSystem {
    device: Arc<Device>,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
}

impl MeshRenderSystem {
    /// Builds the mesh pipeline against the given render pass.
    ///
    /// # Errors
    ///
    /// Returns an error if shader loading or pipeline creation fails.
    pub fn new(
        device: Arc<Device>,
        render_pass: vk::RenderPass,
        global_set_layout: vk::DescriptorSetLayout,
    ) -> RhiResult<Self> {
        let push_constant_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            .offset(0)
            .size(MeshPushConstants::SIZE as u32);

        let pipeline_layout = PipelineLayout::new(
            device.clone(),
            &[global_set_layout],
            &[push_constant_range],
        )?;

        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            Path::new(VERTEX_SHADER_PATH),
            ShaderStage::Vertex,
            "main",
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            Path::new(FRAGMENT_SHADER_PATH),
            ShaderStage::Fragment,
            "main",
        )?;

        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&Vertex::attribute_descriptions())
            .cull_mode(CullMode::None)
            .front_face(FrontFace::CounterClockwise)
            .depth_test_enable(true)
            .depth_write_enable(true)
            .render_pass(render_pass)
            .build(device.clone(), &pipeline_layout)?;

        Ok(Self {
            device,
            pipeline,
            pipeline_layout,
        })
    }

    /// Records draw calls for every object with a model.
    ///
    /// Objects whose [`MeshId`](meshview_scene::MeshId) is no longer in
    /// the arena are skipped.
    pub fn render(&self, frame: &FrameInfo, meshes: &MeshArena) {
        self.pipeline.bind(frame.command_buffer);

        unsafe {
            self.device.handle().cmd_bind_descriptor_sets(
                frame.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout.handle(),
                0,
                &[frame.global_descriptor_set],
                &[],
            );
        }

        for (_, object) in frame.objects.iter() {
            let Some(mesh_id) = object.model else {
                continue;
            };
            let Some(model) = meshes.get(mesh_id) else {
                continue;
            };

            let push = MeshPushConstants {
                model_matrix: object.transform.matrix(),
                normal_matrix: object.transform.normal_matrix(),
            };

            unsafe {
                self.device.handle().cmd_push_constants(
                    frame.command_buffer,
                    self.pipeline_layout.handle(),
                    vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                    0,
                    bytemuck::bytes_of(&push),
                );
            }

            model.draw_all(&self.device, frame.command_buffer);
        }
    }
}
